//! Product catalog: which remote products exist and how their fields are found
//!
//! A [`ProductDefinition`] describes where a product's GRIB2 files live, how
//! their paths are named, which regional variants exist and, for every
//! human-readable field name, the [`FieldCriteria`] used to pick that field's
//! message out of the product's index file.
//!
//! The catalog is validated when it is built: duplicate products or fields
//! and malformed path templates are rejected up front, so lookups during a
//! download can only fail on unknown names.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::paths::PathTemplate;
use crate::constants::products;
use crate::errors::{ConfigError, ConfigResult};

/// Criteria identifying one field within an index file
///
/// Absent optional criteria match any value in the corresponding column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCriteria {
    /// Variable abbreviation, compared exactly (e.g. `APCP`)
    pub abbreviation: String,
    /// Vertical level; the level column must start with it
    #[serde(default)]
    pub level: Option<u32>,
    /// Accumulation or duration length; the time-range column must start with it
    #[serde(default)]
    pub time_range_length: Option<u32>,
    /// Level type tag (e.g. `cloudBase`), informational
    #[serde(default)]
    pub level_type: Option<String>,
    /// GRIB2 product definition template number, informational
    #[serde(default)]
    pub product_definition_template: Option<u8>,
}

impl FieldCriteria {
    pub fn new(abbreviation: impl Into<String>) -> Self {
        Self {
            abbreviation: abbreviation.into(),
            level: None,
            time_range_length: None,
            level_type: None,
            product_definition_template: None,
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_time_range(mut self, length: u32) -> Self {
        self.time_range_length = Some(length);
        self
    }

    pub fn with_level_type(mut self, level_type: impl Into<String>) -> Self {
        self.level_type = Some(level_type.into());
        self
    }

    pub fn with_template(mut self, template: u8) -> Self {
        self.product_definition_template = Some(template);
        self
    }
}

/// A geographic subdomain of a product, e.g. `CO` or `HI`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    code: String,
}

impl Region {
    /// Region code as listed in the product definition
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Lower-case form used in file extensions (`.co.grib2`)
    pub fn suffix(&self) -> String {
        self.code.to_lowercase()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Everything needed to locate and read one remote product
#[derive(Debug, Clone)]
pub struct ProductDefinition {
    name: String,
    base_uri: String,
    subdir: PathTemplate,
    file_base: PathTemplate,
    file_ext: String,
    regions: Vec<String>,
    fields: BTreeMap<String, FieldCriteria>,
}

impl ProductDefinition {
    /// Create a product with no regions or fields
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTemplate` if either template is malformed
    pub fn new(
        name: impl Into<String>,
        base_uri: impl Into<String>,
        subdir: &str,
        file_base: &str,
        file_ext: impl Into<String>,
    ) -> ConfigResult<Self> {
        Ok(Self {
            name: name.into(),
            base_uri: base_uri.into().trim_end_matches('/').to_string(),
            subdir: PathTemplate::parse(subdir)?,
            file_base: PathTemplate::parse(file_base)?,
            file_ext: file_ext.into(),
            regions: Vec::new(),
            fields: BTreeMap::new(),
        })
    }

    /// Set the supported region codes
    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    /// Register a field
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateField` if the name is already registered
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        criteria: FieldCriteria,
    ) -> ConfigResult<Self> {
        let name = name.into();
        if self.fields.contains_key(&name) {
            return Err(ConfigError::DuplicateField {
                product: self.name.clone(),
                field: name,
            });
        }
        self.fields.insert(name, criteria);
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base URI without trailing slash, e.g. `s3://noaa-nbm-grib2-pds`
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn subdir(&self) -> &PathTemplate {
        &self.subdir
    }

    pub fn file_base(&self) -> &PathTemplate {
        &self.file_base
    }

    /// Default file extension, including the leading dot
    pub fn file_ext(&self) -> &str {
        &self.file_ext
    }

    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// Field names and their criteria, sorted by name
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldCriteria)> {
        self.fields.iter().map(|(name, criteria)| (name.as_str(), criteria))
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Look up a field's matching criteria
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownField` listing the supported fields
    pub fn field_criteria(&self, name: &str) -> ConfigResult<&FieldCriteria> {
        self.fields.get(name).ok_or_else(|| ConfigError::UnknownField {
            product: self.name.clone(),
            field: name.to_string(),
            supported: self.field_names(),
        })
    }

    /// Validate a region code (case-insensitive) against this product
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownRegion` listing the supported regions
    pub fn region(&self, code: &str) -> ConfigResult<Region> {
        self.regions
            .iter()
            .find(|supported| supported.eq_ignore_ascii_case(code))
            .map(|supported| Region {
                code: supported.clone(),
            })
            .ok_or_else(|| ConfigError::UnknownRegion {
                product: self.name.clone(),
                region: code.to_string(),
                supported: self.regions.clone(),
            })
    }
}

/// Serialized form of a catalog file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    products: Vec<ProductEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProductEntry {
    name: String,
    base_uri: String,
    subdir: String,
    file_base: String,
    file_ext: String,
    #[serde(default)]
    regions: Vec<String>,
    #[serde(default)]
    fields: Vec<FieldEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FieldEntry {
    name: String,
    #[serde(flatten)]
    criteria: FieldCriteria,
}

impl ProductEntry {
    fn into_definition(self) -> ConfigResult<ProductDefinition> {
        let mut product = ProductDefinition::new(
            self.name,
            self.base_uri,
            &self.subdir,
            &self.file_base,
            self.file_ext,
        )?
        .with_regions(self.regions);

        for field in self.fields {
            product = product.with_field(field.name, field.criteria)?;
        }
        Ok(product)
    }
}

/// Registry of all known products, keyed by product name
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: BTreeMap<String, Arc<ProductDefinition>>,
}

impl ProductCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of the products this crate knows about out of the box
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a built-in product table is malformed
    pub fn builtin() -> ConfigResult<Self> {
        let mut catalog = Self::new();
        catalog.register(nbm_definition()?)?;
        Ok(catalog)
    }

    /// Parse a catalog from TOML text
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on invalid TOML, duplicate names or bad templates
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let file: CatalogFile = toml::from_str(text)?;
        let mut catalog = Self::new();
        for entry in file.products {
            catalog.register(entry.into_definition()?)?;
        }
        Ok(catalog)
    }

    /// Load a catalog file from disk
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let catalog = Self::from_toml_str(&text)?;
        info!(
            "Loaded {} products from catalog {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Add a product
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateProduct` if the name is taken
    pub fn register(&mut self, product: ProductDefinition) -> ConfigResult<()> {
        if self.products.contains_key(product.name()) {
            return Err(ConfigError::DuplicateProduct {
                product: product.name().to_string(),
            });
        }
        debug!(
            "Registered product {} with {} fields",
            product.name(),
            product.fields.len()
        );
        self.products
            .insert(product.name().to_string(), Arc::new(product));
        Ok(())
    }

    /// Merge another catalog into this one, rejecting duplicate products
    pub fn merge(&mut self, other: ProductCatalog) -> ConfigResult<()> {
        for (_, product) in other.products {
            let product = Arc::try_unwrap(product).unwrap_or_else(|shared| (*shared).clone());
            self.register(product)?;
        }
        Ok(())
    }

    /// Look up a product by name
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownProduct` listing the supported products
    pub fn lookup(&self, name: &str) -> ConfigResult<Arc<ProductDefinition>> {
        self.products
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProduct {
                product: name.to_string(),
                supported: self.product_names(),
            })
    }

    pub fn product_names(&self) -> Vec<String> {
        self.products.keys().cloned().collect()
    }

    pub fn products(&self) -> impl Iterator<Item = &ProductDefinition> {
        self.products.values().map(|product| product.as_ref())
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// National Blend of Models on the NOAA open-data bucket
fn nbm_definition() -> ConfigResult<ProductDefinition> {
    ProductDefinition::new(
        products::NBM,
        products::NBM_BASE_URI,
        "blend.{issue.year:04d}{issue.month:02d}{issue.day:02d}/{issue.hour:02d}/core/",
        "blend.t{issue.hour:02d}z.core.f{lead.hour:03d}",
        ".grib2",
    )?
    .with_regions(["CO", "HI", "PR", "GU", "AK"])
    .with_field("RAIN1HR", FieldCriteria::new("APCP").with_template(8).with_time_range(1))?
    .with_field("RAIN6HR", FieldCriteria::new("APCP").with_template(8).with_time_range(6))?
    .with_field("ICE1HR", FieldCriteria::new("FICEAC").with_time_range(1))?
    .with_field("SNOW1HR", FieldCriteria::new("ASNOW").with_template(8).with_time_range(1))?
    .with_field("TEMP", FieldCriteria::new("TMP").with_level(2).with_template(0))?
    .with_field("APPTEMP", FieldCriteria::new("APTMP").with_level(2).with_template(0))?
    .with_field("RH", FieldCriteria::new("RH").with_level(2).with_template(0))?
    .with_field("DEWPOINT", FieldCriteria::new("DPT").with_level(2).with_template(0))?
    .with_field("WINDSPEED", FieldCriteria::new("WIND").with_level(10).with_template(0))?
    .with_field("WINDGUST", FieldCriteria::new("GUST").with_level(10).with_template(0))?
    .with_field("CEILING", FieldCriteria::new("CEIL").with_level_type("cloudBase"))?
    .with_field("VISIBILITY", FieldCriteria::new("VIS"))?
    .with_field("MAXREF", FieldCriteria::new("MAXREF").with_level(1000))?
    .with_field("VIL", FieldCriteria::new("VIL"))?
    .with_field("ECHOTOP", FieldCriteria::new("RETOP"))?
    .with_field("WAVEHEIGHT", FieldCriteria::new("HTSGW").with_template(0))?
    .with_field("PROBTHDR1HR", FieldCriteria::new("TSTM").with_time_range(1))?
    .with_field("PROBTHDR3HR", FieldCriteria::new("TSTM").with_time_range(3))?
    .with_field("PROBTHDR6HR", FieldCriteria::new("TSTM").with_time_range(6))
}
