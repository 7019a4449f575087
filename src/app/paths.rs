//! Remote and local path resolution
//!
//! Product definitions name their files with small templates such as
//! `blend.t{issue.hour:02d}z.core.f{lead.hour:03d}`. [`PathTemplate`] parses
//! and validates those templates once, and [`PathResolver`] combines them with
//! a product, an optional region and a pair of forecast times to produce:
//!
//! - the remote key and URI of the index or data object
//! - the local filename the object is stored under
//!
//! Every call is a pure function of its inputs.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Timelike};

use crate::app::catalog::{ProductDefinition, Region};
use crate::app::models::ForecastTimes;
use crate::constants::files;
use crate::errors::{ConfigError, ConfigResult};

/// Which object of a forecast file pair a path refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileVariant {
    /// The `.idx` companion listing message offsets
    Index,
    /// The GRIB2 object itself
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeSource {
    Issue,
    Valid,
    Lead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeComponent {
    Year,
    Month,
    Day,
    Hour,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder {
        source: TimeSource,
        component: TimeComponent,
        width: usize,
    },
}

/// A validated path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    text: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parse a template
    ///
    /// Placeholders are `{issue.<c>}`, `{valid.<c>}` with `<c>` one of `year`,
    /// `month`, `day` or `hour`, and `{lead.hour}`. Each may carry a zero-padded
    /// width such as `:02d`. `{{` and `}}` produce literal braces.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTemplate` for unknown placeholders, bad
    /// format specifiers or unbalanced braces
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let invalid = |reason: String| ConfigError::InvalidTemplate {
            template: text.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut body = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        body.push(c);
                    }
                    if !closed {
                        return Err(invalid("unclosed '{'".to_string()));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(&body).map_err(invalid)?);
                }
                '}' => return Err(invalid("unmatched '}'".to_string())),
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            text: text.to_string(),
            segments,
        })
    }

    /// Template text as written
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Substitute forecast times into the template
    pub fn render(&self, times: &ForecastTimes) -> String {
        let mut out = String::with_capacity(self.text.len() + 8);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder {
                    source,
                    component,
                    width,
                } => {
                    let value = time_value(times, *source, *component);
                    out.push_str(&format!("{:0width$}", value, width = *width));
                }
            }
        }
        out
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn parse_placeholder(body: &str) -> Result<Segment, String> {
    let (name, format_spec) = match body.split_once(':') {
        Some((name, format_spec)) => (name, Some(format_spec)),
        None => (body, None),
    };

    let (source, component) = name
        .split_once('.')
        .ok_or_else(|| format!("placeholder {{{}}} has no time component", body))?;

    let source = match source {
        "issue" => TimeSource::Issue,
        "valid" => TimeSource::Valid,
        "lead" => TimeSource::Lead,
        other => return Err(format!("unknown time source '{}'", other)),
    };

    let component = match component {
        "year" => TimeComponent::Year,
        "month" => TimeComponent::Month,
        "day" => TimeComponent::Day,
        "hour" => TimeComponent::Hour,
        other => return Err(format!("unknown time component '{}'", other)),
    };

    if source == TimeSource::Lead && component != TimeComponent::Hour {
        return Err("lead supports only the hour component".to_string());
    }

    let width = match format_spec {
        None => 0,
        Some(format_spec) => parse_width(format_spec)
            .ok_or_else(|| format!("unsupported format specifier ':{}'", format_spec))?,
    };

    Ok(Segment::Placeholder {
        source,
        component,
        width,
    })
}

/// `d` or `0Nd`
fn parse_width(format_spec: &str) -> Option<usize> {
    let digits = format_spec.strip_suffix('d')?;
    if digits.is_empty() {
        return Some(0);
    }
    digits.strip_prefix('0')?.parse().ok()
}

fn time_value(times: &ForecastTimes, source: TimeSource, component: TimeComponent) -> i64 {
    let stamp = match source {
        TimeSource::Issue => times.issue(),
        TimeSource::Valid => times.valid(),
        TimeSource::Lead => return times.lead_hours(),
    };
    match component {
        TimeComponent::Year => i64::from(stamp.year()),
        TimeComponent::Month => i64::from(stamp.month()),
        TimeComponent::Day => i64::from(stamp.day()),
        TimeComponent::Hour => i64::from(stamp.hour()),
    }
}

/// Resolves remote and local names for one product and optional region
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    product: &'a ProductDefinition,
    region: Option<&'a Region>,
}

impl<'a> PathResolver<'a> {
    pub fn new(product: &'a ProductDefinition, region: Option<&'a Region>) -> Self {
        Self { product, region }
    }

    /// Extension including region and variant, e.g. `.co.grib2.idx`
    pub fn extension(&self, variant: FileVariant) -> String {
        let mut ext = match self.region {
            Some(region) => format!(".{}{}", region.suffix(), self.product.file_ext()),
            None => self.product.file_ext().to_string(),
        };
        if variant == FileVariant::Index {
            ext.push_str(files::INDEX_SUFFIX);
        }
        ext
    }

    /// Object key relative to the product's base URI
    pub fn remote_key(&self, times: &ForecastTimes, variant: FileVariant) -> String {
        format!(
            "{}{}{}",
            self.product.subdir().render(times),
            self.product.file_base().render(times),
            self.extension(variant)
        )
    }

    /// Full source URI, e.g. `s3://noaa-nbm-grib2-pds/blend.20240905/...`
    pub fn remote_uri(&self, times: &ForecastTimes, variant: FileVariant) -> String {
        format!(
            "{}/{}",
            self.product.base_uri(),
            self.remote_key(times, variant)
        )
    }

    /// Local filename; index files are shared across fields so callers pass
    /// `None` for `field` there
    pub fn local_filename(
        &self,
        times: &ForecastTimes,
        field: Option<&str>,
        variant: FileVariant,
    ) -> String {
        let mut name = format!(
            "{}_{}_{}",
            self.product.name(),
            times.issue().format(files::COMPACT_TIME_FORMAT),
            times.valid().format(files::COMPACT_TIME_FORMAT)
        );
        if let Some(field) = field {
            name.push('_');
            name.push_str(field);
        }
        name.push_str(&self.extension(variant));
        name
    }

    /// [`PathResolver::local_filename`] joined onto `dir`
    pub fn local_path(
        &self,
        dir: &Path,
        times: &ForecastTimes,
        field: Option<&str>,
        variant: FileVariant,
    ) -> PathBuf {
        dir.join(self.local_filename(times, field, variant))
    }
}
