//! Command handlers for GRIB Fetcher CLI
//!
//! This module implements the command handlers that coordinate between CLI
//! arguments, the loaded configuration and the core download functionality.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::{
    BatchDownloader, BatchSummary, DownloadRequest, FieldCriteria, FileVariant, ForecastTimes,
    HttpObjectStore, LocalCache, PartialFetcher, PathResolver, ProductCatalog, ProductDefinition,
};
use crate::cli::{ConfigArgs, DownloadArgs, FieldsArgs, ForecastArgs, SizeArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, ConfigError, Result};

/// Handle the download command
///
/// Validates the product, region and every field against the catalog before
/// any transfer starts, then downloads all fields concurrently. Ctrl-C
/// cancels outstanding transfers without leaving partial files.
pub async fn handle_download(args: DownloadArgs, mut config: AppConfig) -> Result<()> {
    let start_time = Instant::now();
    args.validate().map_err(AppError::generic)?;

    if let Some(concurrency) = args.concurrency {
        config.batch.max_concurrent = concurrency;
    }
    if args.no_cache {
        config.client.disable_cache = true;
    }

    let catalog = Arc::new(config.load_catalog().await?);
    let fields = args.unique_fields();
    check_request(&catalog, &args.forecast, &fields)?;

    let (client_config, fetch_config, batch_config, cache_config) = config.to_runtime_config();
    let dest_dir = match &args.dest {
        Some(dir) => dir.clone(),
        None => cache_config.resolve_root()?,
    };
    info!("Downloading {} fields into {}", fields.len(), dest_dir.display());

    let store = Arc::new(HttpObjectStore::new(client_config)?);
    let fetcher = PartialFetcher::new(store, Arc::new(LocalCache::new(cache_config)), fetch_config);
    let downloader = BatchDownloader::new(catalog, fetcher.clone(), batch_config);

    let requests: Vec<DownloadRequest> = fields
        .iter()
        .map(|field| {
            let request = DownloadRequest::new(
                &args.forecast.product,
                args.forecast.issue,
                args.forecast.valid,
                field,
                &dest_dir,
            );
            match &args.forecast.region {
                Some(region) => request.with_region(region),
                None => request,
            }
        })
        .collect();

    let cancel = CancellationToken::new();
    let signal_task = spawn_ctrl_c_handler(cancel.clone());
    let outcomes = downloader.download_all(requests, &cancel).await;
    signal_task.abort();

    for (request, result) in &outcomes {
        match result {
            Ok(path) => println!("{}", path.display()),
            Err(e) => eprintln!("{}: {}", request.field, e),
        }
    }

    let summary = BatchSummary::from_outcomes(&outcomes);
    let stats = fetcher.stats();
    info!(
        "Finished in {:?}: {} transfers, {} cache hits, {} bytes",
        start_time.elapsed(),
        stats.transfers,
        stats.cache_hits,
        stats.bytes_transferred
    );

    if cancel.is_cancelled() {
        return Err(AppError::generic("Download cancelled"));
    }
    if summary.failed > 0 {
        let hint = if summary.recoverable > 0 {
            format!(" ({} may succeed on retry)", summary.recoverable)
        } else {
            String::new()
        };
        return Err(AppError::generic(format!(
            "{} of {} fields failed{}",
            summary.failed,
            summary.total(),
            hint
        )));
    }

    Ok(())
}

/// Handle the fields command
pub async fn handle_fields(args: FieldsArgs, config: &AppConfig) -> Result<()> {
    let catalog = config.load_catalog().await?;

    match &args.product {
        Some(name) => {
            let product = catalog.lookup(name)?;
            display_product(&product);
        }
        None => {
            for (i, product) in catalog.products().enumerate() {
                if i > 0 {
                    println!();
                }
                display_product(product);
            }
        }
    }

    Ok(())
}

/// Handle the size command
pub async fn handle_size(args: SizeArgs, config: &AppConfig) -> Result<()> {
    let catalog = config.load_catalog().await?;
    check_request(&catalog, &args.forecast, &[])?;

    let product = catalog.lookup(&args.forecast.product)?;
    let region = args
        .forecast
        .region
        .as_deref()
        .map(|code| product.region(code))
        .transpose()?;
    let times = ForecastTimes::new(args.forecast.issue, args.forecast.valid)?;
    let variant = if args.index {
        FileVariant::Index
    } else {
        FileVariant::Data
    };
    let source = PathResolver::new(&product, region.as_ref()).remote_uri(&times, variant);

    let (client_config, fetch_config, _, cache_config) = config.to_runtime_config();
    let store = Arc::new(HttpObjectStore::new(client_config)?);
    let fetcher = PartialFetcher::new(store, Arc::new(LocalCache::new(cache_config)), fetch_config);

    debug!("Querying size of {}", source);
    let size = fetcher.size(&source).await?;
    println!("{}\t{} bytes ({})", source, size, format_bytes(size));
    Ok(())
}

/// Handle the config command
///
/// Runs even when the current configuration failed to load, so a broken
/// file can be replaced with `--init --force`.
pub async fn handle_config(
    args: ConfigArgs,
    config_path: Option<PathBuf>,
    load_error: Option<ConfigError>,
) -> Result<()> {
    let content = AppConfig::generate_default_config_content();
    if let Some(e) = &load_error {
        warn!("Current configuration is not usable: {}", e);
    }

    if !args.init {
        print!("{}", content);
        return Ok(());
    }

    let target = match config_path.or_else(AppConfig::default_config_path) {
        Some(path) => path,
        None => return Err(AppError::generic("No user configuration directory available")),
    };
    write_config_file(&target, &content, args.force).await?;
    println!("Wrote default configuration to {}", target.display());
    Ok(())
}

/// Fail fast on names the catalog does not know
fn check_request(
    catalog: &ProductCatalog,
    forecast: &ForecastArgs,
    fields: &[String],
) -> Result<()> {
    let product = catalog.lookup(&forecast.product)?;
    if let Some(code) = &forecast.region {
        product.region(code)?;
    }
    for field in fields {
        product.field_criteria(field)?;
    }
    ForecastTimes::new(forecast.issue, forecast.valid)?;
    Ok(())
}

async fn write_config_file(path: &Path, content: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(AppError::generic(format!(
            "{} already exists; use --force to overwrite",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    info!("Configuration written to {}", path.display());
    Ok(())
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, cancelling downloads");
                eprintln!("\nCancelling downloads...");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to install Ctrl-C handler: {}", e),
        }
    })
}

fn display_product(product: &ProductDefinition) {
    println!("{} ({})", product.name(), product.base_uri());
    println!(
        "  Files:   {}{}{}",
        product.subdir(),
        product.file_base(),
        product.file_ext()
    );
    if product.regions().is_empty() {
        println!("  Regions: none");
    } else {
        println!("  Regions: {}", product.regions().join(", "));
    }

    let name_width = product
        .fields()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0)
        .max("FIELD".len());
    println!("  {:<width$}  CRITERIA", "FIELD", width = name_width);
    for (name, criteria) in product.fields() {
        println!(
            "  {:<width$}  {}",
            name,
            describe_criteria(criteria),
            width = name_width
        );
    }
}

fn describe_criteria(criteria: &FieldCriteria) -> String {
    let mut parts = vec![criteria.abbreviation.clone()];
    if let Some(level) = criteria.level {
        parts.push(format!("level {}", level));
    }
    if let Some(level_type) = &criteria.level_type {
        parts.push(level_type.clone());
    }
    if let Some(hours) = criteria.time_range_length {
        parts.push(format!("{} hour", hours));
    }
    if let Some(template) = criteria.product_definition_template {
        parts.push(format!("template 4.{}", template));
    }
    parts.join(", ")
}

/// Format bytes in human readable format
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn forecast(product: &str, region: Option<&str>) -> ForecastArgs {
        ForecastArgs {
            product: product.to_string(),
            region: region.map(str::to_string),
            issue: Utc.with_ymd_and_hms(2024, 9, 5, 12, 0, 0).unwrap(),
            valid: Utc.with_ymd_and_hms(2024, 9, 5, 13, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_check_request() {
        let catalog = ProductCatalog::builtin().unwrap();
        let fields = vec!["RAIN1HR".to_string(), "TEMP".to_string()];

        assert!(check_request(&catalog, &forecast("NBM", Some("co")), &fields).is_ok());
        assert!(matches!(
            check_request(&catalog, &forecast("GFS", None), &fields),
            Err(AppError::Config(ConfigError::UnknownProduct { .. }))
        ));
        assert!(matches!(
            check_request(&catalog, &forecast("NBM", Some("XX")), &fields),
            Err(AppError::Config(ConfigError::UnknownRegion { .. }))
        ));
        assert!(matches!(
            check_request(&catalog, &forecast("NBM", None), &["NOPE".to_string()]),
            Err(AppError::Config(ConfigError::UnknownField { .. }))
        ));
    }

    #[tokio::test]
    async fn test_handle_fields() {
        let config = AppConfig::default();

        let all = FieldsArgs { product: None };
        assert!(handle_fields(all, &config).await.is_ok());

        let nbm = FieldsArgs {
            product: Some("NBM".to_string()),
        };
        assert!(handle_fields(nbm, &config).await.is_ok());

        let unknown = FieldsArgs {
            product: Some("GFS".to_string()),
        };
        assert!(matches!(
            handle_fields(unknown, &config).await,
            Err(AppError::Config(ConfigError::UnknownProduct { .. }))
        ));
    }

    #[test]
    fn test_describe_criteria() {
        let criteria = FieldCriteria::new("APCP")
            .with_time_range(1)
            .with_template(8);
        assert_eq!(describe_criteria(&criteria), "APCP, 1 hour, template 4.8");

        let criteria = FieldCriteria::new("TMP").with_level(2).with_level_type("m above ground");
        assert_eq!(describe_criteria(&criteria), "TMP, level 2, m above ground");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[tokio::test]
    async fn test_write_config_file_respects_force() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        write_config_file(&path, "a = 1\n", false).await.unwrap();
        assert!(write_config_file(&path, "a = 2\n", false).await.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a = 1\n");

        write_config_file(&path, "a = 2\n", true).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a = 2\n");
    }
}
