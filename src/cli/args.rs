//! Command-line argument parsing for GRIB Fetcher
//!
//! This module defines the CLI structure using clap derive macros: field
//! downloads, catalog listing, remote size queries and configuration output.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::app::parse_timestamp;
use crate::constants::{products, workers};

/// GRIB Fetcher - Download single fields from forecast GRIB files
#[derive(Parser, Debug)]
#[command(
    name = "grib_fetcher",
    version,
    about = "Download individual fields from forecast GRIB2 files with byte-range requests",
    long_about = "Fetches only the bytes of the requested fields from large forecast files in public
object stores, using each file's index to locate the fields. Downloads are cached locally
and several fields can be fetched concurrently."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download one or more fields of a forecast
    Download(DownloadArgs),

    /// List products, regions and fields in the catalog
    Fields(FieldsArgs),

    /// Report the size of a remote forecast file
    Size(SizeArgs),

    /// Show or write the configuration file
    Config(ConfigArgs),
}

/// Product, region and forecast times shared by several commands
#[derive(Args, Debug, Clone)]
pub struct ForecastArgs {
    /// Product name from the catalog
    #[arg(short, long, default_value = products::NBM)]
    pub product: String,

    /// Region code (e.g. "CO", "HI"); omit for the product's default files
    #[arg(short, long)]
    pub region: Option<String>,

    /// Issuance time, ISO-8601 UTC (e.g. "2024-09-05T12:00")
    #[arg(long, value_parser = parse_time_arg)]
    pub issue: DateTime<Utc>,

    /// Valid time, ISO-8601 UTC; must not precede the issuance time
    #[arg(long, value_parser = parse_time_arg)]
    pub valid: DateTime<Utc>,
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub forecast: ForecastArgs,

    /// Field to download; repeat for several fields
    #[arg(short, long = "field", value_name = "FIELD", required = true)]
    pub fields: Vec<String>,

    /// Destination directory (defaults to the configured cache root)
    #[arg(short, long, value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Number of fields downloaded concurrently
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Ask intermediaries not to serve cached responses
    #[arg(long)]
    pub no_cache: bool,
}

/// Arguments for the fields command
#[derive(Args, Debug, Clone)]
pub struct FieldsArgs {
    /// Only list this product
    #[arg(short, long)]
    pub product: Option<String>,
}

/// Arguments for the size command
#[derive(Args, Debug, Clone)]
pub struct SizeArgs {
    #[command(flatten)]
    pub forecast: ForecastArgs,

    /// Query the index file instead of the data file
    #[arg(long)]
    pub index: bool,
}

/// Arguments for the config command
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Write the default configuration to the user config path
    #[arg(long)]
    pub init: bool,

    /// Overwrite an existing file when used with --init
    #[arg(long, requires = "init")]
    pub force: bool,
}

fn parse_time_arg(value: &str) -> Result<DateTime<Utc>, String> {
    parse_timestamp(value).map_err(|e| e.to_string())
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Whether any of `--quiet`, `--verbose` or `--very-verbose` was given
    pub fn has_verbosity_flag(&self) -> bool {
        self.global.quiet || self.global.verbose || self.global.very_verbose
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}

impl DownloadArgs {
    /// Reject argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 || concurrency > workers::MAX_CONCURRENCY {
                return Err(format!(
                    "Concurrency must be between 1 and {}",
                    workers::MAX_CONCURRENCY
                ));
            }
        }

        if self.forecast.valid < self.forecast.issue {
            return Err("Valid time must not be before the issuance time".to_string());
        }

        Ok(())
    }

    /// Requested fields in order, without repeats
    pub fn unique_fields(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.fields
            .iter()
            .filter(|field| seen.insert(field.as_str()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("grib_fetcher").chain(args.iter().copied())).unwrap()
    }

    fn download_args(cli: Cli) -> DownloadArgs {
        match cli.command {
            Commands::Download(args) => args,
            other => panic!("expected download command, got {:?}", other),
        }
    }

    #[test]
    fn test_download_args_parsing() {
        let args = download_args(parse(&[
            "download",
            "--region",
            "CO",
            "--issue",
            "2024-09-05T12:00",
            "--valid",
            "2024-09-05T13:00Z",
            "-f",
            "RAIN1HR",
            "-f",
            "TEMP",
        ]));

        assert_eq!(args.forecast.product, "NBM");
        assert_eq!(args.forecast.region.as_deref(), Some("CO"));
        assert_eq!(
            args.forecast.issue,
            Utc.with_ymd_and_hms(2024, 9, 5, 12, 0, 0).unwrap()
        );
        assert_eq!(
            args.forecast.valid,
            Utc.with_ymd_and_hms(2024, 9, 5, 13, 0, 0).unwrap()
        );
        assert_eq!(args.fields, vec!["RAIN1HR", "TEMP"]);
        assert!(args.dest.is_none());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_download_requires_field_and_times() {
        assert!(
            Cli::try_parse_from(["grib_fetcher", "download", "--issue", "2024-09-05T12"]).is_err()
        );
        assert!(Cli::try_parse_from([
            "grib_fetcher",
            "download",
            "--issue",
            "yesterday",
            "--valid",
            "2024-09-05T12",
            "-f",
            "TEMP"
        ])
        .is_err());
    }

    #[test]
    fn test_download_args_validation() {
        let mut args = download_args(parse(&[
            "download",
            "--issue",
            "2024-09-05T12",
            "--valid",
            "2024-09-05T18",
            "-f",
            "TEMP",
        ]));
        assert!(args.validate().is_ok());

        args.concurrency = Some(0);
        assert!(args.validate().is_err());
        args.concurrency = Some(workers::MAX_CONCURRENCY + 1);
        assert!(args.validate().is_err());
        args.concurrency = Some(2);
        assert!(args.validate().is_ok());

        args.forecast.valid = args.forecast.issue - chrono::Duration::hours(1);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_unique_fields_keeps_order() {
        let args = download_args(parse(&[
            "download",
            "--issue",
            "2024-09-05T12",
            "--valid",
            "2024-09-05T18",
            "-f",
            "TEMP",
            "-f",
            "RAIN1HR",
            "-f",
            "TEMP",
        ]));
        assert_eq!(args.unique_fields(), vec!["TEMP", "RAIN1HR"]);
    }

    #[test]
    fn test_log_level() {
        assert_eq!(parse(&["fields"]).log_level(), tracing::Level::WARN);
        assert_eq!(parse(&["-v", "fields"]).log_level(), tracing::Level::INFO);
        assert_eq!(parse(&["fields", "--very-verbose"]).log_level(), tracing::Level::DEBUG);
        assert_eq!(parse(&["-q", "-v", "fields"]).log_level(), tracing::Level::ERROR);
        assert!(!parse(&["fields"]).has_verbosity_flag());
        assert!(parse(&["fields", "-q"]).has_verbosity_flag());
    }

    #[test]
    fn test_config_force_requires_init() {
        assert!(Cli::try_parse_from(["grib_fetcher", "config", "--force"]).is_err());
        let cli = parse(&["config", "--init", "--force"]);
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigArgs { init: true, force: true })
        ));
    }
}
