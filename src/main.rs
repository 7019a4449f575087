//! GRIB Fetcher CLI application
//!
//! Command-line interface for downloading single fields of forecast GRIB2
//! files with byte-range requests.

use std::process;

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

// Import CLI modules through the library (module is public but not re-exported)
use grib_fetcher::cli::{
    Cli, Commands, handle_config, handle_download, handle_fields, handle_size,
};
use grib_fetcher::config::AppConfig;
use grib_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    // Initialize program
    let result = run().await;

    // Handle any errors that occurred
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok(); // Ignore errors if file doesn't exist

    // Parse command line arguments
    let cli = Cli::parse_args();

    // Configuration is loaded before logging starts since it may set the level
    let config_path = cli.global.config.clone();
    let config = AppConfig::load(config_path.clone()).await;

    // Initialize logging based on verbosity
    init_logging(&cli, config.as_ref().ok().map(|c| c.logging.level.as_str()));

    info!("GRIB Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    // Execute the appropriate command
    match cli.command {
        Commands::Download(args) => {
            info!("Executing download command");
            handle_download(args, config?).await
        }
        Commands::Fields(args) => {
            info!("Executing fields command");
            handle_fields(args, &config?).await
        }
        Commands::Size(args) => {
            info!("Executing size command");
            handle_size(args, &config?).await
        }
        Commands::Config(args) => {
            info!("Executing config command");
            handle_config(args, config_path, config.err()).await
        }
    }
}

/// Initialize logging based on CLI verbosity settings
///
/// The configured level applies only when no verbosity flag was given.
fn init_logging(cli: &Cli, configured_level: Option<&str>) {
    let log_level = match configured_level {
        Some(level) if !cli.has_verbosity_flag() => level.to_string(),
        _ => cli.log_level().to_string(),
    };

    // Create environment filter
    let mut filter = EnvFilter::from_default_env();
    let directive = format!("grib_fetcher={}", log_level);
    match directive.parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring log directive {}: {}", directive, e),
    }

    // Initialize subscriber
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
