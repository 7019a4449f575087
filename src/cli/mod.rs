//! Command-line interface components
//!
//! This module contains CLI-specific code for the GRIB Fetcher application:
//! argument parsing and the command handlers.

pub mod args;
pub mod commands;

pub use args::{
    Cli, Commands, ConfigArgs, DownloadArgs, FieldsArgs, ForecastArgs, GlobalArgs, SizeArgs,
};
pub use commands::{handle_config, handle_download, handle_fields, handle_size};
