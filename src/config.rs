//! Configuration management for GRIB Fetcher
//!
//! Settings come from a TOML file found in standard locations, with
//! zero-config defaults for everything. Durations are written in human form
//! (`"90s"`, `"10m"`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{BatchConfig, CacheConfig, ClientConfig, FetchConfig, ProductCatalog};
use crate::constants::{http, limits, workers};
use crate::errors::{ConfigError, ConfigResult};

/// File name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "grib-fetcher.toml";

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP object store settings
    pub client: ClientConfigToml,
    /// Per-fetch settings
    pub fetch: FetchConfigToml,
    /// Batch download settings
    pub batch: BatchConfigToml,
    /// Local cache settings
    pub cache: CacheConfigToml,
    /// Additional product catalogs
    pub catalog: CatalogConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// Enable HTTP/2 adaptive window
    pub http2: bool,
    /// TCP keep-alive interval (None = disabled)
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive: Option<Duration>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout (None = no timeout)
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum connections per host
    pub pool_max_per_host: usize,
    /// Request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
    /// Retries for 429, 503 and connection failures
    pub max_retries: u32,
    /// Send `Cache-Control: no-cache`
    pub disable_cache: bool,
    /// Path-style S3 endpoint override
    pub s3_endpoint: Option<String>,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            http2: false,
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
            max_retries: limits::MAX_RETRIES,
            disable_cache: false,
            s3_endpoint: None,
        }
    }
}

/// TOML-friendly fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfigToml {
    /// Upper bound on a single copy
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for FetchConfigToml {
    fn default() -> Self {
        Self {
            timeout: workers::FETCH_TIMEOUT,
        }
    }
}

/// TOML-friendly batch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfigToml {
    /// Maximum requests in flight
    pub max_concurrent: usize,
}

impl Default for BatchConfigToml {
    fn default() -> Self {
        Self {
            max_concurrent: workers::DEFAULT_CONCURRENCY,
        }
    }
}

/// TOML-friendly cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfigToml {
    /// Default destination directory (None = OS cache directory)
    pub cache_root: Option<PathBuf>,
    /// Create missing destination directories
    pub create_dirs: bool,
}

impl Default for CacheConfigToml {
    fn default() -> Self {
        Self {
            cache_root: None,
            create_dirs: true,
        }
    }
}

/// Product catalog files merged over the built-in products
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatalogConfigToml {
    pub files: Vec<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application, overridden by `-v`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> (ClientConfig, FetchConfig, BatchConfig, CacheConfig) {
        (
            self.client.to_runtime_config(),
            self.fetch.to_runtime_config(),
            self.batch.to_runtime_config(),
            self.cache.to_runtime_config(),
        )
    }

    /// Load configuration with precedence:
    /// 1. Explicit path (must exist)
    /// 2. `./grib-fetcher.toml`
    /// 3. User config directory
    /// 4. System config (Unix)
    /// 5. Default values
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let config = match config_path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot work at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |field: &str, value: String, reason: &str| {
            Err(ConfigError::InvalidValue {
                field: field.to_string(),
                value,
                reason: reason.to_string(),
            })
        };

        if self.client.rate_limit_rps == 0 {
            return invalid("client.rate_limit_rps", "0".to_string(), "Must be at least 1");
        }
        if self.client.max_retries > limits::MAX_RETRIES_LIMIT {
            return invalid(
                "client.max_retries",
                self.client.max_retries.to_string(),
                &format!("Must be at most {}", limits::MAX_RETRIES_LIMIT),
            );
        }
        if self.batch.max_concurrent == 0 || self.batch.max_concurrent > workers::MAX_CONCURRENCY {
            return invalid(
                "batch.max_concurrent",
                self.batch.max_concurrent.to_string(),
                &format!("Must be between 1 and {}", workers::MAX_CONCURRENCY),
            );
        }
        if self.fetch.timeout.is_zero() {
            return invalid("fetch.timeout", "0s".to_string(), "Must be positive");
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return invalid(
                "logging.level",
                self.logging.level.clone(),
                "Must be one of error, warn, info, debug, trace",
            );
        }
        Ok(())
    }

    /// Built-in products plus every configured catalog file
    pub async fn load_catalog(&self) -> ConfigResult<ProductCatalog> {
        let mut catalog = ProductCatalog::builtin()?;
        for path in &self.catalog.files {
            catalog.merge(ProductCatalog::load(path).await?)?;
        }
        Ok(catalog)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(".").join(LOCAL_CONFIG_FILE)];
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }
        #[cfg(unix)]
        search_paths.push(PathBuf::from("/etc/grib-fetcher/config.toml"));

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("grib-fetcher").join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Default configuration content with comments
    pub fn generate_default_config_content() -> String {
        let default_cache_path = CacheConfig::default()
            .resolve_root()
            .unwrap_or_else(|_| PathBuf::from("./cache"));

        format!(
            r#"# GRIB Fetcher Configuration

[client]
# HTTP object store settings
http2 = false
tcp_keepalive = "30s"
tcp_nodelay = true
pool_idle_timeout = "{}s"
pool_max_per_host = {}
request_timeout = "{}s"
connect_timeout = "{}s"
rate_limit_rps = {}
max_retries = {}
# Send Cache-Control: no-cache with every request
disable_cache = false
# Path-style endpoint for s3:// URIs, e.g. a local mirror
# s3_endpoint = "http://localhost:9000"

[fetch]
# Upper bound on a single index or field download
timeout = "{}s"

[batch]
# Fields downloaded concurrently
max_concurrent = {}

[cache]
# Default destination directory: {}
# cache_root = "/path/to/grib/files"
create_dirs = true

[catalog]
# Extra product definitions merged over the built-in NBM product
files = []

[logging]
level = "warn"  # used when no -v or -q flag is given; error, warn, info, debug, trace
"#,
            http::POOL_IDLE_TIMEOUT.as_secs(),
            http::POOL_MAX_PER_HOST,
            http::DEFAULT_TIMEOUT.as_secs(),
            http::CONNECT_TIMEOUT.as_secs(),
            limits::DEFAULT_RATE_LIMIT_RPS,
            limits::MAX_RETRIES,
            workers::FETCH_TIMEOUT.as_secs(),
            workers::DEFAULT_CONCURRENCY,
            default_cache_path.display()
        )
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            http2: self.http2,
            tcp_keepalive: self.tcp_keepalive,
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout,
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            rate_limit_rps: self.rate_limit_rps,
            max_retries: self.max_retries,
            disable_cache: self.disable_cache,
            s3_endpoint: self.s3_endpoint.clone(),
        }
    }
}

impl FetchConfigToml {
    /// Convert to runtime FetchConfig
    pub fn to_runtime_config(&self) -> FetchConfig {
        FetchConfig {
            timeout: self.timeout,
        }
    }
}

impl BatchConfigToml {
    /// Convert to runtime BatchConfig
    pub fn to_runtime_config(&self) -> BatchConfig {
        BatchConfig {
            max_concurrent: self.max_concurrent,
        }
    }
}

impl CacheConfigToml {
    /// Convert to runtime CacheConfig
    pub fn to_runtime_config(&self) -> CacheConfig {
        CacheConfig {
            cache_root: self.cache_root.clone(),
            create_dirs: self.create_dirs,
        }
    }
}
