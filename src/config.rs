//! User configuration management
//!
//! Configuration is stored in TOML format at `~/.altpub/config.toml`. Every
//! field has a default, so a missing file (or a file with only a few keys)
//! is a valid configuration.
//!
//! # Examples
//!
//! ```no_run
//! use altpub::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::load()?;
//! println!("Store API: {}", config.api.base_url);
//!
//! config.upload.chunk_size_mb = 25;
//! config.save()?;
//! # Ok(())
//! # }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Token baked in at build time, used when nothing else provides one
pub const DEFAULT_API_TOKEN: Option<&str> = option_env!("ALTPUB_DEFAULT_TOKEN");

const MIB: u64 = 1024 * 1024;

/// Largest accepted `upload.chunk_size_mb`
pub const MAX_CHUNK_SIZE_MB: u64 = 4096;

/// User configuration file (`~/.altpub/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Destination store API
    #[serde(default)]
    pub api: ApiConfig,

    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Source catalog
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Chunked upload settings
    #[serde(default)]
    pub upload: UploadConfig,

    /// App payload settings
    #[serde(default)]
    pub publish: PublishConfig,

    /// HTTP timeouts and retry policy
    #[serde(default)]
    pub http: HttpConfig,

    /// Ledger and scratch locations
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "https://appstore.nabzclan.vip/api/dev".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token for the store API
    pub token: Option<String>,
}

impl AuthConfig {
    pub fn format_auth_header(token: &str) -> String {
        format!("Bearer {}", token)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// AltStore source URL
    #[serde(default = "default_catalog_url")]
    pub url: String,

    /// Only entries with this `type` are published
    #[serde(default = "default_package_type")]
    pub package_type: i64,
}

fn default_catalog_url() -> String {
    "https://repo.altstore.com".to_string()
}

fn default_package_type() -> i64 {
    1
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: default_catalog_url(),
            package_type: default_package_type(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Size of each uploaded chunk, in MiB
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: u64,
}

fn default_chunk_size_mb() -> u64 {
    50
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_mb: default_chunk_size_mb(),
        }
    }
}

impl UploadConfig {
    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_mb.saturating_mul(MIB)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Category name to select; the first category is used when missing
    #[serde(default = "default_preferred_category")]
    pub preferred_category: String,

    /// Platform name to select; the first platform is used when missing
    #[serde(default = "default_preferred_platform")]
    pub preferred_platform: String,

    /// The store rejects descriptions above 700 characters
    #[serde(default = "default_description_max_chars")]
    pub description_max_chars: usize,
}

fn default_preferred_category() -> String {
    "Tweaked App".to_string()
}

fn default_preferred_platform() -> String {
    "iOS".to_string()
}

fn default_description_max_chars() -> usize {
    500
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            preferred_category: default_preferred_category(),
            preferred_platform: default_preferred_platform(),
            description_max_chars: default_description_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for API calls (metadata, create, initiate, finalize, link)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for bulk transfers (downloads, chunk sends, icon upload)
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Retries for idempotent calls (0 disables retrying)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
}

fn default_request_timeout() -> u64 {
    60
}

fn default_transfer_timeout() -> u64 {
    900
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_retry_max_delay() -> u64 {
    8000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            transfer_timeout_secs: default_transfer_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// JSON file listing already uploaded bundle identifiers
    #[serde(default = "default_ledger_path")]
    pub ledger: String,

    /// Scratch directory for downloads
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
}

fn default_ledger_path() -> String {
    "uploaded_apps.json".to_string()
}

fn default_work_dir() -> String {
    "./temp".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            ledger: default_ledger_path(),
            work_dir: default_work_dir(),
        }
    }
}

impl PathsConfig {
    pub fn ledger_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.ledger).to_string())
    }

    pub fn work_dir_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.work_dir).to_string())
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// Uses ALTPUB_CONFIG_DIR if set, otherwise ~/.altpub/config.toml
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(config_dir) = std::env::var("ALTPUB_CONFIG_DIR") {
            return Ok(PathBuf::from(config_dir).join("config.toml"));
        }

        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| Error::Other("Could not find home directory".to_string()))?;

        Ok(PathBuf::from(home).join(".altpub").join("config.toml"))
    }

    /// Load config from the default location, or defaults if it doesn't exist
    ///
    /// Environment variable overrides:
    /// - `ALTPUB_TOKEN`: Overrides `auth.token`
    /// - `ALTPUB_CONFIG_DIR`: Overrides the config directory location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load config from an explicit file, applying the same env overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if !path.exists() {
            Self::default()
        } else {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        };

        if let Ok(token) = std::env::var("ALTPUB_TOKEN") {
            if !token.is_empty() {
                config.auth.token = Some(token);
            }
        }

        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check values that would only fail later, mid-run
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [("api.base_url", &self.api.base_url), ("catalog.url", &self.catalog.url)] {
            url::Url::parse(value)
                .map_err(|e| Error::InvalidConfig(format!("{} = \"{}\": {}", key, value, e)))?;
        }

        if self.upload.chunk_size_mb == 0 {
            return Err(Error::InvalidConfig(
                "upload.chunk_size_mb must be greater than 0".to_string(),
            ));
        }

        // Each chunk is held in memory before it is sent
        if self.upload.chunk_size_mb > MAX_CHUNK_SIZE_MB {
            return Err(Error::InvalidConfig(format!(
                "upload.chunk_size_mb must be at most {}",
                MAX_CHUNK_SIZE_MB
            )));
        }

        if self.publish.description_max_chars == 0 {
            return Err(Error::InvalidConfig(
                "publish.description_max_chars must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Pick the token to authenticate with
    ///
    /// An explicit token wins, then the configured one (which already carries
    /// `ALTPUB_TOKEN`), then the build-time default.
    pub fn resolve_token(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| self.auth.token.clone().filter(|t| !t.is_empty()))
            .or_else(|| DEFAULT_API_TOKEN.map(str::to_string))
            .ok_or_else(|| {
                Error::InvalidConfig(
                    "No API token provided.\n\n\
                     Pass it as the first argument, set ALTPUB_TOKEN,\n\
                     or run: altpub config set auth.token <token>"
                        .to_string(),
                )
            })
    }

    /// Set a scalar value by its dotted key
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parse_u64 = |v: &str| {
            v.parse::<u64>()
                .map_err(|_| Error::InvalidConfig(format!("{} expects a whole number", key)))
        };

        match key {
            "api.base_url" => self.api.base_url = value.to_string(),
            "auth.token" => {
                self.auth.token = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "catalog.url" => self.catalog.url = value.to_string(),
            "catalog.package_type" => {
                self.catalog.package_type = value
                    .parse::<i64>()
                    .map_err(|_| Error::InvalidConfig(format!("{} expects an integer", key)))?
            }
            "upload.chunk_size_mb" => self.upload.chunk_size_mb = parse_u64(value)?,
            "publish.preferred_category" => self.publish.preferred_category = value.to_string(),
            "publish.preferred_platform" => self.publish.preferred_platform = value.to_string(),
            "publish.description_max_chars" => {
                self.publish.description_max_chars = parse_u64(value)? as usize
            }
            "http.request_timeout_secs" => self.http.request_timeout_secs = parse_u64(value)?,
            "http.transfer_timeout_secs" => self.http.transfer_timeout_secs = parse_u64(value)?,
            "http.connect_timeout_secs" => self.http.connect_timeout_secs = parse_u64(value)?,
            "http.max_retries" => self.http.max_retries = parse_u64(value)? as u32,
            "http.retry_base_delay_ms" => self.http.retry_base_delay_ms = parse_u64(value)?,
            "http.retry_max_delay_ms" => self.http.retry_max_delay_ms = parse_u64(value)?,
            "paths.ledger" => self.paths.ledger = value.to_string(),
            "paths.work_dir" => self.paths.work_dir = value.to_string(),
            _ => return Err(Error::InvalidConfig(format!("Unknown key: {}", key))),
        }

        self.validate()
    }

    /// Keys accepted by [`Config::set_value`]
    pub fn settable_keys() -> &'static [&'static str] {
        &[
            "api.base_url",
            "auth.token",
            "catalog.url",
            "catalog.package_type",
            "upload.chunk_size_mb",
            "publish.preferred_category",
            "publish.preferred_platform",
            "publish.description_max_chars",
            "http.request_timeout_secs",
            "http.transfer_timeout_secs",
            "http.connect_timeout_secs",
            "http.max_retries",
            "http.retry_base_delay_ms",
            "http.retry_max_delay_ms",
            "paths.ledger",
            "paths.work_dir",
        ]
    }
}
