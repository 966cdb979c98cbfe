//! Database configuration
//!
//! `DATABASE_URL` is required and is checked when the configuration is
//! built, so a misconfigured deployment fails at startup rather than on the
//! first request. Pool tuning comes from built-in defaults, then an optional
//! TOML file, then `EVENTLY_DB_*` environment variables (highest priority).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable holding the store's connection URI
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";

const MAX_CONNECTIONS_VAR: &str = "EVENTLY_DB_MAX_CONNECTIONS";
const CONNECT_TIMEOUT_VAR: &str = "EVENTLY_DB_CONNECT_TIMEOUT_SECS";
const ACQUIRE_TIMEOUT_VAR: &str = "EVENTLY_DB_ACQUIRE_TIMEOUT_SECS";
const OPERATION_TIMEOUT_VAR: &str = "EVENTLY_DB_OPERATION_TIMEOUT_SECS";

/// Configuration errors. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("DATABASE_URL is not set; define it in the environment or in .env")]
    MissingDatabaseUrl,

    #[error("invalid DATABASE_URL: {reason}")]
    InvalidDatabaseUrl { reason: &'static str },

    #[error("invalid value '{value}' for {key}")]
    InvalidSetting { key: &'static str, value: String },

    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Connection pool tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Upper bound on a single connection attempt
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// How long an operation waits for a pooled connection before failing.
    /// Kept short so commands never queue behind a dead store.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Upper bound on the existence-check + write pair of a booking
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
        }
    }
}

// Default value functions for serde
fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    3
}

fn default_operation_timeout_secs() -> u64 {
    5
}

/// On-disk config file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    database: PoolSettings,
}

impl PoolSettings {
    /// Load pool settings from a TOML file with a `[database]` table.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Loaded pool settings from {}", path.display());
        Ok(file.database)
    }

    /// Load settings from the first config file found, or defaults.
    ///
    /// Lookup order: `./evently.toml`, then `~/.evently/config.toml`.
    pub fn discover() -> Result<Self, ConfigError> {
        let local = PathBuf::from("evently.toml");
        if local.exists() {
            return Self::from_file(local);
        }

        if let Some(global) = dirs::home_dir().map(|home| home.join(".evently").join("config.toml")) {
            if global.exists() {
                return Self::from_file(global);
            }
        }

        Ok(Self::default())
    }

    fn apply_overrides<F>(mut self, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override(lookup, MAX_CONNECTIONS_VAR)? {
            self.max_connections = v;
        }
        if let Some(v) = parse_override(lookup, CONNECT_TIMEOUT_VAR)? {
            self.connect_timeout_secs = v;
        }
        if let Some(v) = parse_override(lookup, ACQUIRE_TIMEOUT_VAR)? {
            self.acquire_timeout_secs = v;
        }
        if let Some(v) = parse_override(lookup, OPERATION_TIMEOUT_VAR)? {
            self.operation_timeout_secs = v;
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidSetting {
                key: MAX_CONNECTIONS_VAR,
                value: "0".to_owned(),
            });
        }

        Ok(self)
    }
}

fn parse_override<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidSetting { key, value: raw }),
    }
}

/// Validated database configuration.
///
/// Holding one of these proves the connection URI was present at startup.
#[derive(Clone)]
pub struct DatabaseConfig {
    url: String,
    settings: PoolSettings,
}

impl DatabaseConfig {
    /// Build a config from an explicit URI.
    pub fn new(url: impl Into<String>, settings: PoolSettings) -> Result<Self, ConfigError> {
        let url = url.into().trim().to_owned();

        if url.is_empty() {
            return Err(ConfigError::MissingDatabaseUrl);
        }

        if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
            return Err(ConfigError::InvalidDatabaseUrl {
                reason: "expected a postgres:// or postgresql:// URI",
            });
        }

        Ok(Self { url, settings })
    }

    /// Build from the process environment with default pool settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(PoolSettings::default())
    }

    /// Build from the process environment on top of the given base settings.
    pub fn from_env_with(base: PoolSettings) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), base)
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F, base: PoolSettings) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(DATABASE_URL_VAR).ok_or(ConfigError::MissingDatabaseUrl)?;
        let settings = base.apply_overrides(&lookup)?;
        Self::new(url, settings)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn max_connections(&self) -> u32 {
        self.settings.max_connections
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.connect_timeout_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.acquire_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.operation_timeout_secs)
    }

    /// The URI with any password replaced, safe for logs.
    pub fn redacted_url(&self) -> String {
        redact(&self.url)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.redacted_url())
            .field("settings", &self.settings)
            .finish()
    }
}

fn redact(url: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|i| i + 3) else {
        return url.to_owned();
    };
    let rest = &url[scheme_end..];
    // userinfo can only appear in the authority, before any path or query
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let Some(at) = rest[..authority_end].rfind('@') else {
        return url.to_owned();
    };
    let userinfo = &rest[..at];
    match userinfo.find(':') {
        Some(colon) => format!(
            "{}{}:***{}",
            &url[..scheme_end],
            &userinfo[..colon],
            &rest[at..]
        ),
        None => url.to_owned(),
    }
}
