//! Runtime configuration for the sync core.
//!
//! `AppConfig` is what hosts load (a JSON profile plus environment
//! overrides); `SyncSettings` and `RemoteConfig` are what the core consumes.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

pub const ENV_SUPABASE_URL: &str = "TEAMHUB_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "TEAMHUB_SUPABASE_ANON_KEY";
pub const ENV_DB_PATH: &str = "TEAMHUB_DB_PATH";
pub const ENV_DRAIN_POLICY: &str = "TEAMHUB_DRAIN_POLICY";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What happens to queue items whose replay failed during a drain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainPolicy {
    /// Clear the whole queue after every pass, losing failed items
    ClearAll,
    /// Keep failed items for the next drain
    #[default]
    RetainFailed,
}

impl DrainPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClearAll => "clear_all",
            Self::RetainFailed => "retain_failed",
        }
    }
}

impl FromStr for DrainPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "clear_all" => Ok(Self::ClearAll),
            "retain_failed" => Ok(Self::RetainFailed),
            other => Err(ConfigError::Invalid(format!(
                "unknown drain policy '{other}' (expected clear_all or retain_failed)"
            ))),
        }
    }
}

/// Behavior knobs of the sync core
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub drain_policy: DrainPolicy,
    /// Seed a demo team when the store is empty and no remote is configured
    pub seed_on_first_run: bool,
    pub http_timeout: Duration,
    /// Interval of the opt-in reachability probe
    pub probe_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            drain_policy: DrainPolicy::default(),
            seed_on_first_run: true,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
        }
    }
}

/// Hosted remote store endpoint.
///
/// The anon key is a publishable key; secret credentials never belong here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub anon_key: Option<String>,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            anon_key: Some(anon_key.into()),
        }
    }

    /// Trim both values and validate them as a pair.
    pub fn normalized(self) -> Result<Self, ConfigError> {
        let url = normalize_text_option(self.url);
        let anon_key = normalize_text_option(self.anon_key);

        match (&url, &anon_key) {
            (None, None) => Ok(Self::default()),
            (Some(value), Some(_)) => {
                if !is_http_url(value) {
                    return Err(ConfigError::Invalid(
                        "remote url must include http:// or https://".to_string(),
                    ));
                }
                Ok(Self {
                    url: url.map(|url| url.trim_end_matches('/').to_string()),
                    anon_key,
                })
            }
            _ => Err(ConfigError::Invalid(
                "remote url and anon key must be set together".to_string(),
            )),
        }
    }

    pub fn is_configured(&self) -> bool {
        normalize_text_option(self.url.clone()).is_some()
            && normalize_text_option(self.anon_key.clone()).is_some()
    }

    /// Base URL of the REST API
    pub fn rest_url(&self) -> Option<String> {
        let url = normalize_text_option(self.url.clone())?;
        Some(format!("{}/rest/v1", url.trim_end_matches('/')))
    }

    /// Websocket URL of the realtime API
    pub fn realtime_url(&self) -> Option<String> {
        let url = normalize_text_option(self.url.clone())?;
        let anon_key = normalize_text_option(self.anon_key.clone())?;
        let url = url.trim_end_matches('/');
        let url = if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return None;
        };
        Some(format!(
            "{url}/realtime/v1/websocket?apikey={anon_key}&vsn=1.0.0"
        ))
    }
}

/// Host-level configuration profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    #[serde(default)]
    pub drain_policy: Option<DrainPolicy>,
    #[serde(default)]
    pub seed_on_first_run: Option<bool>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Load a JSON profile; a missing file yields the defaults.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `TEAMHUB_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `TEAMHUB_*` overrides from `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = normalize_text_option(lookup(ENV_SUPABASE_URL)) {
            self.remote.url = Some(url);
        }
        if let Some(anon_key) = normalize_text_option(lookup(ENV_SUPABASE_ANON_KEY)) {
            self.remote.anon_key = Some(anon_key);
        }
        if let Some(db_path) = normalize_text_option(lookup(ENV_DB_PATH)) {
            self.db_path = Some(PathBuf::from(db_path));
        }
        if let Some(policy) = normalize_text_option(lookup(ENV_DRAIN_POLICY)) {
            self.drain_policy = Some(policy.parse()?);
        }

        self.remote = self.remote.normalized()?;
        Ok(self)
    }

    /// Core settings derived from this profile
    pub fn sync_settings(&self) -> SyncSettings {
        let defaults = SyncSettings::default();
        SyncSettings {
            drain_policy: self.drain_policy.unwrap_or(defaults.drain_policy),
            seed_on_first_run: self.seed_on_first_run.unwrap_or(defaults.seed_on_first_run),
            http_timeout: self
                .http_timeout_secs
                .map_or(defaults.http_timeout, Duration::from_secs),
            probe_interval: defaults.probe_interval,
        }
    }
}
