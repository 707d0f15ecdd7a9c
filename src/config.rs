//! Configuration management for Callgate.

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{CallgateError, Result};

/// Prefix for environment variable overrides, e.g. `CALLGATE_MAX_CALLS_LIMIT`.
pub const ENV_PREFIX: &str = "CALLGATE";

/// Limiter configuration.
///
/// The camelCase option names (`maxCallsLimit`, `timePeriod`, `userAgent`)
/// are accepted alongside the snake_case field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Store host name, or a full `redis://` URL
    #[serde(default = "default_host")]
    pub host: String,

    /// Store port, ignored when `host` is a URL
    #[serde(default = "default_port")]
    pub port: u16,

    /// Requests per window; the request reaching this count is the first denied
    #[serde(
        default = "default_max_calls_limit",
        alias = "maxCallsLimit",
        alias = "maxcallslimit"
    )]
    pub max_calls_limit: u64,

    /// Window length in seconds
    #[serde(
        default = "default_time_period",
        alias = "timePeriod",
        alias = "timeperiod"
    )]
    pub time_period: u64,

    /// Fold the user-agent string into the rate key
    #[serde(default, alias = "userAgent", alias = "useragent")]
    pub user_agent: bool,

    /// Upper bound on establishing the store connection
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_calls_limit: default_max_calls_limit(),
            time_period: default_time_period(),
            user_agent: false,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_max_calls_limit() -> u64 {
    5
}

fn default_time_period() -> u64 {
    86400
}

fn default_connect_timeout() -> u64 {
    5
}

impl LimiterConfig {
    /// Load configuration from an optional YAML file, overlaid with
    /// `CALLGATE_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading limiter configuration");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }

        let config: LimiterConfig = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LimiterConfig = serde_yaml::from_str(yaml)
            .map_err(|e| CallgateError::Config(format!("Failed to parse limiter config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the window counter cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(CallgateError::Config("host must not be empty".to_string()));
        }
        if self.max_calls_limit == 0 {
            return Err(CallgateError::Config(
                "max_calls_limit must be at least 1".to_string(),
            ));
        }
        if self.time_period == 0 {
            return Err(CallgateError::Config(
                "time_period must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }

    /// Connection URL for the store.
    pub fn store_url(&self) -> String {
        if self.host.starts_with("redis://") || self.host.starts_with("rediss://") {
            self.host.clone()
        } else {
            format!("redis://{}:{}/", self.host, self.port)
        }
    }

    /// Connection URL with any credentials masked, for logging.
    pub fn store_url_redacted(&self) -> String {
        let url = self.store_url();
        match (url.find("://"), url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***{}", &url[..scheme_end], &url[at..])
            }
            _ => url,
        }
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.time_period)
    }

    /// Connection timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
