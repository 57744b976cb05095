//! # Adapter Configuration
//!
//! Settings are layered with the `config` crate: built-in defaults first, then
//! `PUBSUB_`-prefixed environment variables.
//!
//! | Variable                    | Default   |
//! |-----------------------------|-----------|
//! | `PUBSUB_BIND_ADDRESS`       | `0.0.0.0` |
//! | `PUBSUB_PORT`               | `8080`    |
//! | `PUBSUB_SUBMIT_TIMEOUT_MS`  | unset     |
//! | `PUBSUB_LOG_FORMAT`         | `pretty`  |

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::ConfigurationError;

pub const ENV_PREFIX: &str = "PUBSUB";

/// Console output style for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub bind_address: String,
    /// `0` binds an ephemeral port
    pub port: u16,
    /// Upper bound on how long an HTTP caller waits for the consumer
    pub submit_timeout_ms: Option<u64>,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            submit_timeout_ms: None,
            log_format: LogFormat::Pretty,
        }
    }
}

impl AdapterConfig {
    /// Load from defaults overlaid with `PUBSUB_*` environment variables
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from an explicit environment source, useful where process
    /// variables must not be touched
    pub fn from_environment(environment: config::Environment) -> Result<Self, ConfigurationError> {
        let defaults = Self::default();

        let settings = config::Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("log_format", "pretty")?
            .add_source(environment.try_parsing(true))
            .build()?;

        let config: AdapterConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.bind_address.parse::<IpAddr>().is_err() {
            return Err(ConfigurationError::invalid_value(
                "bind_address",
                &self.bind_address,
                "expected an IP address",
            ));
        }

        if self.submit_timeout_ms == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "submit_timeout_ms",
                "0",
                "timeout must be greater than zero when set",
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigurationError> {
        let ip = self.bind_address.parse::<IpAddr>().map_err(|e| {
            ConfigurationError::invalid_value("bind_address", &self.bind_address, e.to_string())
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn submit_timeout(&self) -> Option<Duration> {
        self.submit_timeout_ms.map(Duration::from_millis)
    }

    /// Loopback config on an ephemeral port
    pub fn for_testing() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            ..Self::default()
        }
    }
}
