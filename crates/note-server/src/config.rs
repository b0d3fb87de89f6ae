//! Server configuration, read from the environment

use crate::storage::BackendConfig;
use tracing::warn;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Logging and trace export settings, loaded before the subscriber exists
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_format: LogFormat,
    /// OTLP/gRPC collector; spans are only exported when this is set
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            log_format: LogFormat::parse(lookup("LOG_FORMAT").as_deref()),
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|e| !e.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub backend: BackendConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = BackendConfig::default();

        let bind_address = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8000".to_string());

        let redis_ttl_secs = lookup("REDIS_TTL_SECS").and_then(|raw| match raw.parse::<u64>() {
            Ok(0) => None,
            Ok(secs) => Some(secs),
            Err(_) => {
                warn!("Ignoring invalid REDIS_TTL_SECS {:?}; notes will not expire", raw);
                None
            }
        });

        let backend = BackendConfig {
            backend: lookup("BACKEND"),
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            redis_key_prefix: lookup("REDIS_KEY_PREFIX").unwrap_or(defaults.redis_key_prefix),
            redis_ttl_secs,
            gcs_bucket: lookup("GCS_BUCKET").filter(|b| !b.is_empty()),
            gcs_prefix: lookup("GCS_PREFIX").unwrap_or(defaults.gcs_prefix),
        };

        Self {
            bind_address,
            backend,
        }
    }
}
