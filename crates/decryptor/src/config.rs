//! Configuration loading and validation for the decryption function.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is present but invalid.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::crypto::suite::SuiteAllowList;
use crate::server::middleware::REQUEST_TIMEOUT;

/// Validated function configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Region of the parameter store. Falls back to the SDK's default chain.
    #[serde(default)]
    pub aws_region: Option<String>,

    /// Service name attached to logs, spans and metrics.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Port the invocation shell listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Keyring namespace. Must equal the provider id the platform encrypted with.
    #[serde(default = "default_key_namespace")]
    pub key_namespace: String,

    /// Parameter-store prefix; the key lives at `{prefix}/{key_id}/private-key`.
    #[serde(default = "default_key_parameter_prefix")]
    pub key_parameter_prefix: String,

    /// Upper bound on a single private-key fetch.
    #[serde(default = "default_key_fetch_timeout_ms")]
    pub key_fetch_timeout_ms: u64,

    /// Lifetime of a cached private key. `0` disables the cache.
    #[serde(default)]
    pub key_cache_ttl_secs: u64,

    /// Maximum number of private keys held by the cache.
    #[serde(default = "default_key_cache_capacity")]
    pub key_cache_capacity: usize,

    /// Comma-separated hex suite ids accepted for decryption. Empty means the
    /// default legacy non-committing list.
    #[serde(default)]
    pub allowed_algorithm_suites: String,

    /// Upper bound on encrypted data keys in one envelope.
    #[serde(default = "default_max_encrypted_data_keys")]
    pub max_encrypted_data_keys: usize,

    /// Upper bound on the decoded envelope size.
    #[serde(default = "default_max_envelope_bytes")]
    pub max_envelope_bytes: usize,

    /// Header carrying the invocation's request id.
    #[serde(default = "default_request_id_header")]
    pub request_id_header: String,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// SECURITY: when `true`, decrypted plaintext is logged at debug level.
    /// Intended only for short-lived troubleshooting in non-production accounts.
    #[serde(default)]
    pub log_decrypted_plaintext: bool,

    /// OTLP endpoint for spans and metrics. Logs only when absent.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,
}

fn default_service_name() -> String {
    "connect-decryption".into()
}
fn default_listen_port() -> u16 {
    8080
}
fn default_key_namespace() -> String {
    "upstream-platform".into()
}
fn default_key_parameter_prefix() -> String {
    "/upstream-platform/encryption".into()
}
fn default_key_fetch_timeout_ms() -> u64 {
    3000
}
fn default_key_cache_capacity() -> usize {
    16
}
fn default_max_encrypted_data_keys() -> usize {
    8
}
fn default_max_envelope_bytes() -> usize {
    64 * 1024
}
fn default_request_id_header() -> String {
    "lambda-runtime-aws-request-id".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aws_region: None,
            service_name: default_service_name(),
            listen_port: default_listen_port(),
            key_namespace: default_key_namespace(),
            key_parameter_prefix: default_key_parameter_prefix(),
            key_fetch_timeout_ms: default_key_fetch_timeout_ms(),
            key_cache_ttl_secs: 0,
            key_cache_capacity: default_key_cache_capacity(),
            allowed_algorithm_suites: String::new(),
            max_encrypted_data_keys: default_max_encrypted_data_keys(),
            max_envelope_bytes: default_max_envelope_bytes(),
            request_id_header: default_request_id_header(),
            log_level: default_log_level(),
            log_decrypted_plaintext: false,
            otel_exporter_otlp_endpoint: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let mut c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.otel_exporter_otlp_endpoint = c
            .otel_exporter_otlp_endpoint
            .take()
            .filter(|s| !s.trim().is_empty());

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.key_namespace, "KEY_NAMESPACE")?;
        ensure_non_empty(&self.key_parameter_prefix, "KEY_PARAMETER_PREFIX")?;
        ensure_non_empty(&self.request_id_header, "REQUEST_ID_HEADER")?;

        if !self.key_parameter_prefix.starts_with('/') {
            anyhow::bail!("KEY_PARAMETER_PREFIX must be an absolute parameter path");
        }
        if self.key_fetch_timeout_ms == 0 {
            anyhow::bail!("KEY_FETCH_TIMEOUT_MS must be > 0");
        }
        if self.key_fetch_timeout() >= REQUEST_TIMEOUT {
            anyhow::bail!(
                "KEY_FETCH_TIMEOUT_MS must be below the {} ms request timeout",
                REQUEST_TIMEOUT.as_millis()
            );
        }
        if self.key_cache_ttl_secs > 0 && self.key_cache_capacity == 0 {
            anyhow::bail!("KEY_CACHE_CAPACITY must be > 0 when the key cache is enabled");
        }
        if self.max_encrypted_data_keys == 0 {
            anyhow::bail!("MAX_ENCRYPTED_DATA_KEYS must be > 0");
        }
        if self.max_envelope_bytes == 0 {
            anyhow::bail!("MAX_ENVELOPE_BYTES must be > 0");
        }
        self.suite_allow_list()?;
        Ok(())
    }

    /// The parsed decrypt allow-list.
    pub fn suite_allow_list(&self) -> Result<SuiteAllowList> {
        SuiteAllowList::parse(&self.allowed_algorithm_suites)
            .context("ALLOWED_ALGORITHM_SUITES is invalid")
    }

    pub fn key_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.key_fetch_timeout_ms)
    }

    pub fn key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.key_cache_ttl_secs)
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let cfg = Config::default();
        assert_eq!(cfg.key_namespace, "upstream-platform");
        assert_eq!(cfg.key_parameter_prefix, "/upstream-platform/encryption");
        assert_eq!(cfg.key_fetch_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.key_cache_ttl(), Duration::ZERO);
        assert_eq!(cfg.listen_port, 8080);
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.log_decrypted_plaintext);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_namespace() {
        let cfg = Config {
            key_namespace: "  ".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_relative_prefix() {
        let cfg = Config {
            key_parameter_prefix: "upstream-platform/encryption".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let cfg = Config {
            key_fetch_timeout_ms: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_fetch_timeout_at_or_above_request_timeout() {
        let at_limit = Config {
            key_fetch_timeout_ms: REQUEST_TIMEOUT.as_millis() as u64,
            ..Config::default()
        };
        assert!(at_limit.validate().is_err());

        let below = Config {
            key_fetch_timeout_ms: REQUEST_TIMEOUT.as_millis() as u64 - 1,
            ..Config::default()
        };
        assert!(below.validate().is_ok());
    }

    #[test]
    fn validate_rejects_enabled_cache_without_capacity() {
        let cfg = Config {
            key_cache_ttl_secs: 60,
            key_cache_capacity: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_suite() {
        let cfg = Config {
            allowed_algorithm_suites: "0x0378,0x9999".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn narrowed_allow_list_parses() {
        let cfg = Config {
            allowed_algorithm_suites: "0x0378, 0x0178".into(),
            ..Config::default()
        };
        assert_eq!(cfg.suite_allow_list().unwrap().len(), 2);
    }
}
