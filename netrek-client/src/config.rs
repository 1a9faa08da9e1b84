//! Client configuration (§4.6, §4.8). Values come from the optional
//! `--config` file named in §6, then the `NETREK_CB_*` environment
//! overrides (§6) for the breaker — the only client-owned config the spec's
//! environment-override table names — and finally the CLI flags.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub connection_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub ping_interval: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connection_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            ping_interval: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(3),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Loads a config file per §6's `client --config path` flag, then
    /// applies the `NETREK_CB_*` environment overrides. The file is a
    /// [`ClientConfigFile`]; durations are given in seconds, matching the
    /// server's `ServerConfig` JSON convention.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file: ClientConfigFile = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: ClientConfig = file.into();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Resolves config from an optional file (falling back to built-in
    /// defaults when `path` is `None`), then applies the `NETREK_CB_*`
    /// environment overrides either way.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => return Self::load(path),
            None => ClientConfig::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Applies `NETREK_CB_MAX_REQUESTS`, `NETREK_CB_INTERVAL`,
    /// `NETREK_CB_TIMEOUT`, and `NETREK_CB_MAX_CONSECUTIVE_FAILS` (§6) —
    /// the breaker is the only client-owned config the spec's environment
    /// table names.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        use std::env::var;

        if let Ok(v) = var("NETREK_CB_MAX_REQUESTS") {
            let v: u32 = parse_env("NETREK_CB_MAX_REQUESTS", &v)?;
            check_range("NETREK_CB_MAX_REQUESTS", v as f64, 1.0, 100.0)?;
            self.circuit_breaker.max_requests = v;
        }
        if let Ok(v) = var("NETREK_CB_INTERVAL") {
            let v: f64 = parse_env("NETREK_CB_INTERVAL", &v)?;
            check_range("NETREK_CB_INTERVAL", v, 1.0, 300.0)?;
            self.circuit_breaker.interval = Duration::from_secs_f64(v);
        }
        if let Ok(v) = var("NETREK_CB_TIMEOUT") {
            let v: f64 = parse_env("NETREK_CB_TIMEOUT", &v)?;
            check_range("NETREK_CB_TIMEOUT", v, 1.0, 120.0)?;
            self.circuit_breaker.timeout = Duration::from_secs_f64(v);
        }
        if let Ok(v) = var("NETREK_CB_MAX_CONSECUTIVE_FAILS") {
            let v: u32 = parse_env("NETREK_CB_MAX_CONSECUTIVE_FAILS", &v)?;
            check_range("NETREK_CB_MAX_CONSECUTIVE_FAILS", v as f64, 1.0, 50.0)?;
            self.circuit_breaker.max_consecutive_failures = v;
        }
        Ok(())
    }

    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let file = ClientConfigFile::from(ClientConfig::default());
        let text = serde_json::to_string_pretty(&file).expect("default config always serializes");
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field: field.to_string(),
            reason: format!("{value} not in [{min}, {max}]"),
        });
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::OutOfRange {
        field: name.to_string(),
        reason: format!("'{value}' is not a valid value"),
    })
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub max_requests: u32,
    pub interval: Duration,
    pub timeout: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig {
            max_requests: 3,
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
            max_consecutive_failures: 5,
        }
    }
}

/// On-disk shape of [`ClientConfig`]: every duration is seconds as `f64`,
/// the same convention `netrek-server`'s `ServerConfig` uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientConfigFile {
    connection_timeout_secs: f64,
    read_timeout_secs: f64,
    write_timeout_secs: f64,
    ping_interval_secs: f64,
    max_reconnect_attempts: u32,
    reconnect_delay_secs: f64,
    circuit_breaker: CircuitBreakerConfigFile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CircuitBreakerConfigFile {
    max_requests: u32,
    interval_secs: f64,
    timeout_secs: f64,
    max_consecutive_failures: u32,
}

impl From<ClientConfig> for ClientConfigFile {
    fn from(c: ClientConfig) -> Self {
        ClientConfigFile {
            connection_timeout_secs: c.connection_timeout.as_secs_f64(),
            read_timeout_secs: c.read_timeout.as_secs_f64(),
            write_timeout_secs: c.write_timeout.as_secs_f64(),
            ping_interval_secs: c.ping_interval.as_secs_f64(),
            max_reconnect_attempts: c.max_reconnect_attempts,
            reconnect_delay_secs: c.reconnect_delay.as_secs_f64(),
            circuit_breaker: CircuitBreakerConfigFile {
                max_requests: c.circuit_breaker.max_requests,
                interval_secs: c.circuit_breaker.interval.as_secs_f64(),
                timeout_secs: c.circuit_breaker.timeout.as_secs_f64(),
                max_consecutive_failures: c.circuit_breaker.max_consecutive_failures,
            },
        }
    }
}

impl From<ClientConfigFile> for ClientConfig {
    fn from(f: ClientConfigFile) -> Self {
        ClientConfig {
            connection_timeout: Duration::from_secs_f64(f.connection_timeout_secs),
            read_timeout: Duration::from_secs_f64(f.read_timeout_secs),
            write_timeout: Duration::from_secs_f64(f.write_timeout_secs),
            ping_interval: Duration::from_secs_f64(f.ping_interval_secs),
            max_reconnect_attempts: f.max_reconnect_attempts,
            reconnect_delay: Duration::from_secs_f64(f.reconnect_delay_secs),
            circuit_breaker: CircuitBreakerConfig {
                max_requests: f.circuit_breaker.max_requests,
                interval: Duration::from_secs_f64(f.circuit_breaker.interval_secs),
                timeout: Duration::from_secs_f64(f.circuit_breaker.timeout_secs),
                max_consecutive_failures: f.circuit_breaker.max_consecutive_failures,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cb_env_overrides_apply_and_validate_bounds() {
        // SAFETY: test-only env mutation; this crate's test binary does not
        // read these vars concurrently from another test.
        unsafe {
            std::env::set_var("NETREK_CB_MAX_REQUESTS", "7");
            std::env::set_var("NETREK_CB_MAX_CONSECUTIVE_FAILS", "200");
        }
        let mut config = ClientConfig::default();
        let err = config.apply_env_overrides().unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
        unsafe {
            std::env::remove_var("NETREK_CB_MAX_CONSECUTIVE_FAILS");
        }
        config.apply_env_overrides().unwrap();
        assert_eq!(config.circuit_breaker.max_requests, 7);
        unsafe {
            std::env::remove_var("NETREK_CB_MAX_REQUESTS");
        }
    }

    #[test]
    fn default_round_trips_through_the_file_representation() {
        let default = ClientConfig::default();
        let file = ClientConfigFile::from(default.clone());
        let text = serde_json::to_string(&file).unwrap();
        let parsed: ClientConfigFile = serde_json::from_str(&text).unwrap();
        let restored: ClientConfig = parsed.into();
        assert_eq!(restored.connection_timeout, default.connection_timeout);
        assert_eq!(restored.max_reconnect_attempts, default.max_reconnect_attempts);
        assert_eq!(restored.circuit_breaker.max_requests, default.circuit_breaker.max_requests);
    }
}
