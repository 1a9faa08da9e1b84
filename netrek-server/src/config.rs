//! Server configuration (§6): loaded from JSON, then overridden
//! field-by-field from the environment. Out-of-range or malformed values
//! are a field-qualified [`ConfigError`], which the CLI turns into exit
//! code 1 before binding anything.

use std::path::Path;

use serde::{Deserialize, Serialize};

use netrek_sim::SimulationConfig;

use crate::error::ConfigError;

/// Fixed per spec.md's AOI filter description; not configurable.
pub const VIEW_RADIUS: f64 = 3000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub addr: String,
    pub read_timeout_secs: f64,
    pub write_timeout_secs: f64,
    pub connection_timeout_secs: f64,
    pub update_rate_hz: f64,
    pub ticks_per_state: u32,
    pub use_partial_state: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            addr: "127.0.0.1:4566".to_string(),
            read_timeout_secs: 30.0,
            write_timeout_secs: 30.0,
            connection_timeout_secs: 30.0,
            update_rate_hz: 20.0,
            ticks_per_state: 3,
            use_partial_state: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernorConfig {
    pub max_memory_mb: u64,
    pub max_tasks: usize,
    pub shutdown_timeout_secs: f64,
    pub resource_check_interval_secs: f64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        GovernorConfig {
            max_memory_mb: 500,
            max_tasks: 1000,
            shutdown_timeout_secs: 30.0,
            resource_check_interval_secs: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub max_players: usize,
    pub network: NetworkConfig,
    pub simulation: SimulationConfig,
    pub governor: GovernorConfig,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            max_players: 100,
            network: NetworkConfig::default(),
            simulation: SimulationConfig::default(),
            governor: GovernorConfig::default(),
            log_level: "INFO".to_string(),
        }
    }
}

fn check_range_f64(field: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field: field.to_string(),
            reason: format!("{value} not in [{min}, {max}]"),
        });
    }
    Ok(())
}

fn check_range_u64(field: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field: field.to_string(),
            reason: format!("{value} not in [{min}, {max}]"),
        });
    }
    Ok(())
}

impl ServerConfig {
    /// Loads from `path`, then applies every `NETREK_*` override named in
    /// §6, validating each one's documented bounds.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: ServerConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        use std::env::var;

        if let Ok(addr) = var("NETREK_SERVER_ADDR") {
            self.network.addr = addr;
        }
        if let Ok(port) = var("NETREK_SERVER_PORT") {
            let port: u16 = port.parse().map_err(|_| ConfigError::OutOfRange {
                field: "NETREK_SERVER_PORT".to_string(),
                reason: format!("'{port}' is not a valid port"),
            })?;
            check_range_u64("NETREK_SERVER_PORT", port as u64, 1024, 65535)?;
            let host = self.network.addr.rsplit_once(':').map(|(h, _)| h.to_string()).unwrap_or_else(|| "127.0.0.1".to_string());
            self.network.addr = format!("{host}:{port}");
        }
        if let Ok(v) = var("NETREK_MAX_CLIENTS") {
            let v: usize = parse_env("NETREK_MAX_CLIENTS", &v)?;
            check_range_u64("NETREK_MAX_CLIENTS", v as u64, 1, 1000)?;
            self.max_players = v;
        }
        if let Ok(v) = var("NETREK_READ_TIMEOUT") {
            let v: f64 = parse_env("NETREK_READ_TIMEOUT", &v)?;
            check_range_f64("NETREK_READ_TIMEOUT", v, 1.0, 60.0)?;
            self.network.read_timeout_secs = v;
        }
        if let Ok(v) = var("NETREK_WRITE_TIMEOUT") {
            let v: f64 = parse_env("NETREK_WRITE_TIMEOUT", &v)?;
            check_range_f64("NETREK_WRITE_TIMEOUT", v, 1.0, 60.0)?;
            self.network.write_timeout_secs = v;
        }
        if let Ok(v) = var("NETREK_UPDATE_RATE") {
            let v: f64 = parse_env("NETREK_UPDATE_RATE", &v)?;
            check_range_f64("NETREK_UPDATE_RATE", v, 1.0, 100.0)?;
            self.network.update_rate_hz = v;
        }
        if let Ok(v) = var("NETREK_TICKS_PER_STATE") {
            let v: u32 = parse_env("NETREK_TICKS_PER_STATE", &v)?;
            check_range_u64("NETREK_TICKS_PER_STATE", v as u64, 1, 10)?;
            self.network.ticks_per_state = v;
        }
        if let Ok(v) = var("NETREK_USE_PARTIAL_STATE") {
            let v: bool = parse_env("NETREK_USE_PARTIAL_STATE", &v)?;
            self.network.use_partial_state = v;
        }
        if let Ok(v) = var("NETREK_WORLD_SIZE") {
            let v: f64 = parse_env("NETREK_WORLD_SIZE", &v)?;
            check_range_f64("NETREK_WORLD_SIZE", v, 1000.0, 100000.0)?;
            self.simulation.world_size = v;
        }
        if let Ok(v) = var("NETREK_MAX_MEMORY_MB") {
            let v: u64 = parse_env("NETREK_MAX_MEMORY_MB", &v)?;
            check_range_u64("NETREK_MAX_MEMORY_MB", v, 128, 8192)?;
            self.governor.max_memory_mb = v;
        }
        if let Ok(v) = var("NETREK_MAX_GOROUTINES") {
            let v: usize = parse_env("NETREK_MAX_GOROUTINES", &v)?;
            check_range_u64("NETREK_MAX_GOROUTINES", v as u64, 10, 1000)?;
            self.governor.max_tasks = v;
        }
        if let Ok(v) = var("NETREK_SHUTDOWN_TIMEOUT") {
            let v: f64 = parse_env("NETREK_SHUTDOWN_TIMEOUT", &v)?;
            check_range_f64("NETREK_SHUTDOWN_TIMEOUT", v, 1.0, 60.0)?;
            self.governor.shutdown_timeout_secs = v;
        }
        if let Ok(v) = var("NETREK_RESOURCE_CHECK_INTERVAL") {
            let v: f64 = parse_env("NETREK_RESOURCE_CHECK_INTERVAL", &v)?;
            check_range_f64("NETREK_RESOURCE_CHECK_INTERVAL", v, 1.0, 60.0)?;
            self.governor.resource_check_interval_secs = v;
        }
        if let Ok(v) = var("NETREK_LOG_LEVEL") {
            if !["DEBUG", "INFO", "WARN", "ERROR"].contains(&v.as_str()) {
                return Err(ConfigError::OutOfRange {
                    field: "NETREK_LOG_LEVEL".to_string(),
                    reason: format!("'{v}' is not one of DEBUG, INFO, WARN, ERROR"),
                });
            }
            self.log_level = v;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_range_f64("worldSize", self.simulation.world_size, 1000.0, 100000.0)?;
        check_range_f64("network.readTimeoutSecs", self.network.read_timeout_secs, 1.0, 60.0)?;
        check_range_f64("network.writeTimeoutSecs", self.network.write_timeout_secs, 1.0, 60.0)?;
        check_range_f64("network.updateRateHz", self.network.update_rate_hz, 1.0, 100.0)?;
        check_range_u64("network.ticksPerState", self.network.ticks_per_state as u64, 1, 10)?;
        Ok(())
    }

    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let config = ServerConfig::default();
        let text = serde_json::to_string_pretty(&config).expect("default config always serializes");
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::OutOfRange {
        field: name.to_string(),
        reason: format!("'{value}' is not a valid value"),
    })
}
