//! Server configuration from the environment

use crate::dataset::DatasetMode;
use crate::error::FulfillmentError;
use crate::state::DEFAULT_IDLE_TIMEOUT;
use crate::Result;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub dataset_mode: DatasetMode,
    /// Sessions idle this long are dropped
    pub session_idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            dataset_mode: DatasetMode::Startup,
            session_idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Read `PORT` (or `API_PORT`), `DATA_DIR`, `DATASET_MODE` and `SESSION_IDLE_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT").or_else(|| lookup("API_PORT")) {
            config.port = port.trim().parse().map_err(|_| {
                FulfillmentError::Config(format!("PORT must be a number between 0 and 65535, got '{}'", port))
            })?;
        }

        if let Some(dir) = lookup("DATA_DIR").filter(|d| !d.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(mode) = lookup("DATASET_MODE") {
            config.dataset_mode = mode.parse()?;
        }

        if let Some(secs) = lookup("SESSION_IDLE_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or_else(|| {
                    FulfillmentError::Config(format!(
                        "SESSION_IDLE_SECS must be a positive number of seconds, got '{}'",
                        secs
                    ))
                })?;
            config.session_idle_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(config_from(&[]).unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_port_fallback_and_overrides() {
        let config = config_from(&[
            ("API_PORT", "3000"),
            ("DATA_DIR", "/srv/finance"),
            ("DATASET_MODE", "per-request"),
        ])
        .unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.data_dir, PathBuf::from("/srv/finance"));
        assert_eq!(config.dataset_mode, DatasetMode::PerRequest);

        let config = config_from(&[("PORT", "9000"), ("API_PORT", "3000")]).unwrap();
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_session_idle_timeout() {
        assert_eq!(config_from(&[]).unwrap().session_idle_timeout, Duration::from_secs(1800));

        let config = config_from(&[("SESSION_IDLE_SECS", " 90 ")]).unwrap();
        assert_eq!(config.session_idle_timeout, Duration::from_secs(90));

        for bad in ["0", "-5", "soon"] {
            assert!(matches!(
                config_from(&[("SESSION_IDLE_SECS", bad)]),
                Err(FulfillmentError::Config(_))
            ));
        }
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(config_from(&[("PORT", "eighty")]), Err(FulfillmentError::Config(_))));
        assert!(matches!(config_from(&[("DATASET_MODE", "hourly")]), Err(FulfillmentError::Config(_))));
    }
}
