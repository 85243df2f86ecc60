//! Startup configuration read from the environment.

use std::time::Duration;

use actors::SchedulerConfig;
use db::{DbConfig, DbError};
use storage::{StorageConfig, StorageError};

const DEFAULT_SCAN_INTERVAL_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key}={value}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Whether the backend writes debug artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Containerised deployment; nothing but database rows is written.
    Production,
    #[default]
    Debug,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionMode::Production => "production",
            ExecutionMode::Debug => "debug",
        }
    }
}

/// Everything `forecastd` needs to start.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db: DbConfig,
    pub mode: ExecutionMode,
    /// Artifact storage, present only in debug mode.
    pub storage: Option<StorageConfig>,
    pub scheduler: SchedulerConfig,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from variables resolved through `lookup`.
    ///
    /// - `DOCKER_ACTIVE` (any value) or `FORECAST_MODE=production` selects
    ///   production mode; `FORECAST_MODE=debug` or nothing selects debug
    /// - `SCAN_INTERVAL_SECS` (default: 5, must be positive)
    /// - `STALE_JOB_TIMEOUT_SECS` (optional, must be positive)
    ///
    /// Database and storage variables are documented on [`DbConfig`] and
    /// [`StorageConfig`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mode = if get("DOCKER_ACTIVE").is_some() {
            ExecutionMode::Production
        } else {
            match get("FORECAST_MODE") {
                None => ExecutionMode::Debug,
                Some(raw) if raw.eq_ignore_ascii_case("production") => ExecutionMode::Production,
                Some(raw) if raw.eq_ignore_ascii_case("debug") => ExecutionMode::Debug,
                Some(raw) => {
                    return Err(ConfigError::Invalid {
                        key: "FORECAST_MODE",
                        value: raw,
                        reason: "expected production or debug",
                    });
                }
            }
        };

        let db = DbConfig::from_lookup(&lookup)?;
        let storage = match mode {
            ExecutionMode::Debug => Some(StorageConfig::from_lookup(&lookup)?),
            ExecutionMode::Production => None,
        };

        let interval = match get("SCAN_INTERVAL_SECS") {
            Some(raw) => positive_secs("SCAN_INTERVAL_SECS", raw)?,
            None => Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
        };
        let mut scheduler = SchedulerConfig::default().with_interval(interval);
        if let Some(raw) = get("STALE_JOB_TIMEOUT_SECS") {
            scheduler = scheduler.with_stale_after(positive_secs("STALE_JOB_TIMEOUT_SECS", raw)?);
        }

        Ok(Self {
            db,
            mode,
            storage,
            scheduler,
        })
    }
}

fn positive_secs(key: &'static str, raw: String) -> Result<Duration, ConfigError> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        Ok(_) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be greater than zero",
        }),
        Err(_) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "expected whole seconds",
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use std::collections::HashMap;

    use storage::StorageBackendConfig;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_debug_with_filesystem_artifacts() {
        let config = DaemonConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.mode, ExecutionMode::Debug);
        assert!(matches!(
            config.storage.map(|s| s.backend),
            Some(StorageBackendConfig::Filesystem { .. })
        ));
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.db.endpoint, "ws://localhost:8000");
    }

    #[test]
    fn docker_selects_production() {
        let config = DaemonConfig::from_lookup(lookup(&[
            ("DOCKER_ACTIVE", "1"),
            ("FORECAST_MODE", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.mode, ExecutionMode::Production);
        assert!(config.storage.is_none());
    }

    #[test]
    fn explicit_mode() {
        let production =
            DaemonConfig::from_lookup(lookup(&[("FORECAST_MODE", "Production")])).unwrap();
        assert_eq!(production.mode, ExecutionMode::Production);

        let err = DaemonConfig::from_lookup(lookup(&[("FORECAST_MODE", "staging")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "FORECAST_MODE", .. }));
    }

    #[test]
    fn scan_timing() {
        let config = DaemonConfig::from_lookup(lookup(&[
            ("SCAN_INTERVAL_SECS", "30"),
            ("STALE_JOB_TIMEOUT_SECS", "3600"),
        ]))
        .unwrap();
        assert_eq!(config.scheduler.interval, Duration::from_secs(30));
        assert_eq!(config.scheduler.stale_after, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn invalid_scan_interval() {
        let zero = DaemonConfig::from_lookup(lookup(&[("SCAN_INTERVAL_SECS", "0")])).unwrap_err();
        assert_eq!(
            zero.to_string(),
            "invalid SCAN_INTERVAL_SECS=0: must be greater than zero"
        );

        let junk = DaemonConfig::from_lookup(lookup(&[("STALE_JOB_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(junk, ConfigError::Invalid { key: "STALE_JOB_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn database_and_storage_errors_propagate() {
        let db = DaemonConfig::from_lookup(lookup(&[("DB_PORT", "eighty")])).unwrap_err();
        assert!(matches!(db, ConfigError::Db(DbError::Config(_))));

        let storage = DaemonConfig::from_lookup(lookup(&[("STORAGE_BACKEND", "tape")])).unwrap_err();
        assert!(matches!(storage, ConfigError::Storage(StorageError::InvalidConfig(_))));

        // Storage is not read in production.
        let production = DaemonConfig::from_lookup(lookup(&[
            ("FORECAST_MODE", "production"),
            ("STORAGE_BACKEND", "tape"),
        ]));
        assert!(production.is_ok());
    }
}
