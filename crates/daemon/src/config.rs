// Daemon configuration from environment variables

use optical_core::error::{AppError, Result};
use optical_core::port::MaintenanceConfig;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "~/.optical-shop/data/optical_shop.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: PathBuf,
    /// None means the sibling `backups/` directory
    pub backup_dir: Option<PathBuf>,
    pub maintenance: MaintenanceConfig,
    pub case_insensitive_search: bool,
    pub log_format: LogFormat,
    pub log_dir: Option<PathBuf>,
}

impl DaemonConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (environment in production, a map in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = expand(
            &lookup("OPTICAL_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
        );
        let backup_dir = lookup("OPTICAL_BACKUP_DIR").map(|dir| expand(&dir));

        let defaults = MaintenanceConfig::default();
        let interval = match lookup("OPTICAL_MAINTENANCE_INTERVAL_SECS") {
            Some(raw) => Duration::from_secs(parse_number(&raw, "OPTICAL_MAINTENANCE_INTERVAL_SECS")?),
            None => defaults.interval,
        };
        let backup_retention = match lookup("OPTICAL_BACKUP_RETENTION") {
            Some(raw) => parse_number(&raw, "OPTICAL_BACKUP_RETENTION")? as usize,
            None => defaults.backup_retention,
        };
        let maintenance = MaintenanceConfig {
            interval,
            backup_retention,
        };
        maintenance.validate()?;

        let case_insensitive_search = match lookup("OPTICAL_SEARCH_CASE_INSENSITIVE") {
            Some(raw) => parse_flag(&raw, "OPTICAL_SEARCH_CASE_INSENSITIVE")?,
            None => false,
        };

        let log_format = match lookup("OPTICAL_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let log_dir = lookup("OPTICAL_LOG_DIR").map(|dir| expand(&dir));

        Ok(Self {
            db_path,
            backup_dir,
            maintenance,
            case_insensitive_search,
            log_format,
            log_dir,
        })
    }
}

fn expand(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn parse_number(raw: &str, key: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{} must be a non-negative integer, got {:?}", key, raw)))
}

fn parse_flag(raw: &str, key: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(AppError::Config(format!("{} must be a boolean, got {:?}", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<DaemonConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert!(config.db_path.ends_with(".optical-shop/data/optical_shop.db"));
        assert!(config.backup_dir.is_none());
        assert_eq!(config.maintenance.interval, Duration::from_secs(7200));
        assert_eq!(config.maintenance.backup_retention, 10);
        assert!(!config.case_insensitive_search);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("OPTICAL_DB_PATH", "/srv/shop.db"),
            ("OPTICAL_BACKUP_DIR", "/mnt/backups"),
            ("OPTICAL_MAINTENANCE_INTERVAL_SECS", "600"),
            ("OPTICAL_BACKUP_RETENTION", "3"),
            ("OPTICAL_SEARCH_CASE_INSENSITIVE", "true"),
            ("OPTICAL_LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/srv/shop.db"));
        assert_eq!(config.backup_dir, Some(PathBuf::from("/mnt/backups")));
        assert_eq!(config.maintenance.interval, Duration::from_secs(600));
        assert_eq!(config.maintenance.backup_retention, 3);
        assert!(config.case_insensitive_search);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        for pairs in [
            [("OPTICAL_MAINTENANCE_INTERVAL_SECS", "soon")],
            [("OPTICAL_MAINTENANCE_INTERVAL_SECS", "0")],
            [("OPTICAL_BACKUP_RETENTION", "-1")],
            [("OPTICAL_SEARCH_CASE_INSENSITIVE", "maybe")],
        ] {
            let err = config_from(&pairs).unwrap_err();
            assert!(matches!(err, AppError::Config(_)), "{:?}", pairs);
        }
    }
}
