//! Configuration for the order relay.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (RELAY_DB_PATH, RELAY_ENDPOINT)
//! 2. Config file (--config, $RELAY_CONFIG, or ./order-relay.yaml)
//! 3. Defaults (~/.order-relay/orders.db, http://localhost/api/v1/commands)
//!
//! Relative store paths in a config file are resolved against the config
//! file's directory. The resolved configuration is built once at startup and
//! passed down explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::http::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS};
use crate::core::{Backoff, FixedInterval, Pacing};

/// Name of the config file looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "order-relay.yaml";

const ENV_CONFIG: &str = "RELAY_CONFIG";
const ENV_DB_PATH: &str = "RELAY_DB_PATH";
const ENV_ENDPOINT: &str = "RELAY_ENDPOINT";

const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path (relative to the config file)
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryConfig {
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleConfig {
    pub interval_seconds: Option<u64>,
    pub max_batch_size: Option<usize>,
    pub backoff: Option<BackoffConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    pub max_interval_seconds: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_multiplier() -> f64 {
    2.0
}

/// Resolved configuration with absolute paths and defaults applied
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// SQLite database holding the orders
    pub store_path: PathBuf,
    /// Delivery endpoint URL
    pub endpoint: String,
    /// Per-request delivery timeout
    pub timeout: Duration,
    /// Pause between cycles
    pub interval: Duration,
    /// Cap on orders forwarded per cycle
    pub max_batch_size: Option<usize>,
    /// Failure backoff (fixed interval when absent)
    pub backoff: Option<BackoffSettings>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffSettings {
    pub max_interval: Duration,
    pub multiplier: f64,
}

impl ResolvedConfig {
    /// Build the pacing strategy for the scheduler
    pub fn pacing(&self) -> Box<dyn Pacing> {
        match &self.backoff {
            Some(b) => Box::new(Backoff::new(self.interval, b.max_interval, b.multiplier)),
            None => Box::new(FixedInterval(self.interval)),
        }
    }
}

/// Find the config file: explicit path, then $RELAY_CONFIG, then ./order-relay.yaml
fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG) {
        return Some(PathBuf::from(path));
    }

    let local = std::env::current_dir().ok()?.join(CONFIG_FILE_NAME);
    local.exists().then_some(local)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn default_store_path() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".order-relay")
        .join("orders.db"))
}

/// Apply environment overrides and defaults on top of an optional config file
fn resolve<E>(config: Option<(PathBuf, ConfigFile)>, env: E) -> Result<ResolvedConfig>
where
    E: Fn(&str) -> Option<String>,
{
    let (config_file, file) = match config {
        Some((path, file)) => (Some(path), Some(file)),
        None => (None, None),
    };

    let store_path = if let Some(path) = env(ENV_DB_PATH) {
        PathBuf::from(path)
    } else if let (Some(path), Some(cfg_path)) = (
        file.as_ref().and_then(|f| f.store.path.as_deref()),
        config_file.as_deref(),
    ) {
        let base = cfg_path.parent().unwrap_or(Path::new("."));
        resolve_path(base, path)
    } else {
        default_store_path()?
    };

    let endpoint = env(ENV_ENDPOINT)
        .or_else(|| file.as_ref().and_then(|f| f.delivery.endpoint.clone()))
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

    let timeout_secs = file
        .as_ref()
        .and_then(|f| f.delivery.timeout_seconds)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let schedule = file.map(|f| f.schedule).unwrap_or_default();
    let interval_secs = schedule.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECS);

    if timeout_secs == 0 {
        anyhow::bail!("delivery.timeout_seconds must be greater than zero");
    }
    if interval_secs == 0 {
        anyhow::bail!("schedule.interval_seconds must be greater than zero");
    }

    let backoff = schedule.backoff.map(|b| BackoffSettings {
        max_interval: Duration::from_secs(b.max_interval_seconds),
        multiplier: b.multiplier,
    });

    Ok(ResolvedConfig {
        store_path,
        endpoint,
        timeout: Duration::from_secs(timeout_secs),
        interval: Duration::from_secs(interval_secs),
        max_batch_size: schedule.max_batch_size,
        backoff,
        config_file,
    })
}

/// Load configuration from all sources
pub fn load_config(explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let config = match find_config_file(explicit) {
        Some(path) => {
            let file = load_config_file(&path)?;
            Some((path, file))
        }
        None => None,
    };

    resolve(config, |key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{}", body).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, no_env).unwrap();

        let expected = dirs::home_dir().unwrap().join(".order-relay").join("orders.db");
        assert_eq!(config.store_path, expected);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.interval, Duration::from_secs(10));
        assert!(config.max_batch_size.is_none());
        assert!(config.backoff.is_none());
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
version: "1"
store:
  path: data/orders.db
delivery:
  endpoint: http://127.0.0.1:8080/api/v1/commands
  timeout_seconds: 3
schedule:
  interval_seconds: 5
  max_batch_size: 100
  backoff:
    max_interval_seconds: 60
"#,
        );

        let file = load_config_file(&path).unwrap();
        assert_eq!(file.version, "1");

        let config = resolve(Some((path, file)), no_env).unwrap();
        assert_eq!(config.store_path, temp.path().join("data/orders.db"));
        assert_eq!(config.endpoint, "http://127.0.0.1:8080/api/v1/commands");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.max_batch_size, Some(100));
        assert_eq!(
            config.backoff,
            Some(BackoffSettings {
                max_interval: Duration::from_secs(60),
                multiplier: 2.0,
            })
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
version: "1"
store:
  path: orders.db
delivery:
  endpoint: http://from-file/api
"#,
        );
        let file = load_config_file(&path).unwrap();

        let env: HashMap<&str, &str> = [
            (ENV_DB_PATH, "/var/lib/relay/orders.db"),
            (ENV_ENDPOINT, "http://from-env/api"),
        ]
        .into_iter()
        .collect();

        let config = resolve(Some((path, file)), |key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/var/lib/relay/orders.db"));
        assert_eq!(config.endpoint, "http://from-env/api");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_config(
            &temp,
            r#"
version: "1"
schedule:
  interval_seconds: 0
"#,
        );
        let file = load_config_file(&path).unwrap();

        assert!(resolve(Some((path, file)), no_env).is_err());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.yaml");
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/etc/order-relay");

        assert_eq!(
            resolve_path(&base, "orders.db"),
            PathBuf::from("/etc/order-relay/orders.db")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/orders.db"),
            PathBuf::from("/absolute/orders.db")
        );
    }
}
