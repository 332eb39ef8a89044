use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

pub const DEFAULT_ACTION_KEYWORD: &str = "hk";
pub const DEFAULT_MAX_RESULTS: usize = 50;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 100;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_LOAD_CONCURRENCY: usize = 8;
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_NOTIFY_CAPACITY: usize = 16;

const ENV_PREFIX: &str = "HOTKEYS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeysConfig {
    /// Root of the `*.json` shortcut tree.
    pub shortcuts_dir: PathBuf,
    /// Launcher keyword prepended to "change query" actions.
    pub action_keyword: String,
    pub query_timeout_ms: u64,
    /// Buffer size of the change-notification channel.
    pub notify_capacity: usize,
    pub search: SearchConfig,
    pub cache: CacheConfig,
    pub watcher: WatcherConfig,
    pub loader: LoaderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub enabled: bool,
    pub debounce_ms: u64,
    /// Collapse bursts of events into a single pending reload.
    pub coalesce: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Number of files read in parallel.
    pub concurrency: usize,
}

impl Default for HotkeysConfig {
    fn default() -> Self {
        Self {
            shortcuts_dir: default_shortcuts_dir(),
            action_keyword: DEFAULT_ACTION_KEYWORD.to_string(),
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            notify_capacity: DEFAULT_NOTIFY_CAPACITY,
            search: SearchConfig::default(),
            cache: CacheConfig::default(),
            watcher: WatcherConfig::default(),
            loader: LoaderConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            coalesce: false,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_LOAD_CONCURRENCY,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl HotkeysConfig {
    /// Load configuration with priority: environment > config file > defaults.
    ///
    /// An explicitly passed file must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = default_config_path() {
                    debug!(path = %default_path.display(), "Looking for config file");
                    builder = builder.add_source(File::from(default_path).required(false));
                }
            }
        }

        let config: HotkeysConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn with_shortcuts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.shortcuts_dir = dir.into();
        self
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search.max_results == 0 {
            return Err(ConfigError::Message("search.max_results must be at least 1".to_string()).into());
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Message("cache.max_entries must be at least 1".to_string()).into());
        }
        if self.loader.concurrency == 0 {
            return Err(ConfigError::Message("loader.concurrency must be at least 1".to_string()).into());
        }
        if self.notify_capacity == 0 {
            return Err(ConfigError::Message("notify_capacity must be at least 1".to_string()).into());
        }
        Ok(())
    }
}

/// `config.toml` in the platform config directory, if one can be resolved.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "hotkeys").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// `Shortcuts/` next to the executable, like a launcher plugin directory.
pub fn default_shortcuts_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("Shortcuts")))
        .unwrap_or_else(|| PathBuf::from("Shortcuts"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HotkeysConfig::default();
        assert_eq!(config.action_keyword, "hk");
        assert_eq!(config.search.max_results, 50);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.watcher.debounce(), Duration::from_millis(500));
        assert!(config.watcher.enabled);
        assert!(!config.watcher.coalesce);
        assert!(config.shortcuts_dir.ends_with("Shortcuts"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
shortcuts_dir = "/opt/hotkeys/Shortcuts"

[cache]
ttl_secs = 60

[watcher]
coalesce = true
"#
        )
        .unwrap();

        let config = HotkeysConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.shortcuts_dir, PathBuf::from("/opt/hotkeys/Shortcuts"));
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.max_entries, DEFAULT_CACHE_MAX_ENTRIES);
        assert!(config.watcher.coalesce);
        assert_eq!(config.watcher.debounce_ms, DEFAULT_DEBOUNCE_MS);
        assert_eq!(config.search.max_results, DEFAULT_MAX_RESULTS);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let result = HotkeysConfig::load(Some(Path::new("/definitely/not/here/hotkeys.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = HotkeysConfig::default();
        config.search.max_results = 0;
        assert!(config.validate().is_err());

        let mut config = HotkeysConfig::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());
    }

    // Environment overrides are not tested here: tests run in parallel and
    // mutating process-wide env vars races with the other config tests.
}
