use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "orange-launcher";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Seconds between liveness checks of a running game.
    pub poll_interval_secs: u64,
    pub legendary_bin: String,
    /// Where legendary keeps `installed.json`. Defaults to `~/.config/legendary`.
    pub legendary_config_dir: Option<PathBuf>,
    /// Runner used for Windows games on a non-Windows host.
    pub compat_runner: String,
    pub library_db: PathBuf,
    /// Install location when a job does not name one.
    pub default_base_path: Option<PathBuf>,
    pub locale: String,
    pub log_filter: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            legendary_bin: "legendary".to_string(),
            legendary_config_dir: None,
            compat_runner: "wine".to_string(),
            library_db: data_dir().join("library.sqlite"),
            default_base_path: None,
            locale: "en".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl LauncherConfig {
    /// Loads `path`, or returns defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Read { path: path.to_path_buf(), source }),
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// `config.toml` in the platform config directory (see [`config_dir`]).
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn legendary_config_dir(&self) -> PathBuf {
        self.legendary_config_dir
            .clone()
            .unwrap_or_else(legendary_default_dir)
    }
}

/// Overridable with `ORANGE_LAUNCHER_CONFIG_DIR`.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("ORANGE_LAUNCHER_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| std::env::temp_dir().join("orange-launcher-config"))
}

/// Overridable with `ORANGE_LAUNCHER_DATA_DIR`.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("ORANGE_LAUNCHER_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| std::env::temp_dir().join("orange-launcher-data"))
}

/// legendary keeps its state under `$XDG_CONFIG_HOME/legendary` or
/// `~/.config/legendary` on every platform, macOS included.
fn legendary_default_dir() -> PathBuf {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("legendary")
}
