use crate::core::model::{GameRecord, Platform};
use crate::plugins::registry::{GameLocator, InstallInfo};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct InstalledEntry {
    install_path: PathBuf,
    platform: String,
    #[serde(default)]
    executable: Option<String>,
}

/// Reads legendary's `installed.json`.
pub struct InstalledJsonLocator {
    config_dir: PathBuf,
}

impl InstalledJsonLocator {
    pub fn new(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    fn installed_json(&self) -> PathBuf {
        self.config_dir.join("installed.json")
    }
}

#[async_trait]
impl GameLocator for InstalledJsonLocator {
    async fn locate(&self, game: &GameRecord) -> anyhow::Result<Option<InstallInfo>> {
        let path = self.installed_json();
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };

        let mut entries: HashMap<String, InstalledEntry> =
            serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;

        let Some(entry) = entries.remove(&game.id) else {
            return Ok(None);
        };
        let platform = match entry.platform.parse::<Platform>() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(game = %game.title, error = %e, "unrecognised platform in installed.json");
                return Ok(None);
            }
        };

        Ok(Some(InstallInfo {
            install_path: entry.install_path,
            platform,
            executable: entry.executable.filter(|e| !e.is_empty()).map(PathBuf::from),
        }))
    }
}
