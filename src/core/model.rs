use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;
use uuid::Uuid;

pub type JobId = Uuid;
pub type GameId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameSource {
    /// Managed by the storefront package manager.
    Remote,
    /// Imported from disk; always considered installed.
    Local,
}

impl GameSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameSource::Remote => "remote",
            GameSource::Local => "local",
        }
    }
}

impl FromStr for GameSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(GameSource::Remote),
            "local" => Ok(GameSource::Local),
            other => anyhow::bail!("unknown game source: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Runs directly on the host OS.
    Native,
    /// Needs the compatibility runner.
    Windows,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Native => "native",
            Platform::Windows => "windows",
        }
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" | "mac" | "macos" | "linux" => Ok(Platform::Native),
            "windows" | "win" | "win32" => Ok(Platform::Windows),
            other => anyhow::bail!("unknown platform: {}", other),
        }
    }
}

/// One game known to the launcher.
///
/// Identity is the `id` alone: two records with the same id compare equal even
/// if one of them has a resolved install path and the other does not.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub id: GameId,
    pub title: String,
    pub source: GameSource,
    pub platform: Option<Platform>,
    pub install_path: Option<PathBuf>,
    pub executable: Option<PathBuf>,
}

impl GameRecord {
    pub fn remote(app_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: app_name.into(),
            title: title.into(),
            source: GameSource::Remote,
            platform: None,
            install_path: None,
            executable: None,
        }
    }

    pub fn local(title: impl Into<String>, install_path: PathBuf, executable: PathBuf, platform: Platform) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            source: GameSource::Local,
            platform: Some(platform),
            install_path: Some(install_path),
            executable: Some(executable),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.source == GameSource::Remote
    }

    /// Absolute path of the launch target, if both pieces are known.
    pub fn executable_path(&self) -> Option<PathBuf> {
        let exe = self.executable.as_ref()?;
        if exe.is_absolute() {
            return Some(exe.clone());
        }
        self.install_path.as_ref().map(|p| p.join(exe))
    }
}

impl PartialEq for GameRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GameRecord {}

impl Hash for GameRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Install,
    Update,
    Repair,
}

impl JobKind {
    /// Verb used in notifications and alerts.
    pub fn verb(&self) -> &'static str {
        match self {
            JobKind::Install => "installing",
            JobKind::Update => "updating",
            JobKind::Repair => "repairing",
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            JobKind::Install => "install",
            JobKind::Update => "update",
            JobKind::Repair => "repair",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// A requested install/update/repair. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobDescriptor {
    pub game: GameRecord,
    pub platform: Platform,
    pub kind: JobKind,
    pub optional_components: Option<BTreeSet<String>>,
    pub source_root: Option<Url>,
    pub destination_root: Option<Url>,
}

impl JobDescriptor {
    pub fn new(game: GameRecord, kind: JobKind) -> Self {
        let platform = game.platform.unwrap_or(Platform::Native);
        Self {
            game,
            platform,
            kind,
            optional_components: None,
            source_root: None,
            destination_root: None,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.optional_components = Some(components.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_source_root(mut self, url: Url) -> Self {
        self.source_root = Some(url);
        self
    }

    pub fn with_destination_root(mut self, url: Url) -> Self {
        self.destination_root = Some(url);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
    /// Nothing to do for this source (local games are already installed).
    Skipped,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded | JobOutcome::Skipped)
    }
}
