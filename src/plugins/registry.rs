use crate::config::LauncherConfig;
use crate::core::model::{GameRecord, JobDescriptor, Platform};
use crate::core::progress::ProgressUpdate;
use anyhow::Context;
use async_trait::async_trait;
use clap::{ArgMatches, Command};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Callback the installer streams progress through.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn Fn(ProgressUpdate) + Send + Sync>,
}

impl ProgressReporter {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        Self { sink: Arc::new(f) }
    }

    pub fn report(&self, update: ProgressUpdate) {
        (self.sink)(update)
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressReporter")
    }
}

/// Performs the actual download/install for remote games.
#[async_trait]
pub trait RemoteInstaller: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs one job to completion. Progress goes through `progress`; the
    /// returned error's description is what the user gets to see.
    async fn run(&self, job: &JobDescriptor, progress: ProgressReporter) -> anyhow::Result<()>;
}

/// Launches games and answers liveness queries.
#[async_trait]
pub trait GameRuntime: Send + Sync {
    fn name(&self) -> &'static str;
    async fn launch(&self, game: &GameRecord) -> anyhow::Result<()>;
    async fn is_alive(&self, game: &GameRecord) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallInfo {
    pub install_path: PathBuf,
    pub platform: Platform,
    pub executable: Option<PathBuf>,
}

/// Looks up where a remote game is installed.
#[async_trait]
pub trait GameLocator: Send + Sync {
    /// `Ok(None)` means "not installed / unknown".
    async fn locate(&self, game: &GameRecord) -> anyhow::Result<Option<InstallInfo>>;
}

/// Best-effort success messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureAlert {
    pub verb: String,
    pub title: String,
    pub description: String,
}

impl fmt::Display for FailureAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error {} {}: {}", self.verb, self.title, self.description)
    }
}

pub trait AlertSink: Send + Sync {
    fn present_failure(&self, alert: FailureAlert);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    Playing { title: String },
    Idle,
}

pub trait PresenceReporter: Send + Sync {
    fn report(&self, presence: Presence);
}

/// Adds backend-specific flags to the install/update/repair subcommands.
pub trait CliPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn augment_job_command(&self, cmd: Command) -> Command;
    fn apply_job_matches(&self, matches: &ArgMatches, job: &mut JobDescriptor) -> anyhow::Result<()>;
}

/// Backend collaborators picked from configuration.
pub struct PluginRegistry {
    pub installer: Arc<dyn RemoteInstaller>,
    pub runtime: Arc<dyn GameRuntime>,
    pub locator: Arc<dyn GameLocator>,
}

impl PluginRegistry {
    pub fn with_defaults(cfg: &LauncherConfig) -> Self {
        let legendary = crate::plugins::legendary::driver::LegendaryDriver::new(
            cfg.legendary_bin.clone(),
            cfg.default_base_path.clone(),
        );
        let locator = crate::plugins::legendary::locator::InstalledJsonLocator::new(cfg.legendary_config_dir());
        let runtime = crate::plugins::process::runtime::CommandRuntime::new(
            cfg.legendary_bin.clone(),
            cfg.compat_runner.clone(),
        );

        Self {
            installer: Arc::new(legendary),
            runtime: Arc::new(runtime),
            locator: Arc::new(locator),
        }
    }
}

/// Command-line extensions; independent of configuration so the CLI can be
/// built before the config file is read.
pub struct CliRegistry {
    cli_plugins: Vec<Box<dyn CliPlugin>>,
}

impl CliRegistry {
    pub fn with_defaults() -> Self {
        Self {
            cli_plugins: vec![Box::new(crate::plugins::legendary::cli::LegendaryCliPlugin::new())],
        }
    }

    pub fn augment_job_command(&self, cmd: Command) -> Command {
        self.cli_plugins
            .iter()
            .fold(cmd, |c, p| p.augment_job_command(c))
    }

    pub fn apply_job_matches(&self, matches: &ArgMatches, job: &mut JobDescriptor) -> anyhow::Result<()> {
        for p in &self.cli_plugins {
            p.apply_job_matches(matches, job)
                .with_context(|| format!("{} options", p.name()))?;
        }
        Ok(())
    }
}
