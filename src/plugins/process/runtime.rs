use crate::core::model::{GameId, GameRecord, GameSource, Platform};
use crate::plugins::registry::GameRuntime;
use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// Launches games as child processes.
///
/// Storefront games go through `legendary launch`, native local games are
/// executed directly and Windows local games through the compatibility
/// runner. Liveness first checks the child we spawned; Windows games are also
/// looked up in the process table by executable name, since the runner tends
/// to hand the game off to a detached process.
pub struct CommandRuntime {
    legendary_bin: String,
    compat_runner: String,
    children: Mutex<HashMap<GameId, Child>>,
}

impl CommandRuntime {
    pub fn new(legendary_bin: impl Into<String>, compat_runner: impl Into<String>) -> Self {
        Self {
            legendary_bin: legendary_bin.into(),
            compat_runner: compat_runner.into(),
            children: Mutex::new(HashMap::new()),
        }
    }

    fn command_for(&self, game: &GameRecord) -> anyhow::Result<Command> {
        if game.source == GameSource::Remote {
            let mut cmd = Command::new(&self.legendary_bin);
            cmd.arg("launch").arg(&game.id);
            return Ok(cmd);
        }

        let exe = game
            .executable_path()
            .with_context(|| format!("{} has no executable on record", game.title))?;
        let mut cmd = match game.platform {
            Some(Platform::Windows) => {
                let mut c = Command::new(&self.compat_runner);
                c.arg(&exe);
                c
            }
            Some(Platform::Native) | None => Command::new(&exe),
        };
        if let Some(dir) = &game.install_path {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }

    async fn child_alive(&self, game: &GameRecord) -> bool {
        let mut children = self.children.lock().await;
        let Some(child) = children.get_mut(&game.id) else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::debug!(game = %game.title, %status, "game process exited");
                children.remove(&game.id);
                false
            }
            Err(e) => {
                tracing::warn!(game = %game.title, error = %e, "failed to query game process");
                children.remove(&game.id);
                false
            }
        }
    }
}

#[async_trait]
impl GameRuntime for CommandRuntime {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn launch(&self, game: &GameRecord) -> anyhow::Result<()> {
        let mut cmd = self.command_for(game)?;
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

        let child = cmd.spawn().with_context(|| format!("spawn {}", game.title))?;
        tracing::info!(game = %game.title, pid = ?child.id(), "game process spawned");
        self.children.lock().await.insert(game.id.clone(), child);
        Ok(())
    }

    async fn is_alive(&self, game: &GameRecord) -> bool {
        if self.child_alive(game).await {
            return true;
        }
        let exe_name = game
            .executable
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().to_string());
        match (game.platform, exe_name) {
            (Some(Platform::Windows), Some(name)) => process_table_contains(&name).await,
            _ => false,
        }
    }
}

/// True when some process's command line names `exe_name`, compared by file
/// name and ignoring case. The scan is blocking, so it runs off the reactor.
async fn process_table_contains(exe_name: &str) -> bool {
    let exe_name = exe_name.to_string();
    match tokio::task::spawn_blocking(move || scan_process_table(&exe_name)).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!(error = %e, "process table scan aborted");
            false
        }
    }
}

#[cfg(target_os = "linux")]
fn scan_process_table(exe_name: &str) -> bool {
    let procs = match procfs::process::all_processes() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read process table");
            return false;
        }
    };
    procs
        .filter_map(Result::ok)
        .filter_map(|proc| proc.cmdline().ok())
        .any(|cmdline| cmdline_mentions(&cmdline, exe_name))
}

#[cfg(not(target_os = "linux"))]
fn scan_process_table(exe_name: &str) -> bool {
    tracing::debug!(exe = exe_name, "no process table on this platform");
    false
}

fn cmdline_mentions(cmdline: &[String], exe_name: &str) -> bool {
    cmdline.iter().any(|arg| {
        let last = arg.rsplit(['/', '\\']).next().unwrap_or(arg.as_str());
        last.eq_ignore_ascii_case(exe_name)
    })
}
