use crate::core::model::{JobDescriptor, JobKind, Platform};
use crate::plugins::legendary::progress::{error_message, parse_line};
use crate::plugins::registry::{ProgressReporter, RemoteInstaller};
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use url::Url;

/// Installs, updates and repairs storefront games with the `legendary` CLI.
pub struct LegendaryDriver {
    bin: String,
    default_base_path: Option<PathBuf>,
}

impl LegendaryDriver {
    pub fn new(bin: impl Into<String>, default_base_path: Option<PathBuf>) -> Self {
        Self { bin: bin.into(), default_base_path }
    }

    pub fn command_args(&self, job: &JobDescriptor) -> anyhow::Result<Vec<String>> {
        let mut args = vec![job.kind.command().to_string(), job.game.id.clone(), "-y".to_string()];

        args.push("--platform".to_string());
        args.push(platform_name(job.platform).to_string());

        let base_path = match &job.destination_root {
            Some(url) => Some(url_to_path(url)?),
            None if job.kind == JobKind::Install => self.default_base_path.clone(),
            None => None,
        };
        if let Some(p) = base_path {
            args.push("--base-path".to_string());
            args.push(p.to_string_lossy().to_string());
        }

        if let Some(url) = &job.source_root {
            args.push("--game-folder".to_string());
            args.push(url_to_path(url)?.to_string_lossy().to_string());
        }

        if let Some(components) = &job.optional_components {
            for c in components {
                args.push("--install-tag".to_string());
                args.push(c.clone());
            }
        }

        Ok(args)
    }
}

#[async_trait]
impl RemoteInstaller for LegendaryDriver {
    fn name(&self) -> &'static str {
        "legendary"
    }

    async fn run(&self, job: &JobDescriptor, progress: ProgressReporter) -> anyhow::Result<()> {
        let args = self.command_args(job)?;
        tracing::debug!(bin = %self.bin, ?args, "spawning legendary");

        let mut cmd = Command::new(&self.bin);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().with_context(|| format!("spawn {}", self.bin))?;
        let stderr = child.stderr.take().context("legendary stderr not captured")?;

        let mut lines = BufReader::new(stderr).lines();
        let mut last_error: Option<String> = None;
        let mut last_line: Option<String> = None;
        while let Some(line) = lines.next_line().await.context("read legendary output")? {
            if let Some(update) = parse_line(&line) {
                progress.report(update);
                continue;
            }
            if let Some(msg) = error_message(&line) {
                tracing::warn!(game = %job.game.title, "{}", msg);
                last_error = Some(msg.to_string());
            } else if !line.trim().is_empty() {
                tracing::trace!(game = %job.game.title, "{}", line);
                last_line = Some(line.trim().to_string());
            }
        }

        let status = child.wait().await.context("wait for legendary")?;
        if !status.success() {
            let reason = last_error
                .or(last_line)
                .unwrap_or_else(|| format!("legendary exited with {}", status));
            anyhow::bail!(reason);
        }
        Ok(())
    }
}

fn platform_name(p: Platform) -> &'static str {
    match p {
        Platform::Native => "Mac",
        Platform::Windows => "Windows",
    }
}

fn url_to_path(url: &Url) -> anyhow::Result<PathBuf> {
    url.to_file_path()
        .map_err(|_| anyhow::anyhow!("not a local path: {}", url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::GameRecord;

    #[test]
    fn install_args_include_all_options() {
        let driver = LegendaryDriver::new("legendary", None);
        let job = JobDescriptor::new(GameRecord::remote("Sugar", "Sugar"), JobKind::Install)
            .with_platform(Platform::Windows)
            .with_components(["voice_en", "hd_textures"])
            .with_destination_root(Url::parse("file:///games").unwrap())
            .with_source_root(Url::parse("file:///mnt/backup/Sugar").unwrap());

        let args = driver.command_args(&job).unwrap();
        assert_eq!(
            args,
            vec![
                "install", "Sugar", "-y",
                "--platform", "Windows",
                "--base-path", "/games",
                "--game-folder", "/mnt/backup/Sugar",
                "--install-tag", "hd_textures",
                "--install-tag", "voice_en",
            ]
        );
    }

    #[test]
    fn default_base_path_only_applies_to_installs() {
        let driver = LegendaryDriver::new("legendary", Some(PathBuf::from("/library")));
        let game = GameRecord::remote("Sugar", "Sugar");

        let install = driver.command_args(&JobDescriptor::new(game.clone(), JobKind::Install)).unwrap();
        assert!(install.windows(2).any(|w| w == ["--base-path", "/library"]));

        let repair = driver.command_args(&JobDescriptor::new(game, JobKind::Repair)).unwrap();
        assert_eq!(repair[0], "repair");
        assert!(!repair.iter().any(|a| a == "--base-path"));
    }

    #[test]
    fn rejects_non_file_urls() {
        let driver = LegendaryDriver::new("legendary", None);
        let job = JobDescriptor::new(GameRecord::remote("Sugar", "Sugar"), JobKind::Install)
            .with_destination_root(Url::parse("https://example.com/games").unwrap());
        assert!(driver.command_args(&job).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_binary_reports_last_error_line() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-legendary");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             echo '[DLManager] INFO:  - Downloaded: 1.00 MiB, Written: 1.00 MiB' >&2\n\
             echo '[cli] ERROR: disk full' >&2\n\
             exit 1\n",
        )
        .unwrap();
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let reported = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = reported.clone();
        let progress = ProgressReporter::from_fn(move |u| sink.lock().unwrap().push(u));

        let driver = LegendaryDriver::new(script.to_string_lossy(), None);
        let job = JobDescriptor::new(GameRecord::remote("Sugar", "Sugar"), JobKind::Install);
        let err = driver.run(&job, progress).await.unwrap_err();

        assert_eq!(err.to_string(), "disk full");
        assert_eq!(reported.lock().unwrap().len(), 1);
    }
}
