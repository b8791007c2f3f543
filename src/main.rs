use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use orange_launcher::config::LauncherConfig;
use orange_launcher::core::events::SchedulerEvent;
use orange_launcher::core::library::GameLibrary;
use orange_launcher::core::model::{GameRecord, JobDescriptor, JobId, JobKind, JobOutcome, Platform};
use orange_launcher::core::progress::ProgressSnapshot;
use orange_launcher::core::scheduler::Scheduler;
use orange_launcher::core::store::LibraryStore;
use orange_launcher::core::supervisor::ProcessSupervisor;
use orange_launcher::i18n::{get_messages, Locale, Messages};
use orange_launcher::plugins::console::sink::{LogPresence, UiChannel, UiMessage};
use orange_launcher::plugins::registry::{CliRegistry, PluginRegistry};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

fn job_command(name: &'static str, about: &'static str, cli: &CliRegistry) -> Command {
    let cmd = Command::new(name)
        .about(about)
        .arg(
            Arg::new("apps")
                .help("Storefront app names")
                .action(ArgAction::Append)
                .num_args(1..)
                .required(true),
        )
        .arg(
            Arg::new("title")
                .long("title")
                .help("Display title (single app only)")
                .num_args(1),
        );

    cli.augment_job_command(cmd)
}

fn build_cli(cli: &CliRegistry) -> Command {
    Command::new("orange-launcher")
        .about("Game library manager - queued installs and launch supervision")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .help("Config file")
                .global(true)
                .num_args(1),
        )
        .arg(
            Arg::new("locale")
                .long("locale")
                .help("UI language (en|zh)")
                .global(true)
                .num_args(1),
        )
        .subcommand(job_command("install", "Install one or more games, one at a time", cli))
        .subcommand(job_command("update", "Update installed games", cli))
        .subcommand(job_command("repair", "Verify and repair installed games", cli))
        .subcommand(
            Command::new("launch")
                .about("Launch a game and wait for it to exit")
                .arg(Arg::new("game").help("Game id").required(true)),
        )
        .subcommand(
            Command::new("import")
                .about("Add a game from local disk")
                .arg(Arg::new("path").help("Game folder").required(true))
                .arg(Arg::new("title").long("title").required(true).num_args(1))
                .arg(
                    Arg::new("exe")
                        .long("exe")
                        .help("Executable, relative to the game folder")
                        .required(true)
                        .num_args(1),
                )
                .arg(
                    Arg::new("platform")
                        .long("platform")
                        .help("native|windows")
                        .default_value("native")
                        .num_args(1),
                ),
        )
        .subcommand(
            Command::new("move")
                .about("Move a local game to another directory")
                .arg(Arg::new("game").help("Game id").required(true))
                .arg(Arg::new("dest").help("Destination directory").required(true)),
        )
        .subcommand(
            Command::new("remove")
                .about("Forget a game (files on disk are left alone)")
                .arg(Arg::new("game").help("Game id").required(true)),
        )
        .subcommand(Command::new("list").about("List known games"))
        .subcommand(
            Command::new("init")
                .about("Write the current settings to the config file")
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("Overwrite an existing config file")
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn global_arg<'a>(top: &'a ArgMatches, id: &str) -> Option<&'a String> {
    top.get_one::<String>(id)
        .or_else(|| top.subcommand().and_then(|(_, m)| m.get_one::<String>(id)))
}

fn init_tracing(default_filter: &str) {
    // Progress bars own stdout.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliRegistry::with_defaults();
    let matches = build_cli(&cli).get_matches();

    let config_path = global_arg(&matches, "config")
        .map(PathBuf::from)
        .unwrap_or_else(LauncherConfig::default_path);
    let cfg = LauncherConfig::load(&config_path)?;
    init_tracing(&cfg.log_filter);

    if let Some(("init", m)) = matches.subcommand() {
        if config_path.exists() && !m.get_flag("force") {
            anyhow::bail!("{} already exists (use --force to overwrite)", config_path.display());
        }
        cfg.save(&config_path)?;
        println!("{}", config_path.display());
        return Ok(());
    }

    let locale = Locale::from_str(global_arg(&matches, "locale").unwrap_or(&cfg.locale));
    let msgs = get_messages(locale);

    let registry = PluginRegistry::with_defaults(&cfg);
    let store = LibraryStore::open(&cfg.library_db)
        .await
        .with_context(|| format!("open library {}", cfg.library_db.display()))?;
    let library = GameLibrary::new(store);

    match matches.subcommand() {
        Some((name @ ("install" | "update" | "repair"), m)) => {
            let kind = match name {
                "install" => JobKind::Install,
                "update" => JobKind::Update,
                _ => JobKind::Repair,
            };
            run_jobs(kind, m, &cli, &registry, &library, msgs).await?;
        }
        Some(("launch", m)) => {
            let id = m.get_one::<String>("game").context("missing game")?;
            launch_game(id, &registry, &library, &cfg, msgs).await?;
        }
        Some(("import", m)) => {
            let path = PathBuf::from(m.get_one::<String>("path").context("missing path")?);
            let path = tokio::fs::canonicalize(&path)
                .await
                .with_context(|| format!("game folder {}", path.display()))?;
            let title = m.get_one::<String>("title").context("missing title")?;
            let exe = PathBuf::from(m.get_one::<String>("exe").context("missing exe")?);
            let platform: Platform = m.get_one::<String>("platform").context("missing platform")?.parse()?;

            let game = library.add_local(title, path, exe, platform).await?;
            println!("{}\t{}", game.id, game.title);
        }
        Some(("move", m)) => {
            let id = m.get_one::<String>("game").context("missing game")?;
            let dest = PathBuf::from(m.get_one::<String>("dest").context("missing dest")?);
            let game = library.move_local(id, &dest).await?;
            if let Some(p) = &game.install_path {
                println!("{} -> {}", game.title, p.display());
            }
        }
        Some(("remove", m)) => {
            let id = m.get_one::<String>("game").context("missing game")?;
            if !library.remove(id).await? {
                anyhow::bail!("game not found: {}", id);
            }
        }
        Some(("list", _)) => {
            let games = library.list().await?;
            if games.is_empty() {
                println!("{}", msgs.empty_library);
            }
            for g in games {
                println!(
                    "{:<38} {:<7} {:<8} {}  {}",
                    g.id,
                    g.source.as_str(),
                    g.platform.map(|p| p.as_str()).unwrap_or("?"),
                    g.title,
                    g.install_path.map(|p| p.display().to_string()).unwrap_or_else(|| "-".to_string()),
                );
            }
        }
        _ => {}
    }

    Ok(())
}

async fn run_jobs(
    kind: JobKind,
    m: &ArgMatches,
    cli: &CliRegistry,
    registry: &PluginRegistry,
    library: &GameLibrary,
    msgs: &'static Messages,
) -> anyhow::Result<()> {
    let apps: Vec<String> = m
        .get_many::<String>("apps")
        .into_iter()
        .flatten()
        .cloned()
        .collect();
    let title = m.get_one::<String>("title");
    if title.is_some() && apps.len() > 1 {
        anyhow::bail!("--title only applies to a single app");
    }

    let (ui, ui_rx) = UiChannel::new();
    let ui = Arc::new(ui);
    let scheduler = Scheduler::new(registry.installer.clone(), ui.clone(), ui.clone());
    let view = tokio::spawn(render_jobs(scheduler.subscribe(), ui_rx, msgs));

    let mut submitted = Vec::new();
    for app in apps {
        let mut game = match library.get(&app).await? {
            Some(g) => g,
            None => GameRecord::remote(app.clone(), app.clone()),
        };
        if let Some(t) = title {
            game.title = t.clone();
        }
        library.upsert(&game).await?;

        let mut job = JobDescriptor::new(game.clone(), kind);
        cli.apply_job_matches(m, &mut job)?;
        submitted.push((game, scheduler.enqueue(job)));
    }

    let (games, handles): (Vec<_>, Vec<_>) = submitted.into_iter().unzip();
    let outcomes = join_all(handles.into_iter().map(|h| h.wait())).await;

    // Dropping the last handles to the scheduler closes the event stream.
    drop(scheduler);
    drop(ui);
    view.await.context("progress view")?;

    let mut failed = 0;
    for (mut game, outcome) in games.into_iter().zip(&outcomes) {
        match outcome {
            JobOutcome::Succeeded if game.is_remote() => {
                if kind == JobKind::Install {
                    game.install_path = None;
                }
                match library.resolve(&mut game, registry.locator.as_ref()).await {
                    Ok(Some(info)) => println!("{}: {}", game.title, info.install_path.display()),
                    Ok(None) => tracing::warn!(game = %game.title, "installed but not found in legendary's records"),
                    Err(e) => tracing::warn!(game = %game.title, error = %format!("{:#}", e), "could not resolve install path"),
                }
            }
            JobOutcome::Failed(_) => failed += 1,
            _ => {}
        }
    }

    println!("{}: {}/{}", msgs.summary_header, outcomes.len() - failed, outcomes.len());
    if failed > 0 {
        anyhow::bail!("{} of {} jobs failed", failed, outcomes.len());
    }
    Ok(())
}

async fn launch_game(
    id: &str,
    registry: &PluginRegistry,
    library: &GameLibrary,
    cfg: &LauncherConfig,
    msgs: &'static Messages,
) -> anyhow::Result<()> {
    let mut game = library.require(id).await?;
    if game.is_remote() && library.resolve(&mut game, registry.locator.as_ref()).await?.is_none() {
        anyhow::bail!("{} is not installed", game.title);
    }

    let supervisor = ProcessSupervisor::new(registry.runtime.clone(), Arc::new(LogPresence), cfg.poll_interval());
    let monitor = supervisor.launch(&game).await?;
    println!("{}: {}", msgs.playing, game.title);

    monitor.await.context("process monitor")?;
    println!("{}: {}", msgs.exited, game.title);
    Ok(())
}

async fn render_jobs(
    mut events: broadcast::Receiver<SchedulerEvent>,
    mut ui_rx: mpsc::UnboundedReceiver<UiMessage>,
    msgs: &'static Messages,
) {
    let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stdout());
    let sty_spin = ProgressStyle::with_template("{spinner:.green} {prefix} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("|/-\\ ");
    let sty_bar = ProgressStyle::with_template("{prefix} {bar:40.cyan/blue} {pos:>3}% {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());

    let mut bars: HashMap<JobId, ProgressBar> = HashMap::new();
    let (mut events_open, mut ui_open) = (true, true);

    while events_open || ui_open {
        tokio::select! {
            evt = events.recv(), if events_open => match evt {
                Ok(SchedulerEvent::JobQueued { job_id, kind, title, position }) => {
                    let pb = mp.add(ProgressBar::new_spinner());
                    pb.set_style(sty_spin.clone());
                    pb.set_prefix(format!("[{title}]"));
                    pb.set_message(format!("{} {} (#{})", kind, msgs.queued, position + 1));
                    bars.insert(job_id, pb);
                }
                Ok(SchedulerEvent::JobMerged { title, .. }) => {
                    let _ = mp.println(format!("[{}] {}", title, msgs.merged));
                }
                Ok(SchedulerEvent::JobStarted { job_id, kind, .. }) => {
                    if let Some(pb) = bars.get(&job_id) {
                        pb.enable_steady_tick(std::time::Duration::from_millis(120));
                        pb.set_message(format!("{} {}", kind, msgs.started));
                    }
                }
                Ok(SchedulerEvent::Progress { job_id, snapshot }) => {
                    if let Some(pb) = bars.get(&job_id) {
                        if let Some(pct) = snapshot.percentage() {
                            if pb.length() != Some(100) {
                                pb.set_style(sty_bar.clone());
                                pb.set_length(100);
                            }
                            pb.set_position(pct.round().clamp(0.0, 100.0) as u64);
                        }
                        pb.set_message(progress_message(&snapshot, msgs));
                    }
                }
                Ok(SchedulerEvent::JobFinished { job_id, outcome, .. }) => {
                    if let Some(pb) = bars.get(&job_id) {
                        match outcome {
                            JobOutcome::Succeeded => pb.finish_with_message(msgs.status_done),
                            JobOutcome::Skipped => pb.finish_with_message(msgs.status_skipped),
                            JobOutcome::Failed(reason) => {
                                pb.abandon_with_message(format!("{}: {}", msgs.status_failed, reason))
                            }
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "progress view lagging");
                }
                Err(broadcast::error::RecvError::Closed) => events_open = false,
            },
            msg = ui_rx.recv(), if ui_open => match msg {
                Some(UiMessage::Notice(text)) => {
                    let _ = mp.println(format!("[{}] {}", msgs.notice_prefix, text));
                }
                Some(UiMessage::Alert(alert)) => {
                    let _ = mp.println(format!("[{}] {}", msgs.alert_prefix, alert));
                }
                None => ui_open = false,
            },
        }
    }
}

fn progress_message(s: &ProgressSnapshot, msgs: &Messages) -> String {
    let mut parts = Vec::new();
    if let Some(b) = &s.bytes {
        parts.push(format!("{} dl / {} written", fmt_bytes(b.downloaded), fmt_bytes(b.written)));
    }
    if let Some(sp) = &s.speed {
        parts.push(format!("{}/s", fmt_bytes(sp.raw)));
    }
    if let Some(d) = &s.disk {
        parts.push(format!("disk {}/s", fmt_bytes(d.write)));
    }
    if let Some(c) = &s.cache {
        parts.push(format!("cache {} ({} tasks)", fmt_bytes(c.usage), c.active_tasks));
    }
    let eta = s
        .transfer
        .as_ref()
        .map(|t| format!("{}s", t.eta.as_secs()))
        .unwrap_or_else(|| msgs.eta_unknown.to_string());
    parts.push(format!("eta {}", eta));
    parts.join(" | ")
}

fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.2}GiB", f / GB)
    } else if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}
