use async_trait::async_trait;
use orange_launcher::core::events::SchedulerEvent;
use orange_launcher::core::model::{GameRecord, JobDescriptor, JobKind, JobOutcome, Platform};
use orange_launcher::core::progress::{ProgressUpdate, TransferProgress};
use orange_launcher::core::scheduler::Scheduler;
use orange_launcher::plugins::console::sink::{UiChannel, UiMessage};
use orange_launcher::plugins::registry::{AlertSink, FailureAlert, Notifier, ProgressReporter, RemoteInstaller};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Finishes every job right away, failing the ones listed in `failing`.
#[derive(Default)]
struct ScriptedInstaller {
    failing: HashSet<String>,
    ran: Mutex<Vec<String>>,
}

impl ScriptedInstaller {
    fn failing(apps: &[&str]) -> Self {
        Self { failing: apps.iter().map(|a| a.to_string()).collect(), ran: Mutex::new(Vec::new()) }
    }

    fn ran(&self) -> Vec<String> {
        self.ran.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteInstaller for ScriptedInstaller {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn run(&self, job: &JobDescriptor, progress: ProgressReporter) -> anyhow::Result<()> {
        self.ran.lock().unwrap().push(job.game.id.clone());
        progress.report(ProgressUpdate::Transfer(TransferProgress {
            percentage: 50.0,
            downloaded_objects: 1,
            total_objects: 2,
            runtime: Duration::from_secs(1),
            eta: Duration::from_secs(1),
        }));
        tokio::task::yield_now().await;
        if self.failing.contains(&job.game.id) {
            anyhow::bail!("disk full");
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingUi {
    notices: Mutex<Vec<String>>,
    alerts: Mutex<Vec<FailureAlert>>,
}

impl Notifier for RecordingUi {
    fn notify(&self, title: &str) -> anyhow::Result<()> {
        self.notices.lock().unwrap().push(title.to_string());
        Ok(())
    }
}

impl AlertSink for RecordingUi {
    fn present_failure(&self, alert: FailureAlert) {
        self.alerts.lock().unwrap().push(alert);
    }
}

fn remote(app: &str, kind: JobKind) -> JobDescriptor {
    JobDescriptor::new(GameRecord::remote(app, app), kind)
}

#[tokio::test]
async fn failure_alerts_and_does_not_stall_the_queue() {
    let installer = Arc::new(ScriptedInstaller::failing(&["A"]));
    let ui = Arc::new(RecordingUi::default());
    let scheduler = Scheduler::new(installer.clone(), ui.clone(), ui.clone());

    let a = scheduler.enqueue(remote("A", JobKind::Install));
    let b = scheduler.enqueue(remote("B", JobKind::Install));

    assert_eq!(a.wait().await, JobOutcome::Failed("disk full".into()));
    assert_eq!(b.wait().await, JobOutcome::Succeeded);

    let alerts = ui.alerts.lock().unwrap().clone();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "A");
    assert_eq!(alerts[0].verb, "installing");
    assert_eq!(alerts[0].description, "disk full");
    assert_eq!(alerts[0].to_string(), "Error installing A: disk full");
    assert_eq!(*ui.notices.lock().unwrap(), vec!["Finished installing B".to_string()]);

    assert_eq!(installer.ran(), vec!["A", "B"]);
    assert!(scheduler.current().is_none());
    assert!(scheduler.queued().is_empty());
    assert!(scheduler.is_idle());
}

#[tokio::test]
async fn jobs_start_in_submission_order_one_at_a_time() {
    let installer = Arc::new(ScriptedInstaller::default());
    let ui = Arc::new(RecordingUi::default());
    let scheduler = Scheduler::new(installer.clone(), ui.clone(), ui.clone());
    let mut events = scheduler.subscribe();

    let handles = vec![
        scheduler.enqueue(remote("one", JobKind::Install)),
        scheduler.enqueue(remote("two", JobKind::Update)),
        scheduler.enqueue(remote("three", JobKind::Repair)),
    ];
    for h in handles {
        assert!(h.wait().await.is_success());
    }

    let mut log = Vec::new();
    while let Ok(evt) = events.try_recv() {
        match evt {
            SchedulerEvent::JobStarted { title, .. } => log.push(format!("start {title}")),
            SchedulerEvent::JobFinished { title, .. } => log.push(format!("finish {title}")),
            _ => {}
        }
    }
    assert_eq!(
        log,
        vec!["start one", "finish one", "start two", "finish two", "start three", "finish three"]
    );
    assert_eq!(
        *ui.notices.lock().unwrap(),
        vec!["Finished installing one", "Finished updating two", "Finished repairing three"]
    );
}

#[tokio::test]
async fn progress_events_carry_the_running_job() {
    let installer = Arc::new(ScriptedInstaller::default());
    let ui = Arc::new(RecordingUi::default());
    let scheduler = Scheduler::new(installer, ui.clone(), ui);
    let mut events = scheduler.subscribe();

    let handle = scheduler.enqueue(remote("Sugar", JobKind::Install));
    let id = handle.id();
    handle.wait().await;

    let mut saw_progress = false;
    while let Ok(evt) = events.try_recv() {
        if let SchedulerEvent::Progress { job_id, snapshot } = evt {
            assert_eq!(job_id, id);
            assert_eq!(snapshot.percentage(), Some(50.0));
            saw_progress = true;
        }
    }
    assert!(saw_progress);
    // The snapshot is reset when the next job starts, not when one finishes.
    assert_eq!(scheduler.status().percentage(), Some(50.0));
}

#[tokio::test]
async fn local_games_skip_the_installer() {
    let installer = Arc::new(ScriptedInstaller::default());
    let ui = Arc::new(RecordingUi::default());
    let scheduler = Scheduler::new(installer.clone(), ui.clone(), ui.clone());

    let local = GameRecord::local("Solitaire", PathBuf::from("/games/sol"), PathBuf::from("sol"), Platform::Native);
    let skipped = scheduler.enqueue(JobDescriptor::new(local, JobKind::Install));
    let after = scheduler.enqueue(remote("Sugar", JobKind::Install));

    assert_eq!(skipped.wait().await, JobOutcome::Skipped);
    assert_eq!(after.wait().await, JobOutcome::Succeeded);
    assert_eq!(installer.ran(), vec!["Sugar"]);
    assert!(ui.alerts.lock().unwrap().is_empty());
    assert!(scheduler.is_idle());
}

#[tokio::test]
async fn alerts_reach_the_terminal_channel() {
    let installer = Arc::new(ScriptedInstaller::failing(&["Sugar"]));
    let (ui, mut rx) = UiChannel::new();
    let ui = Arc::new(ui);
    let scheduler = Scheduler::new(installer, ui.clone(), ui);

    let outcome = scheduler.enqueue(remote("Sugar", JobKind::Repair)).wait().await;
    assert!(!outcome.is_success());

    match rx.recv().await {
        Some(UiMessage::Alert(alert)) => assert_eq!(alert.to_string(), "Error repairing Sugar: disk full"),
        other => panic!("unexpected {:?}", other),
    }
}

/// Counts `run` calls that overlap another one.
#[derive(Default)]
struct ExclusiveInstaller {
    in_flight: AtomicBool,
    overlaps: AtomicUsize,
    runs: AtomicUsize,
}

#[async_trait]
impl RemoteInstaller for ExclusiveInstaller {
    fn name(&self) -> &'static str {
        "exclusive"
    }

    async fn run(&self, _job: &JobDescriptor, _progress: ProgressReporter) -> anyhow::Result<()> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.in_flight.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_enqueues_run_one_at_a_time() {
    const JOBS: usize = 16;
    let installer = Arc::new(ExclusiveInstaller::default());
    let ui = Arc::new(RecordingUi::default());
    let scheduler = Scheduler::new(installer.clone(), ui.clone(), ui.clone());
    let mut events = scheduler.subscribe();

    let submitters: Vec<_> = (0..JOBS)
        .map(|i| {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.enqueue(remote(&format!("game-{i}"), JobKind::Install)) })
        })
        .collect();

    let mut handles = Vec::new();
    for s in submitters {
        handles.push(s.await.unwrap());
    }
    for h in handles {
        assert_eq!(h.wait().await, JobOutcome::Succeeded);
    }

    assert_eq!(installer.runs.load(Ordering::SeqCst), JOBS);
    assert_eq!(installer.overlaps.load(Ordering::SeqCst), 0);
    assert!(scheduler.is_idle());
    assert_eq!(ui.notices.lock().unwrap().len(), JOBS);

    // Every job is announced before it starts, and starts before it finishes.
    let mut seen: HashMap<_, Vec<&str>> = HashMap::new();
    while let Ok(evt) = events.try_recv() {
        match evt {
            SchedulerEvent::JobQueued { job_id, .. } => seen.entry(job_id).or_default().push("queued"),
            SchedulerEvent::JobStarted { job_id, .. } => seen.entry(job_id).or_default().push("started"),
            SchedulerEvent::JobFinished { job_id, .. } => seen.entry(job_id).or_default().push("finished"),
            _ => {}
        }
    }
    assert_eq!(seen.len(), JOBS);
    for order in seen.values() {
        assert_eq!(order, &vec!["queued", "started", "finished"]);
    }
}
