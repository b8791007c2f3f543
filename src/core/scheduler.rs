use crate::core::events::SchedulerEvent;
use crate::core::model::*;
use crate::core::progress::ProgressSnapshot;
use crate::core::queue::{Admission, OperationQueue, QueuedJob};
use crate::plugins::registry::{AlertSink, FailureAlert, Notifier, ProgressReporter, RemoteInstaller};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};

/// Handle to an admitted job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: JobId,
    merged: bool,
    outcome: watch::Receiver<Option<JobOutcome>>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// True when the enqueue matched a job that was already current or waiting.
    pub fn is_merged(&self) -> bool {
        self.merged
    }

    pub fn outcome(&self) -> Option<JobOutcome> {
        self.outcome.borrow().clone()
    }

    /// Waits for the job to reach a terminal state.
    pub async fn wait(mut self) -> JobOutcome {
        match self.outcome.wait_for(|o| o.is_some()).await {
            Ok(o) => o.clone().unwrap_or(JobOutcome::Skipped),
            Err(_) => JobOutcome::Failed("scheduler shut down before the job finished".to_string()),
        }
    }
}

struct SchedulerState {
    queue: OperationQueue,
    outcomes: HashMap<JobId, watch::Sender<Option<JobOutcome>>>,
}

struct Inner {
    state: Mutex<SchedulerState>,
    installer: Arc<dyn RemoteInstaller>,
    notifier: Arc<dyn Notifier>,
    alerts: Arc<dyn AlertSink>,
    event_tx: broadcast::Sender<SchedulerEvent>,
}

/// Runs install/update/repair jobs one at a time, in submission order.
///
/// Cheap to clone; all clones share the same queue. Jobs are dispatched with
/// `tokio::spawn`, so `enqueue` and `advance` must be called from inside a
/// tokio runtime.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        installer: Arc<dyn RemoteInstaller>,
        notifier: Arc<dyn Notifier>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SchedulerState { queue: OperationQueue::new(), outcomes: HashMap::new() }),
                installer,
                notifier,
                alerts,
                event_tx,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Admits `job` and kicks the queue. Never fails: installer errors are
    /// reported through the alert sink when the job actually runs.
    pub fn enqueue(&self, job: JobDescriptor) -> JobHandle {
        let title = job.game.title.clone();
        let kind = job.kind;

        let handle = {
            let mut st = self.state();
            let admission = st.queue.enqueue(job);
            let id = admission.id();
            let rx = st.outcomes.entry(id).or_insert_with(|| watch::channel(None).0).subscribe();
            let merged = matches!(admission, Admission::Merged { .. });
            let event = match admission {
                Admission::Queued { id, position } => SchedulerEvent::JobQueued { job_id: id, kind, title: title.clone(), position },
                Admission::Merged { id } => SchedulerEvent::JobMerged { job_id: id, title: title.clone() },
            };
            // Sent under the lock so no start or progress event for this job
            // can overtake it.
            let _ = self.inner.event_tx.send(event);
            JobHandle { id, merged, outcome: rx }
        };

        if handle.merged {
            tracing::info!(job_id = %handle.id, game = %title, "duplicate job merged into existing entry");
        } else {
            tracing::info!(job_id = %handle.id, game = %title, kind = %kind, "job queued");
        }

        self.advance();
        handle
    }

    /// Starts the next job if nothing is running. Safe to call at any time;
    /// returns whether a job was started.
    pub fn advance(&self) -> bool {
        let next = self.state().queue.advance().cloned();
        let started = next.is_some();
        self.dispatch(next);
        started
    }

    pub fn current(&self) -> Option<JobDescriptor> {
        self.state().queue.current().map(|j| j.descriptor.clone())
    }

    pub fn current_id(&self) -> Option<JobId> {
        self.state().queue.current().map(|j| j.id)
    }

    pub fn queued(&self) -> Vec<JobDescriptor> {
        self.state().queue.pending().map(|j| j.descriptor.clone()).collect()
    }

    pub fn status(&self) -> ProgressSnapshot {
        self.state().queue.status().clone()
    }

    pub fn is_idle(&self) -> bool {
        self.state().queue.is_idle()
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, mut next: Option<QueuedJob>) {
        while let Some(job) = next.take() {
            let _ = self.inner.event_tx.send(SchedulerEvent::JobStarted {
                job_id: job.id,
                kind: job.descriptor.kind,
                title: job.descriptor.game.title.clone(),
            });

            match job.descriptor.game.source {
                GameSource::Local => {
                    tracing::info!(
                        job_id = %job.id,
                        game = %job.descriptor.game.title,
                        kind = %job.descriptor.kind,
                        "local games are always installed, skipping"
                    );
                    next = self.complete(&job, JobOutcome::Skipped);
                }
                GameSource::Remote => {
                    let scheduler = self.clone();
                    tokio::spawn(async move {
                        scheduler.run_job(job).await;
                    });
                }
            }
        }
    }

    async fn run_job(self, job: QueuedJob) {
        let desc = &job.descriptor;
        tracing::info!(
            job_id = %job.id,
            game = %desc.game.title,
            kind = %desc.kind,
            installer = self.inner.installer.name(),
            "job started"
        );

        let result = self.inner.installer.run(desc, self.reporter_for(job.id)).await;

        let outcome = match result {
            Ok(()) => {
                tracing::info!(job_id = %job.id, game = %desc.game.title, "job finished");
                let message = format!("Finished {} {}", desc.kind.verb(), desc.game.title);
                if let Err(e) = self.inner.notifier.notify(&message) {
                    tracing::warn!(error = %format!("{:#}", e), "notification dropped");
                }
                JobOutcome::Succeeded
            }
            Err(e) => {
                let description = format!("{:#}", e);
                tracing::error!(job_id = %job.id, game = %desc.game.title, error = %description, "job failed");
                self.inner.alerts.present_failure(FailureAlert {
                    verb: desc.kind.verb().to_string(),
                    title: desc.game.title.clone(),
                    description: description.clone(),
                });
                JobOutcome::Failed(description)
            }
        };

        let next = self.complete(&job, outcome);
        self.dispatch(next);
    }

    /// Clears the current slot and pops the next job under one lock.
    /// `JobFinished` goes out under the same lock, ahead of the next start.
    fn complete(&self, job: &QueuedJob, outcome: JobOutcome) -> Option<QueuedJob> {
        let mut st = self.state();
        st.queue.finish(job.id);
        if let Some(tx) = st.outcomes.remove(&job.id) {
            tx.send_replace(Some(outcome.clone()));
        }
        let _ = self.inner.event_tx.send(SchedulerEvent::JobFinished {
            job_id: job.id,
            kind: job.descriptor.kind,
            title: job.descriptor.game.title.clone(),
            outcome,
        });
        let next = st.queue.advance().cloned();
        next
    }

    fn reporter_for(&self, job_id: JobId) -> ProgressReporter {
        let inner = Arc::downgrade(&self.inner);
        ProgressReporter::from_fn(move |update| {
            let Some(inner) = inner.upgrade() else { return };
            let snapshot = {
                let mut st = inner.state.lock().unwrap_or_else(PoisonError::into_inner);
                if !st.queue.report(job_id, update) {
                    return;
                }
                st.queue.status().clone()
            };
            let _ = inner.event_tx.send(SchedulerEvent::Progress { job_id, snapshot });
        })
    }
}
