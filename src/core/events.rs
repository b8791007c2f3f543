use crate::core::model::{GameId, JobId, JobKind, JobOutcome};
use crate::core::progress::ProgressSnapshot;

#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    JobQueued { job_id: JobId, kind: JobKind, title: String, position: usize },
    JobMerged { job_id: JobId, title: String },
    JobStarted { job_id: JobId, kind: JobKind, title: String },
    Progress { job_id: JobId, snapshot: ProgressSnapshot },
    JobFinished { job_id: JobId, kind: JobKind, title: String, outcome: JobOutcome },
}

#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    GameLaunching { game_id: GameId, title: String },
    GameStarted { game_id: GameId, title: String },
    GameExited { game_id: GameId, title: String },
    LaunchFailed { game_id: GameId, title: String, message: String },
}
