use crate::core::model::{JobDescriptor, JobId};
use crate::core::progress::{ProgressSnapshot, ProgressUpdate};
use std::collections::VecDeque;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    pub id: JobId,
    pub descriptor: JobDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Appended to the tail; `position` is 0-based among waiting jobs.
    Queued { id: JobId, position: usize },
    /// An identical descriptor is already current or waiting.
    Merged { id: JobId },
}

impl Admission {
    pub fn id(&self) -> JobId {
        match self {
            Admission::Queued { id, .. } | Admission::Merged { id } => *id,
        }
    }
}

/// FIFO of install/update/repair jobs with a single current slot.
///
/// Pure state: no I/O and no async. The scheduler wraps it in one lock so
/// that every transition here is atomic with respect to the others.
#[derive(Debug, Default)]
pub struct OperationQueue {
    pending: VecDeque<QueuedJob>,
    current: Option<QueuedJob>,
    status: ProgressSnapshot,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, descriptor: JobDescriptor) -> Admission {
        if let Some(existing) = self.find(&descriptor) {
            return Admission::Merged { id: existing.id };
        }
        let id = Uuid::new_v4();
        self.pending.push_back(QueuedJob { id, descriptor });
        Admission::Queued { id, position: self.pending.len() - 1 }
    }

    /// Moves the head of the queue into the current slot.
    ///
    /// No-op unless the slot is empty and something is waiting. Returns the
    /// job that just became current.
    pub fn advance(&mut self) -> Option<&QueuedJob> {
        if self.current.is_some() {
            return None;
        }
        let next = self.pending.pop_front()?;
        self.status = ProgressSnapshot::default();
        self.current = Some(next);
        self.current.as_ref()
    }

    /// Clears the current slot if it holds `id`.
    pub fn finish(&mut self, id: JobId) -> Option<QueuedJob> {
        match &self.current {
            Some(job) if job.id == id => self.current.take(),
            _ => None,
        }
    }

    /// Applies a progress update on behalf of `id`. Updates from a job that is
    /// no longer current are dropped.
    pub fn report(&mut self, id: JobId, update: ProgressUpdate) -> bool {
        if !self.is_current(id) {
            return false;
        }
        self.status.apply(update);
        true
    }

    pub fn is_current(&self, id: JobId) -> bool {
        self.current.as_ref().map(|j| j.id) == Some(id)
    }

    pub fn current(&self) -> Option<&QueuedJob> {
        self.current.as_ref()
    }

    pub fn pending(&self) -> impl Iterator<Item = &QueuedJob> {
        self.pending.iter()
    }

    pub fn status(&self) -> &ProgressSnapshot {
        &self.status
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }

    fn find(&self, descriptor: &JobDescriptor) -> Option<&QueuedJob> {
        self.current
            .iter()
            .chain(self.pending.iter())
            .find(|j| &j.descriptor == descriptor)
    }
}
