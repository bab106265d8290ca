//! Fire-and-forget background work whose outcome gets picked up later by whoever renders it.

use crate::error::{JoinTaskSnafu, RosterResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use tokio::sync::broadcast::{Receiver, Sender, channel};

/// How long a finished outcome waits to be picked up before it is thrown away.
pub const FINISHED_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct JobCompletion {
    pub id: JobId,
    pub succeeded: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Finished { succeeded: bool },
    Unknown,
}

enum Slot<T> {
    Running,
    Finished {
        outcome: RosterResult<T>,
        at: Instant,
    },
}

struct Inner<T> {
    next_id: AtomicU64,
    slots: Mutex<HashMap<JobId, Slot<T>>>,
    completions: Sender<JobCompletion>,
    retention: Duration,
}

pub struct JobRunner<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> JobRunner<T> {
    pub fn new() -> Self {
        Self::with_retention(FINISHED_RETENTION)
    }

    /// Finished outcomes nobody took within `retention` are dropped the next time a job is submitted.
    pub fn with_retention(retention: Duration) -> Self {
        let (completions, _rx) = channel(16);
        Self {
            inner: Arc::new(Inner {
                next_id: AtomicU64::new(1),
                slots: Mutex::new(HashMap::new()),
                completions,
                retention,
            }),
        }
    }

    /// Spawns `job` onto the runtime. A panic inside the job is stored as a failed outcome.
    pub fn submit<F>(&self, job: F) -> JobId
    where
        F: Future<Output = RosterResult<T>> + Send + 'static,
    {
        let id = JobId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut slots = self.inner.slots.lock();
            let before = slots.len();
            slots.retain(|_, slot| match slot {
                Slot::Running => true,
                Slot::Finished { at, .. } => at.elapsed() < self.inner.retention,
            });
            if slots.len() < before {
                debug!(dropped = before - slots.len(), "Dropped stale job outcomes");
            }
            slots.insert(id, Slot::Running);
        }

        let inner = self.inner.clone();
        tokio::spawn(async move {
            let outcome = tokio::spawn(job)
                .await
                .context(JoinTaskSnafu)
                .and_then(|outcome| outcome);
            let succeeded = outcome.is_ok();
            if let Err(e) = &outcome {
                warn!(%id, ?e, "Background job failed");
            }

            inner.slots.lock().insert(
                id,
                Slot::Finished {
                    outcome,
                    at: Instant::now(),
                },
            );
            //nobody listening is fine, the outcome is still there to be polled
            let _ = inner.completions.send(JobCompletion { id, succeeded });
        });

        id
    }

    pub fn status(&self, id: JobId) -> JobStatus {
        match self.inner.slots.lock().get(&id) {
            Some(Slot::Running) => JobStatus::Running,
            Some(Slot::Finished { outcome, .. }) => JobStatus::Finished {
                succeeded: outcome.is_ok(),
            },
            None => JobStatus::Unknown,
        }
    }

    /// Removes and returns the outcome if the job has finished. Running and unknown jobs give `None`.
    pub fn take_result(&self, id: JobId) -> Option<RosterResult<T>> {
        let mut slots = self.inner.slots.lock();
        if !matches!(slots.get(&id), Some(Slot::Finished { .. })) {
            return None;
        }

        match slots.remove(&id) {
            Some(Slot::Finished { outcome, .. }) => Some(outcome),
            _ => None,
        }
    }

    pub fn subscribe_completions(&self) -> Receiver<JobCompletion> {
        self.inner.completions.subscribe()
    }
}

impl<T: Send + 'static> Default for JobRunner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JobRunner<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for JobRunner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRunner")
            .field("next_id", &self.inner.next_id.load(Ordering::Relaxed))
            .field("jobs", &self.inner.slots.lock().len())
            .finish()
    }
}
