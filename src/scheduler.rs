//! Durable delayed-job facility.
//!
//! The engine never sleeps inline: every future action is a [`ScheduledJob`]
//! handed to a [`Scheduler`], which returns a cancelable [`TimerId`]. The
//! default [`TokioScheduler`] runs one sleeper task per timer and pushes fired
//! jobs onto a channel drained by the engine's job worker. Handles are never
//! reused, and canceling a fired or unknown handle is a silent no-op; the
//! lifecycle manager's handle-clearing protocol depends on both properties.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use futures::future::{AbortHandle, Abortable};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Opaque handle to a pending timer. Stored as plain data on the round record.
pub type TimerId = Uuid;

/// Closed set of callbacks the engine schedules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledJob {
    /// The current phase of a round reached its wall-clock deadline.
    RoundDeadline {
        /// Round to advance.
        round_id: Uuid,
    },
    /// Check that prompts are visible to the generation collaborator.
    VerifyGeneration {
        /// Round whose generation is being verified.
        round_id: Uuid,
        /// 1-based attempt counter.
        attempt: u32,
    },
    /// Bootstrap round 1 after the host started the game.
    InitializeGame {
        /// Room being started.
        room_id: Uuid,
    },
    /// Start the next round after the results grace period.
    BeginNextRound {
        /// Room whose next round should begin.
        room_id: Uuid,
    },
}

/// Contract of the delayed-job facility.
pub trait Scheduler: Send + Sync {
    /// Schedule `job` to run at (or as soon as possible after) `deadline`.
    fn schedule_at(&self, deadline: SystemTime, job: ScheduledJob) -> TimerId;
    /// Schedule `job` to run after `delay`.
    fn schedule_after(&self, delay: Duration, job: ScheduledJob) -> TimerId;
    /// Cancel a pending timer. Must not fail when the timer already fired or
    /// was never known.
    fn cancel(&self, id: TimerId);
}

/// Tokio-backed scheduler used by the running server.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<ScheduledJob>,
    pending: Arc<DashMap<TimerId, AbortHandle>>,
}

impl TokioScheduler {
    /// Build a scheduler plus the receiving end its fired jobs arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScheduledJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                pending: Arc::new(DashMap::new()),
            },
            rx,
        )
    }

    fn spawn_sleeper(&self, delay: Duration, job: ScheduledJob) -> TimerId {
        let id = Uuid::new_v4();
        let tx = self.tx.clone();
        let pending = Arc::clone(&self.pending);

        // The abort handle is registered before the sleeper is spawned, so
        // even a zero-delay timer cannot fire ahead of its own bookkeeping.
        let (abort_handle, registration) = AbortHandle::new_pair();
        self.pending.insert(id, abort_handle);

        tokio::spawn(async move {
            if Abortable::new(tokio::time::sleep(delay), registration)
                .await
                .is_err()
            {
                // Canceled mid-sleep; cancel() already removed the entry.
                return;
            }
            pending.remove(&id);
            if tx.send(job).is_err() {
                debug!(timer_id = %id, "job worker gone; dropping fired timer");
            }
        });

        id
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_at(&self, deadline: SystemTime, job: ScheduledJob) -> TimerId {
        let delay = deadline
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO);
        self.spawn_sleeper(delay, job)
    }

    fn schedule_after(&self, delay: Duration, job: ScheduledJob) -> TimerId {
        self.spawn_sleeper(delay, job)
    }

    fn cancel(&self, id: TimerId) {
        if let Some((_, handle)) = self.pending.remove(&id) {
            handle.abort();
        } else {
            debug!(timer_id = %id, "cancel of fired or unknown timer ignored");
        }
    }
}
