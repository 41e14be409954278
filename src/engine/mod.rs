//! The round/phase engine: lifecycle transitions, completion evaluation,
//! scoring, and generation tracking.

pub mod eligibility;
pub mod generation;
pub mod lifecycle;
pub mod scoring;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::{
    error::ServiceError,
    scheduler::ScheduledJob,
    services::session_service,
    state::SharedState,
};

/// Drain fired timers and run each job on its own task.
///
/// Jobs are independent by construction, so a slow generation verification
/// never delays another room's deadline.
pub async fn run_job_worker(state: SharedState, mut jobs: mpsc::UnboundedReceiver<ScheduledJob>) {
    while let Some(job) = jobs.recv().await {
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = dispatch_job(&state, job.clone()).await {
                error!(?job, error = %err, "scheduled job failed");
            }
        });
    }
    debug!("scheduler channel closed; job worker exiting");
}

/// Execute one fired job. Duplicate and stale triggers are absorbed inside
/// the handlers, never surfaced.
pub async fn dispatch_job(state: &SharedState, job: ScheduledJob) -> Result<(), ServiceError> {
    match job {
        ScheduledJob::RoundDeadline { round_id } => {
            lifecycle::transition(state, round_id).await?;
        }
        ScheduledJob::VerifyGeneration { round_id, attempt } => {
            generation::verify_generation(state, round_id, attempt).await?;
        }
        ScheduledJob::InitializeGame { room_id } => {
            session_service::initialize_game(state, room_id).await?;
        }
        ScheduledJob::BeginNextRound { room_id } => {
            session_service::start_next_round(state, room_id).await?;
        }
    }
    Ok(())
}
