//! Round lifecycle: creation, and the single idempotent phase-transition
//! entry point that both wall-clock timers and early triggers converge on.
//!
//! Two unsynchronized signals race to advance every phase: the scheduled
//! deadline and the "last required participant acted" check. There is no
//! lock; the guarantees come from two pieces of data on the round record.
//! The stored timer handle is atomically taken before anything else, so a
//! racing cancel never touches a newer timer, and a minimum-dwell check
//! absorbs any trigger that arrives just after a competitor already advanced
//! the phase (the new phase is then seconds old at most).

use std::time::{Duration, SystemTime};

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::GameTuning,
    dao::game_store::GameStore,
    dao::models::{RoomEntity, RoomSettings, RoundEntity, RoundPhase},
    engine::scoring,
    error::ServiceError,
    scheduler::ScheduledJob,
    services::{session_service, sse_events},
    state::SharedState,
};

/// What a call to [`transition`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The round moved into the given phase.
    Advanced(RoundPhase),
    /// The call was absorbed as a duplicate or stale trigger.
    Skipped(&'static str),
}

/// Wall-clock length of a phase for the given room.
pub fn phase_duration(phase: RoundPhase, settings: &RoomSettings, tuning: &GameTuning) -> Duration {
    match phase {
        RoundPhase::Prompt | RoundPhase::Voting => Duration::from_secs(settings.seconds_per_phase),
        RoundPhase::Generating => tuning.generating_phase,
        RoundPhase::Results => tuning.results_phase,
        RoundPhase::Complete => Duration::ZERO,
    }
}

/// Create a round in the prompt phase and schedule its deadline.
///
/// The room's current-round pointer is updated by the caller.
pub async fn start_round(
    state: &SharedState,
    room: &RoomEntity,
    number: u32,
    question_id: Uuid,
) -> Result<RoundEntity, ServiceError> {
    let store = state.require_store().await?;
    let now = SystemTime::now();
    let deadline = now + phase_duration(RoundPhase::Prompt, &room.settings, state.tuning());

    let mut round = RoundEntity {
        id: Uuid::new_v4(),
        room_id: room.id,
        number,
        question_id,
        phase: RoundPhase::Prompt,
        phase_end_time: deadline,
        scheduled_timer: None,
        images_expected: 0,
        images_completed: 0,
        generation_error: None,
        created_at: now,
    };
    store.insert_round(round.clone()).await?;

    let timer = state
        .scheduler()
        .schedule_at(deadline, ScheduledJob::RoundDeadline { round_id: round.id });
    store.set_round_timer(round.id, Some(timer)).await?;
    round.scheduled_timer = Some(timer);

    info!(room_id = %room.id, round = number, "round started");
    sse_events::broadcast_round_started(state, room.id, &round);

    Ok(round)
}

/// Advance a round to its next phase. Idempotent: duplicate invocations
/// inside the dwell window are absorbed, not errors.
pub async fn transition(
    state: &SharedState,
    round_id: Uuid,
) -> Result<TransitionOutcome, ServiceError> {
    let store = state.require_store().await?;

    let Some(round) = store.find_round(round_id).await? else {
        debug!(%round_id, "transition target no longer exists");
        return Ok(TransitionOutcome::Skipped("round missing"));
    };
    let Some(room) = store.find_room(round.room_id).await? else {
        debug!(%round_id, room_id = %round.room_id, "room torn down under its round");
        return Ok(TransitionOutcome::Skipped("room missing"));
    };

    let tuning = state.tuning();
    let length = phase_duration(round.phase, &room.settings, tuning);
    let phase_started = round
        .phase_end_time
        .checked_sub(length)
        .unwrap_or(round.created_at);
    let dwell = SystemTime::now()
        .duration_since(phase_started)
        .unwrap_or_default();
    if dwell < tuning.min_phase_dwell {
        debug!(
            %round_id,
            phase = ?round.phase,
            dwell_ms = dwell.as_millis() as u64,
            "duplicate transition absorbed below minimum dwell"
        );
        return Ok(TransitionOutcome::Skipped("below minimum dwell"));
    }

    // Claim the pending timer slot before branching; a concurrent caller's
    // cancel now hits nothing.
    store.take_round_timer(round_id).await?;

    let outcome = match round.phase {
        RoundPhase::Prompt => begin_generating(state, &room, &round).await?,
        RoundPhase::Generating => begin_voting(state, &room, &round).await?,
        RoundPhase::Voting => begin_results(state, &room, &round).await?,
        RoundPhase::Results => complete_round(state, &room, &round).await?,
        RoundPhase::Complete => {
            debug!(%round_id, "transition on a completed round ignored");
            TransitionOutcome::Skipped("already complete")
        }
    };

    if let TransitionOutcome::Advanced(phase) = outcome {
        info!(%round_id, room_id = %room.id, ?phase, "round advanced");
    }
    Ok(outcome)
}

async fn begin_generating(
    state: &SharedState,
    room: &RoomEntity,
    round: &RoundEntity,
) -> Result<TransitionOutcome, ServiceError> {
    let store = state.require_store().await?;
    let tuning = state.tuning();

    let prompts = store.prompts_for_round(round.id).await?;
    let deadline = SystemTime::now() + tuning.generating_phase;

    store
        .set_round_phase(round.id, RoundPhase::Generating, deadline, None)
        .await?;
    store
        .set_images_expected(round.id, prompts.len() as u32)
        .await?;

    let timer = state
        .scheduler()
        .schedule_at(deadline, ScheduledJob::RoundDeadline { round_id: round.id });
    store.set_round_timer(round.id, Some(timer)).await?;

    // The verification step owns firing the collaborator; it re-schedules
    // itself while prompts are not visible yet.
    state.scheduler().schedule_after(
        Duration::ZERO,
        ScheduledJob::VerifyGeneration {
            round_id: round.id,
            attempt: 1,
        },
    );

    sse_events::broadcast_phase_changed(state, room.id, round.number, RoundPhase::Generating, deadline);
    Ok(TransitionOutcome::Advanced(RoundPhase::Generating))
}

async fn begin_voting(
    state: &SharedState,
    room: &RoomEntity,
    round: &RoundEntity,
) -> Result<TransitionOutcome, ServiceError> {
    let store = state.require_store().await?;
    let tuning = state.tuning();

    // Whatever has not been generated by now is abandoned; voting proceeds
    // with the images that exist.
    let images = store.images_for_round(round.id).await?;
    let votable = images.iter().filter(|image| image.is_votable()).count();
    let length = if votable == 0 {
        // Nobody can vote on an empty gallery, so the phase is kept but its
        // window shrinks to a grace period.
        tuning.empty_voting_grace
    } else {
        phase_duration(RoundPhase::Voting, &room.settings, tuning)
    };
    let deadline = SystemTime::now() + length;

    store
        .set_round_phase(round.id, RoundPhase::Voting, deadline, None)
        .await?;
    let timer = state
        .scheduler()
        .schedule_at(deadline, ScheduledJob::RoundDeadline { round_id: round.id });
    store.set_round_timer(round.id, Some(timer)).await?;

    sse_events::broadcast_phase_changed(state, room.id, round.number, RoundPhase::Voting, deadline);
    Ok(TransitionOutcome::Advanced(RoundPhase::Voting))
}

async fn begin_results(
    state: &SharedState,
    room: &RoomEntity,
    round: &RoundEntity,
) -> Result<TransitionOutcome, ServiceError> {
    let store = state.require_store().await?;
    let tuning = state.tuning();

    let images = store.images_for_round(round.id).await?;
    let votes = store.votes_for_round(round.id).await?;
    let awards = scoring::calculate_scores(&images, &votes, tuning);
    scoring::apply_scores(&store, &awards).await?;

    let deadline = SystemTime::now() + tuning.results_phase;
    store
        .set_round_phase(round.id, RoundPhase::Results, deadline, None)
        .await?;
    let timer = state
        .scheduler()
        .schedule_at(deadline, ScheduledJob::RoundDeadline { round_id: round.id });
    store.set_round_timer(round.id, Some(timer)).await?;

    sse_events::broadcast_phase_changed(state, room.id, round.number, RoundPhase::Results, deadline);
    sse_events::broadcast_scores(state, room.id, store.players_in_room(room.id).await?);
    Ok(TransitionOutcome::Advanced(RoundPhase::Results))
}

async fn complete_round(
    state: &SharedState,
    room: &RoomEntity,
    round: &RoundEntity,
) -> Result<TransitionOutcome, ServiceError> {
    let store = state.require_store().await?;
    let now = SystemTime::now();

    store
        .set_round_phase(round.id, RoundPhase::Complete, now, None)
        .await?;
    sse_events::broadcast_phase_changed(state, room.id, round.number, RoundPhase::Complete, now);

    if round.number < room.settings.rounds_per_game {
        state.scheduler().schedule_after(
            state.tuning().next_round_delay,
            ScheduledJob::BeginNextRound { room_id: room.id },
        );
    } else {
        session_service::end_game(state, room.id).await?;
    }

    Ok(TransitionOutcome::Advanced(RoundPhase::Complete))
}
