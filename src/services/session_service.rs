//! Top-level game orchestration: start, per-round bootstrap, and end.

use std::time::{Duration, SystemTime};

use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::game_store::GameStore,
    dao::models::{QuestionEntity, RoomStatus},
    engine::lifecycle,
    error::ServiceError,
    scheduler::ScheduledJob,
    services::sse_events,
    state::SharedState,
};

const MIN_PLAYERS_TO_START: usize = 2;

/// Built-in prompt themes seeded when the question pool is empty.
const DEFAULT_QUESTIONS: &[&str] = &[
    "a creature that should not exist",
    "the worst possible theme park ride",
    "breakfast in the year 3000",
    "a villain's day off",
    "the last photo ever taken",
    "an animal running for office",
    "what lives under the city",
    "a sport invented by cats",
    "the museum exhibit nobody visits",
    "a wizard doing their taxes",
    "the secret life of houseplants",
    "an alien's first trip to the supermarket",
];

/// Start the game on behalf of the acting player.
///
/// The caller must be the host of a waiting room with at least two connected
/// players. The room flips to `starting` synchronously; round 1 is
/// initialized asynchronously through the scheduler.
pub async fn start_game(
    state: &SharedState,
    room_id: Uuid,
    acting_player_id: Uuid,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;

    let Some(room) = store.find_room(room_id).await? else {
        return Err(ServiceError::NotFound(format!("room `{room_id}` not found")));
    };

    let Some(player) = store.find_player(acting_player_id).await? else {
        return Err(ServiceError::Unauthorized("unknown player".into()));
    };
    if player.room_id != room_id {
        return Err(ServiceError::Unauthorized(
            "player is not a member of this room".into(),
        ));
    }
    if !player.is_host {
        return Err(ServiceError::Unauthorized(
            "only the host can start the game".into(),
        ));
    }

    if room.status != RoomStatus::Waiting {
        return Err(ServiceError::InvalidState(format!(
            "game can only be started from a waiting room, current status {:?}",
            room.status
        )));
    }

    let connected = store
        .players_in_room(room_id)
        .await?
        .iter()
        .filter(|p| p.is_connected())
        .count();
    if connected < MIN_PLAYERS_TO_START {
        return Err(ServiceError::InvalidState(format!(
            "at least {MIN_PLAYERS_TO_START} connected players are required, got {connected}"
        )));
    }

    store.set_room_status(room_id, RoomStatus::Starting).await?;
    state
        .scheduler()
        .schedule_after(Duration::ZERO, ScheduledJob::InitializeGame { room_id });

    info!(%room_id, host = %acting_player_id, "game starting");
    Ok(())
}

/// Bootstrap round 1 for a room the host just started.
pub async fn initialize_game(state: &SharedState, room_id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_store().await?;

    let Some(room) = store.find_room(room_id).await? else {
        debug!(%room_id, "room vanished before initialization");
        return Ok(());
    };
    if room.status != RoomStatus::Starting {
        debug!(%room_id, status = ?room.status, "stale initialization job ignored");
        return Ok(());
    }

    let question = pick_question(state, room_id, false).await?;
    lifecycle::start_round(state, &room, 1, question.id).await?;
    store.set_room_current_round(room_id, 1).await?;
    store.set_room_status(room_id, RoomStatus::Playing).await?;

    Ok(())
}

/// Start the round after the one that just completed.
pub async fn start_next_round(state: &SharedState, room_id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_store().await?;

    let Some(room) = store.find_room(room_id).await? else {
        debug!(%room_id, "room vanished before its next round");
        return Ok(());
    };
    if room.status != RoomStatus::Playing {
        debug!(%room_id, status = ?room.status, "stale next-round job ignored");
        return Ok(());
    }
    if store.current_round_for_room(room_id).await?.is_some() {
        debug!(%room_id, "a round is still running; next-round job ignored");
        return Ok(());
    }

    let next_number = room.current_round.unwrap_or(0) + 1;
    let question = pick_question(state, room_id, true).await?;
    lifecycle::start_round(state, &room, next_number, question.id).await?;
    store.set_room_current_round(room_id, next_number).await?;

    Ok(())
}

/// Flip the room to finished and announce the final standings.
pub async fn end_game(state: &SharedState, room_id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_store().await?;

    store.set_room_status(room_id, RoomStatus::Finished).await?;
    let players = store.players_in_room(room_id).await?;
    sse_events::broadcast_game_ended(state, room_id, players);

    info!(%room_id, "game finished");
    Ok(())
}

/// Pick an active question, preferring one not yet used in this game, lazily
/// seeding the built-in pool as a last resort.
async fn pick_question(
    state: &SharedState,
    room_id: Uuid,
    avoid_used: bool,
) -> Result<QuestionEntity, ServiceError> {
    let store = state.require_store().await?;

    let mut actives = store.active_questions().await?;
    if actives.is_empty() {
        warn!("question pool is empty; seeding built-in themes");
        seed_default_questions(state).await?;
        actives = store.active_questions().await?;
    }
    if actives.is_empty() {
        return Err(ServiceError::InvalidState(
            "question pool is empty even after seeding".into(),
        ));
    }

    if avoid_used {
        let used: Vec<Uuid> = store
            .rounds_for_room(room_id)
            .await?
            .iter()
            .map(|round| round.question_id)
            .collect();
        let unused: Vec<QuestionEntity> = actives
            .iter()
            .filter(|question| !used.contains(&question.id))
            .cloned()
            .collect();
        if let Some(question) = unused.choose(&mut rand::rng()) {
            return Ok(question.clone());
        }
    }

    actives
        .choose(&mut rand::rng())
        .cloned()
        .ok_or_else(|| ServiceError::InvalidState("question pool is empty".into()))
}

async fn seed_default_questions(state: &SharedState) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    for text in DEFAULT_QUESTIONS {
        store
            .insert_question(QuestionEntity {
                id: Uuid::new_v4(),
                text: (*text).to_owned(),
                active: true,
                created_at: SystemTime::now(),
            })
            .await?;
    }
    Ok(())
}
