//! Typed broadcast helpers for the SSE stream. Events carry the room id so
//! clients subscribed to the shared stream can filter.

use std::time::SystemTime;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::models::{PlayerEntity, RoundEntity, RoundPhase},
    dto::{
        format_system_time,
        sse::{
            GameEndedEvent, GenerationProgressEvent, PhaseChangedEvent, PlayerActedEvent,
            RoundStartedEvent, ScoreEntry, ScoresUpdatedEvent, ServerEvent,
        },
    },
    state::SharedState,
};

const EVENT_ROUND_STARTED: &str = "round.started";
const EVENT_PHASE_CHANGED: &str = "round.phase_changed";
const EVENT_GENERATION_PROGRESS: &str = "generation.progress";
const EVENT_PROMPT_SUBMITTED: &str = "prompt.submitted";
const EVENT_VOTE_SUBMITTED: &str = "vote.submitted";
const EVENT_SCORES_UPDATED: &str = "scores.updated";
const EVENT_GAME_ENDED: &str = "game.ended";

/// Broadcast that a new round has begun.
pub fn broadcast_round_started(state: &SharedState, room_id: Uuid, round: &RoundEntity) {
    let payload = RoundStartedEvent {
        room_id,
        round_number: round.number,
        phase_ends_at: format_system_time(round.phase_end_time),
    };
    send_event(state, EVENT_ROUND_STARTED, &payload);
}

/// Broadcast a phase change with the new deadline.
pub fn broadcast_phase_changed(
    state: &SharedState,
    room_id: Uuid,
    round_number: u32,
    phase: RoundPhase,
    phase_ends_at: SystemTime,
) {
    let payload = PhaseChangedEvent {
        room_id,
        round_number,
        phase: phase.into(),
        phase_ends_at: format_system_time(phase_ends_at),
    };
    send_event(state, EVENT_PHASE_CHANGED, &payload);
}

/// Broadcast generation progress counters.
pub fn broadcast_generation_progress(
    state: &SharedState,
    room_id: Uuid,
    completed: u32,
    expected: u32,
) {
    let payload = GenerationProgressEvent {
        room_id,
        completed,
        expected,
    };
    send_event(state, EVENT_GENERATION_PROGRESS, &payload);
}

/// Broadcast that a player submitted their prompt.
pub fn broadcast_prompt_submitted(state: &SharedState, room_id: Uuid, player_id: Uuid) {
    let payload = PlayerActedEvent { room_id, player_id };
    send_event(state, EVENT_PROMPT_SUBMITTED, &payload);
}

/// Broadcast that a player cast their vote.
pub fn broadcast_vote_submitted(state: &SharedState, room_id: Uuid, player_id: Uuid) {
    let payload = PlayerActedEvent { room_id, player_id };
    send_event(state, EVENT_VOTE_SUBMITTED, &payload);
}

/// Broadcast the standings after a scoring pass.
pub fn broadcast_scores(state: &SharedState, room_id: Uuid, players: Vec<PlayerEntity>) {
    let payload = ScoresUpdatedEvent {
        room_id,
        scores: score_entries(players),
    };
    send_event(state, EVENT_SCORES_UPDATED, &payload);
}

/// Broadcast the final standings when the game ends.
pub fn broadcast_game_ended(state: &SharedState, room_id: Uuid, players: Vec<PlayerEntity>) {
    let payload = GameEndedEvent {
        room_id,
        scores: score_entries(players),
    };
    send_event(state, EVENT_GAME_ENDED, &payload);
}

fn score_entries(players: Vec<PlayerEntity>) -> Vec<ScoreEntry> {
    players
        .into_iter()
        .map(|player| ScoreEntry {
            player_id: player.id,
            score: player.score,
        })
        .collect()
}

fn send_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize SSE payload"),
    }
}
