use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::phase::VisiblePhase;

/// Dispatched payload carried across the SSE channel.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    /// Optional SSE event name.
    pub event: Option<String>,
    /// Serialized JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Build a plain-text event.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }
}

/// Broadcast when a new round begins.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundStartedEvent {
    /// Room the round belongs to.
    pub room_id: Uuid,
    /// 1-based round number.
    pub round_number: u32,
    /// RFC 3339 deadline of the prompt phase.
    pub phase_ends_at: String,
}

/// Broadcast whenever a round's phase changes.
#[derive(Debug, Serialize, ToSchema)]
pub struct PhaseChangedEvent {
    /// Room the round belongs to.
    pub room_id: Uuid,
    /// 1-based round number.
    pub round_number: u32,
    /// The phase just entered.
    pub phase: VisiblePhase,
    /// RFC 3339 deadline of the new phase.
    pub phase_ends_at: String,
}

/// Broadcast after each recorded generation outcome.
#[derive(Debug, Serialize, ToSchema)]
pub struct GenerationProgressEvent {
    /// Room the round belongs to.
    pub room_id: Uuid,
    /// Images recorded so far.
    pub completed: u32,
    /// Images the round expects.
    pub expected: u32,
}

/// Broadcast when a player submits a prompt or vote.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerActedEvent {
    /// Room the action happened in.
    pub room_id: Uuid,
    /// Acting player.
    pub player_id: Uuid,
}

/// Scoreboard line inside score events.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreEntry {
    /// Player identifier.
    pub player_id: Uuid,
    /// Accumulated score.
    pub score: i64,
}

/// Broadcast after the scoring engine ran at a voting→results boundary.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoresUpdatedEvent {
    /// Room the scores belong to.
    pub room_id: Uuid,
    /// Current standings.
    pub scores: Vec<ScoreEntry>,
}

/// Broadcast once when the game is over.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameEndedEvent {
    /// Room whose game finished.
    pub room_id: Uuid,
    /// Final standings.
    pub scores: Vec<ScoreEntry>,
}
