//! Read-model projections. Derived from authoritative state on every query,
//! never stored.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::phase::{VisiblePhase, VisibleRoomStatus};

/// Snapshot of a room for polling clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomView {
    /// Room identifier.
    pub room_id: Uuid,
    /// Join code.
    pub code: String,
    /// Current room status.
    pub status: VisibleRoomStatus,
    /// Roster with per-phase action flags.
    pub players: Vec<PlayerView>,
    /// The round in play, when one exists.
    pub round: Option<RoundView>,
}

/// One roster entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerView {
    /// Player identifier.
    pub id: Uuid,
    /// External identity reference.
    pub user_id: String,
    /// Accumulated score.
    pub score: i64,
    /// Whether the player is currently connected.
    pub connected: bool,
    /// Whether the player hosts the room.
    pub is_host: bool,
    /// Whether the player submitted a prompt this round.
    pub has_submitted: bool,
    /// Whether the player voted this round.
    pub has_voted: bool,
}

/// The active round as shown to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundView {
    /// 1-based round number.
    pub number: u32,
    /// Current phase.
    pub phase: VisiblePhase,
    /// RFC 3339 deadline of the current phase.
    pub phase_ends_at: String,
    /// The theme prompts answer this round.
    pub question: String,
    /// Completed / expected generation counters.
    pub generation: GenerationProgressView,
    /// Recorded generation failure, if the round was failed open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_error: Option<String>,
    /// Gallery, present only during voting and results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageView>>,
}

/// Image-generation progress counters.
#[derive(Debug, Serialize, ToSchema)]
pub struct GenerationProgressView {
    /// Images recorded so far (successes and failures).
    pub completed: u32,
    /// Images the round expects.
    pub expected: u32,
}

/// One gallery entry, present only while the list itself is (voting and
/// results).
#[derive(Debug, Serialize, ToSchema)]
pub struct ImageView {
    /// Image identifier, the legal vote target.
    pub id: Uuid,
    /// Where the rendered image can be fetched.
    pub url: String,
    /// Owning player.
    pub player_id: Uuid,
    /// Current vote count. Derived, never authoritative.
    pub votes: u32,
    /// Whether this image is (currently) tied for the most votes.
    pub winner: bool,
}
