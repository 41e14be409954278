use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::{RoomStatus, RoundPhase};

/// Publicly visible round phase exposed to clients (REST/SSE).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisiblePhase {
    /// Players are writing prompts.
    Prompt,
    /// Images are being generated.
    Generating,
    /// Players are voting.
    Voting,
    /// Scores are being shown.
    Results,
    /// The round is over.
    Complete,
}

impl From<RoundPhase> for VisiblePhase {
    fn from(value: RoundPhase) -> Self {
        match value {
            RoundPhase::Prompt => VisiblePhase::Prompt,
            RoundPhase::Generating => VisiblePhase::Generating,
            RoundPhase::Voting => VisiblePhase::Voting,
            RoundPhase::Results => VisiblePhase::Results,
            RoundPhase::Complete => VisiblePhase::Complete,
        }
    }
}

/// Publicly visible room status.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleRoomStatus {
    /// Players are gathering.
    Waiting,
    /// Round 1 is being set up.
    Starting,
    /// Rounds are running.
    Playing,
    /// The game is over.
    Finished,
}

impl From<RoomStatus> for VisibleRoomStatus {
    fn from(value: RoomStatus) -> Self {
        match value {
            RoomStatus::Waiting => VisibleRoomStatus::Waiting,
            RoomStatus::Starting => VisibleRoomStatus::Starting,
            RoomStatus::Playing => VisibleRoomStatus::Playing,
            RoomStatus::Finished => VisibleRoomStatus::Finished,
        }
    }
}
