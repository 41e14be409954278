use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::scheduler::TimerId;

/// Lifecycle status of a room, driven exclusively by the session controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Players are gathering; the game has not started yet.
    Waiting,
    /// The host pressed start; round 1 is being initialized.
    Starting,
    /// Rounds are running. Persists across every round of the game.
    Playing,
    /// The configured number of rounds has been played.
    Finished,
}

/// Per-room gameplay settings chosen at room creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSettings {
    /// Maximum number of players allowed to join.
    pub max_players: u32,
    /// Number of rounds played before the game ends.
    pub rounds_per_game: u32,
    /// Duration of the prompt and voting phases, in seconds.
    pub seconds_per_phase: u64,
    /// Whether the room is listed publicly or joinable by code only.
    pub public: bool,
}

/// One game instance with a join code and a roster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Short join code, stored lowercase. Immutable and unique.
    pub code: String,
    /// External identity of the hosting user.
    pub host_user_id: String,
    /// Current lifecycle status.
    pub status: RoomStatus,
    /// Gameplay settings fixed at creation.
    pub settings: RoomSettings,
    /// Number of the round currently in play, absent while waiting.
    pub current_round: Option<u32>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the room document was updated.
    pub updated_at: SystemTime,
}

/// Connection status of a player within a room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    /// Actively connected and required to act in timed phases.
    Connected,
    /// Dropped their connection; never required to act.
    Disconnected,
    /// Removed by the host; never required to act.
    Kicked,
}

/// Membership of one user in one room. Unique per (room, user).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Primary key of the player row.
    pub id: Uuid,
    /// Room this membership belongs to.
    pub room_id: Uuid,
    /// External identity of the user behind this player.
    pub user_id: String,
    /// Connection status, mutated by membership operations only.
    pub status: PlayerStatus,
    /// Whether this player hosts the room.
    pub is_host: bool,
    /// Accumulated score, mutated by the scoring engine only.
    pub score: i64,
    /// Join timestamp.
    pub created_at: SystemTime,
}

impl PlayerEntity {
    /// Whether this player counts as present for eligibility purposes.
    pub fn is_connected(&self) -> bool {
        self.status == PlayerStatus::Connected
    }
}

/// Phase of a round's state machine. Linear, no back-edges.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Players write their image prompts.
    Prompt,
    /// The generation collaborator turns prompts into images.
    Generating,
    /// Players vote on each other's images.
    Voting,
    /// Scores are revealed.
    Results,
    /// Terminal state; the round is over.
    Complete,
}

/// One timed prompt→generate→vote→results cycle within a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundEntity {
    /// Primary key of the round.
    pub id: Uuid,
    /// Room this round belongs to.
    pub room_id: Uuid,
    /// 1-based sequential round number, unique per room.
    pub number: u32,
    /// Question/theme the prompts answer.
    pub question_id: Uuid,
    /// Current phase.
    pub phase: RoundPhase,
    /// Wall-clock deadline of the current phase.
    pub phase_end_time: SystemTime,
    /// Handle of the pending timer-driven transition, if any.
    pub scheduled_timer: Option<TimerId>,
    /// Number of images the generation collaborator is expected to produce.
    pub images_expected: u32,
    /// Number of images (successes and error placeholders) recorded so far.
    pub images_completed: u32,
    /// Recorded generation failure, if the round was failed open.
    pub generation_error: Option<String>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// One player's prompt submission for a round. Unique per (round, player).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptEntity {
    /// Primary key of the prompt.
    pub id: Uuid,
    /// Round the prompt was submitted to.
    pub round_id: Uuid,
    /// Player who wrote it.
    pub player_id: Uuid,
    /// The prompt text, trimmed.
    pub text: String,
    /// Last submission time; re-submission updates in place.
    pub submitted_at: SystemTime,
}

/// Output of the generation collaborator for one prompt.
///
/// Failed generations still produce a record (`url: None`, `error: Some`) so
/// progress counting stays uniform; only records with a url are votable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedImageEntity {
    /// Primary key of the image record.
    pub id: Uuid,
    /// Round the image belongs to.
    pub round_id: Uuid,
    /// Prompt the image was generated from.
    pub prompt_id: Uuid,
    /// Player who owns the originating prompt.
    pub player_id: Uuid,
    /// URL of the generated image, absent on failure.
    pub url: Option<String>,
    /// Error marker recorded when generation failed.
    pub error: Option<String>,
    /// Backend-specific metadata (model name, seed) when available.
    pub metadata: Option<String>,
    /// Generation timestamp.
    pub created_at: SystemTime,
}

impl GeneratedImageEntity {
    /// Whether this record can be the target of a vote.
    pub fn is_votable(&self) -> bool {
        self.url.is_some()
    }
}

/// One player's vote for a round. Unique per (round, voter).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntity {
    /// Primary key of the vote.
    pub id: Uuid,
    /// Round the vote was cast in.
    pub round_id: Uuid,
    /// Player who cast it. A voter's own image is never a legal target.
    pub voter_id: Uuid,
    /// Image the vote targets.
    pub image_id: Uuid,
    /// Last submission time; re-voting updates in place.
    pub submitted_at: SystemTime,
}

/// A prompt theme rounds are played against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Primary key of the question.
    pub id: Uuid,
    /// The theme text shown to players.
    pub text: String,
    /// Whether the question is in the active rotation.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: SystemTime,
}
