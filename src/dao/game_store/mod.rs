//! Persistence abstraction for rooms, rounds, and their per-round entities.

pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    GeneratedImageEntity, PlayerEntity, PlayerStatus, PromptEntity, QuestionEntity, RoomEntity,
    RoomStatus, RoundEntity, RoundPhase, VoteEntity,
};
use crate::dao::storage::StorageResult;
use crate::scheduler::TimerId;

/// Abstraction over the persistence layer.
///
/// Every method is a single-entity operation the backend must apply
/// atomically; the engine's idempotence protocol leans on `take_round_timer`
/// and `increment_images_completed` being read-modify-write primitives.
pub trait GameStore: Send + Sync {
    // -- rooms ------------------------------------------------------------

    /// Insert a new room. Fails with a conflict when the join code is taken.
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a room by id.
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Resolve a human-entered join code (case-insensitive) to a room.
    fn find_room_by_code(&self, code: String)
    -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Patch the room's lifecycle status.
    fn set_room_status(&self, id: Uuid, status: RoomStatus)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Patch the room's current-round pointer.
    fn set_room_current_round(&self, id: Uuid, number: u32)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Tear down a room and every entity belonging to it.
    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    // -- players ----------------------------------------------------------

    /// Insert a player row. Fails with a conflict when (room, user) exists.
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a player by id.
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// All players of a room, in join order.
    fn players_in_room(&self, room_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Patch a player's connection status. Used by membership operations;
    /// the engine only reads it.
    fn set_player_status(
        &self,
        id: Uuid,
        status: PlayerStatus,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Add points to a player's score. Scoring engine only.
    fn add_player_score(&self, id: Uuid, delta: i64) -> BoxFuture<'static, StorageResult<()>>;

    // -- rounds -----------------------------------------------------------

    /// Insert a freshly started round.
    fn insert_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a round by id.
    fn find_round(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>>;
    /// The room's round with phase != complete, if any.
    fn current_round_for_room(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>>;
    /// All rounds of a room, ordered by round number.
    fn rounds_for_room(&self, room_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>>;
    /// Move a round to a new phase with its deadline and (optional) timer.
    fn set_round_phase(
        &self,
        id: Uuid,
        phase: RoundPhase,
        phase_end_time: SystemTime,
        timer: Option<TimerId>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Store a new pending-timer handle on the round.
    fn set_round_timer(
        &self,
        id: Uuid,
        timer: Option<TimerId>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Atomically clear and return the round's stored timer handle.
    ///
    /// Returning `None` means another caller already claimed it (or none was
    /// pending), making the cancel that follows a harmless no-op.
    fn take_round_timer(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TimerId>>>;
    /// Patch the number of images the round expects.
    fn set_images_expected(&self, id: Uuid, expected: u32)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Atomically bump the completed-image counter, returning the updated round.
    fn increment_images_completed(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>>;
    /// Record a generation failure on the round.
    fn set_generation_error(&self, id: Uuid, error: String)
    -> BoxFuture<'static, StorageResult<()>>;

    // -- prompts ----------------------------------------------------------

    /// Insert or update the (round, player) prompt in place.
    fn upsert_prompt(&self, prompt: PromptEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// All prompts submitted to a round.
    fn prompts_for_round(
        &self,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PromptEntity>>>;

    // -- generated images -------------------------------------------------

    /// Insert one generation outcome (success or error placeholder).
    fn insert_image(&self, image: GeneratedImageEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch an image by id.
    fn find_image(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<GeneratedImageEntity>>>;
    /// All image records of a round, in creation order.
    fn images_for_round(
        &self,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GeneratedImageEntity>>>;

    // -- votes ------------------------------------------------------------

    /// Insert or update the (round, voter) vote in place.
    fn upsert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// All votes cast in a round.
    fn votes_for_round(&self, round_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>>;

    // -- questions --------------------------------------------------------

    /// Insert a question into the pool.
    fn insert_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a question by id.
    fn find_question(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;
    /// Every question currently in the active rotation.
    fn active_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;

    // -- health -----------------------------------------------------------

    /// Cheap liveness probe against the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a dropped backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
