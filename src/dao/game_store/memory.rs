//! In-memory storage backend.
//!
//! Backs the server when no `MONGO_URI` is configured and the whole test
//! suite. Mirrors the document-store semantics of the MongoDB backend: every
//! method is atomic over a single entity, and the uniqueness invariants are
//! enforced on insert.

use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::game_store::GameStore;
use crate::dao::models::{
    GeneratedImageEntity, PlayerEntity, PlayerStatus, PromptEntity, QuestionEntity, RoomEntity,
    RoomStatus, RoundEntity, RoundPhase, VoteEntity,
};
use crate::dao::storage::{StorageError, StorageResult};
use crate::scheduler::TimerId;

/// DashMap-backed [`GameStore`] implementation.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Maps>,
}

#[derive(Default)]
struct Maps {
    rooms: DashMap<Uuid, RoomEntity>,
    room_codes: DashMap<String, Uuid>,
    players: DashMap<Uuid, PlayerEntity>,
    rounds: DashMap<Uuid, RoundEntity>,
    prompts: DashMap<Uuid, PromptEntity>,
    images: DashMap<Uuid, GeneratedImageEntity>,
    votes: DashMap<Uuid, VoteEntity>,
    questions: DashMap<Uuid, QuestionEntity>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn touch_room(&self, id: Uuid) {
        if let Some(mut room) = self.inner.rooms.get_mut(&id) {
            room.updated_at = SystemTime::now();
        }
    }
}

impl GameStore for MemoryStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let code = room.code.to_lowercase();
            if store.inner.room_codes.contains_key(&code) {
                return Err(StorageError::conflict(format!(
                    "join code `{code}` is already in use"
                )));
            }
            store.inner.room_codes.insert(code, room.id);
            store.inner.rooms.insert(room.id, room);
            Ok(())
        })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.rooms.get(&id).map(|r| r.clone())) })
    }

    fn find_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let id = store.inner.room_codes.get(&code.to_lowercase()).map(|e| *e);
            Ok(id.and_then(|id| store.inner.rooms.get(&id).map(|r| r.clone())))
        })
    }

    fn set_room_status(
        &self,
        id: Uuid,
        status: RoomStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut room) = store.inner.rooms.get_mut(&id) {
                room.status = status;
                room.updated_at = SystemTime::now();
            }
            Ok(())
        })
    }

    fn set_room_current_round(
        &self,
        id: Uuid,
        number: u32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut room) = store.inner.rooms.get_mut(&id) {
                room.current_round = Some(number);
                room.updated_at = SystemTime::now();
            }
            Ok(())
        })
    }

    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let Some((_, room)) = store.inner.rooms.remove(&id) else {
                return Ok(false);
            };
            store.inner.room_codes.remove(&room.code.to_lowercase());
            store.inner.players.retain(|_, p| p.room_id != id);
            let round_ids: Vec<Uuid> = store
                .inner
                .rounds
                .iter()
                .filter(|r| r.room_id == id)
                .map(|r| r.id)
                .collect();
            store.inner.rounds.retain(|_, r| r.room_id != id);
            store
                .inner
                .prompts
                .retain(|_, p| !round_ids.contains(&p.round_id));
            store
                .inner
                .images
                .retain(|_, i| !round_ids.contains(&i.round_id));
            store
                .inner
                .votes
                .retain(|_, v| !round_ids.contains(&v.round_id));
            Ok(true)
        })
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let duplicate = store
                .inner
                .players
                .iter()
                .any(|p| p.room_id == player.room_id && p.user_id == player.user_id);
            if duplicate {
                return Err(StorageError::conflict(format!(
                    "user `{}` already has a player in room `{}`",
                    player.user_id, player.room_id
                )));
            }
            store.touch_room(player.room_id);
            store.inner.players.insert(player.id, player);
            Ok(())
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.players.get(&id).map(|p| p.clone())) })
    }

    fn players_in_room(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut players: Vec<PlayerEntity> = store
                .inner
                .players
                .iter()
                .filter(|p| p.room_id == room_id)
                .map(|p| p.clone())
                .collect();
            players.sort_by_key(|p| p.created_at);
            Ok(players)
        })
    }

    fn set_player_status(
        &self,
        id: Uuid,
        status: PlayerStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut player) = store.inner.players.get_mut(&id) {
                player.status = status;
            }
            Ok(())
        })
    }

    fn add_player_score(&self, id: Uuid, delta: i64) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut player) = store.inner.players.get_mut(&id) {
                player.score += delta;
            }
            Ok(())
        })
    }

    fn insert_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.rounds.insert(round.id, round);
            Ok(())
        })
    }

    fn find_round(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.rounds.get(&id).map(|r| r.clone())) })
    }

    fn current_round_for_room(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .rounds
                .iter()
                .find(|r| r.room_id == room_id && r.phase != RoundPhase::Complete)
                .map(|r| r.clone()))
        })
    }

    fn rounds_for_room(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut rounds: Vec<RoundEntity> = store
                .inner
                .rounds
                .iter()
                .filter(|r| r.room_id == room_id)
                .map(|r| r.clone())
                .collect();
            rounds.sort_by_key(|r| r.number);
            Ok(rounds)
        })
    }

    fn set_round_phase(
        &self,
        id: Uuid,
        phase: RoundPhase,
        phase_end_time: SystemTime,
        timer: Option<TimerId>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut round) = store.inner.rounds.get_mut(&id) {
                round.phase = phase;
                round.phase_end_time = phase_end_time;
                round.scheduled_timer = timer;
            }
            Ok(())
        })
    }

    fn set_round_timer(
        &self,
        id: Uuid,
        timer: Option<TimerId>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut round) = store.inner.rounds.get_mut(&id) {
                round.scheduled_timer = timer;
            }
            Ok(())
        })
    }

    fn take_round_timer(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TimerId>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .inner
                .rounds
                .get_mut(&id)
                .and_then(|mut round| round.scheduled_timer.take()))
        })
    }

    fn set_images_expected(
        &self,
        id: Uuid,
        expected: u32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut round) = store.inner.rounds.get_mut(&id) {
                round.images_expected = expected;
            }
            Ok(())
        })
    }

    fn increment_images_completed(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store.inner.rounds.get_mut(&id).map(|mut round| {
                round.images_completed += 1;
                round.clone()
            }))
        })
    }

    fn set_generation_error(
        &self,
        id: Uuid,
        error: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            if let Some(mut round) = store.inner.rounds.get_mut(&id) {
                round.generation_error = Some(error);
            }
            Ok(())
        })
    }

    fn upsert_prompt(&self, prompt: PromptEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let existing = store
                .inner
                .prompts
                .iter()
                .find(|p| p.round_id == prompt.round_id && p.player_id == prompt.player_id)
                .map(|p| p.id);
            match existing {
                Some(id) => {
                    if let Some(mut slot) = store.inner.prompts.get_mut(&id) {
                        slot.text = prompt.text;
                        slot.submitted_at = prompt.submitted_at;
                    }
                }
                None => {
                    store.inner.prompts.insert(prompt.id, prompt);
                }
            }
            Ok(())
        })
    }

    fn prompts_for_round(
        &self,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PromptEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut prompts: Vec<PromptEntity> = store
                .inner
                .prompts
                .iter()
                .filter(|p| p.round_id == round_id)
                .map(|p| p.clone())
                .collect();
            prompts.sort_by_key(|p| p.submitted_at);
            Ok(prompts)
        })
    }

    fn insert_image(&self, image: GeneratedImageEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.images.insert(image.id, image);
            Ok(())
        })
    }

    fn find_image(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GeneratedImageEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.images.get(&id).map(|i| i.clone())) })
    }

    fn images_for_round(
        &self,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GeneratedImageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut images: Vec<GeneratedImageEntity> = store
                .inner
                .images
                .iter()
                .filter(|i| i.round_id == round_id)
                .map(|i| i.clone())
                .collect();
            images.sort_by_key(|i| i.created_at);
            Ok(images)
        })
    }

    fn upsert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let existing = store
                .inner
                .votes
                .iter()
                .find(|v| v.round_id == vote.round_id && v.voter_id == vote.voter_id)
                .map(|v| v.id);
            match existing {
                Some(id) => {
                    if let Some(mut slot) = store.inner.votes.get_mut(&id) {
                        slot.image_id = vote.image_id;
                        slot.submitted_at = vote.submitted_at;
                    }
                }
                None => {
                    store.inner.votes.insert(vote.id, vote);
                }
            }
            Ok(())
        })
    }

    fn votes_for_round(
        &self,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut votes: Vec<VoteEntity> = store
                .inner
                .votes
                .iter()
                .filter(|v| v.round_id == round_id)
                .map(|v| v.clone())
                .collect();
            votes.sort_by_key(|v| v.submitted_at);
            Ok(votes)
        })
    }

    fn insert_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.questions.insert(question.id, question);
            Ok(())
        })
    }

    fn find_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.questions.get(&id).map(|q| q.clone())) })
    }

    fn active_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut questions: Vec<QuestionEntity> = store
                .inner
                .questions
                .iter()
                .filter(|q| q.active)
                .map(|q| q.clone())
                .collect();
            questions.sort_by_key(|q| q.created_at);
            Ok(questions)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{RoomSettings, RoundEntity};

    fn room(code: &str) -> RoomEntity {
        let now = SystemTime::now();
        RoomEntity {
            id: Uuid::new_v4(),
            code: code.into(),
            host_user_id: "host".into(),
            status: RoomStatus::Waiting,
            settings: RoomSettings {
                max_players: 8,
                rounds_per_game: 3,
                seconds_per_phase: 60,
                public: false,
            },
            current_round: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn player(room_id: Uuid, user: &str) -> PlayerEntity {
        PlayerEntity {
            id: Uuid::new_v4(),
            room_id,
            user_id: user.into(),
            status: PlayerStatus::Connected,
            is_host: false,
            score: 0,
            created_at: SystemTime::now(),
        }
    }

    fn round(room_id: Uuid, number: u32) -> RoundEntity {
        RoundEntity {
            id: Uuid::new_v4(),
            room_id,
            number,
            question_id: Uuid::new_v4(),
            phase: RoundPhase::Prompt,
            phase_end_time: SystemTime::now(),
            scheduled_timer: None,
            images_expected: 0,
            images_completed: 0,
            generation_error: None,
            created_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn join_codes_are_unique_and_case_insensitive() {
        let store = MemoryStore::new();
        let first = room("ABCDE");
        store.insert_room(first.clone()).await.unwrap();

        let err = store.insert_room(room("abcde")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));

        let found = store.find_room_by_code("AbCdE".into()).await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(first.id));
    }

    #[tokio::test]
    async fn one_player_row_per_room_and_user() {
        let store = MemoryStore::new();
        let room = room("fghij");
        store.insert_room(room.clone()).await.unwrap();

        store.insert_player(player(room.id, "ada")).await.unwrap();
        let err = store
            .insert_player(player(room.id, "ada"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));

        // The same user may sit in a different room.
        let other = self::room("klmno");
        store.insert_room(other.clone()).await.unwrap();
        store.insert_player(player(other.id, "ada")).await.unwrap();
    }

    #[tokio::test]
    async fn take_round_timer_yields_the_handle_exactly_once() {
        let store = MemoryStore::new();
        let room = room("pqrst");
        store.insert_room(room.clone()).await.unwrap();
        let round = round(room.id, 1);
        store.insert_round(round.clone()).await.unwrap();

        let timer = Uuid::new_v4();
        store.set_round_timer(round.id, Some(timer)).await.unwrap();

        assert_eq!(store.take_round_timer(round.id).await.unwrap(), Some(timer));
        assert_eq!(store.take_round_timer(round.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn deleting_a_room_tears_down_everything_it_owns() {
        let store = MemoryStore::new();
        let room = room("uvwxy");
        store.insert_room(room.clone()).await.unwrap();
        let player = player(room.id, "grace");
        store.insert_player(player.clone()).await.unwrap();
        let round = round(room.id, 1);
        store.insert_round(round.clone()).await.unwrap();
        store
            .upsert_prompt(PromptEntity {
                id: Uuid::new_v4(),
                round_id: round.id,
                player_id: player.id,
                text: "soon to be gone".into(),
                submitted_at: SystemTime::now(),
            })
            .await
            .unwrap();

        assert!(store.delete_room(room.id).await.unwrap());

        assert!(store.find_room(room.id).await.unwrap().is_none());
        assert!(store.find_player(player.id).await.unwrap().is_none());
        assert!(store.find_round(round.id).await.unwrap().is_none());
        assert!(store.prompts_for_round(round.id).await.unwrap().is_empty());
        assert!(
            store
                .find_room_by_code(room.code.clone())
                .await
                .unwrap()
                .is_none()
        );

        // The code is free for reuse once the room is gone.
        store.insert_room(self::room(&room.code)).await.unwrap();
    }
}
