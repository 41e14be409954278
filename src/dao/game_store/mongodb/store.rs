use std::sync::Arc;
use std::time::SystemTime;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Binary, DateTime, doc},
    error::{ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        ImageDocument, PlayerDocument, PromptDocument, QuestionDocument, RoomDocument,
        RoundDocument, VoteDocument, doc_id, uuid_as_binary,
    },
};
use crate::dao::{
    game_store::GameStore,
    models::{
        GeneratedImageEntity, PlayerEntity, PlayerStatus, PromptEntity, QuestionEntity,
        RoomEntity, RoomStatus, RoundEntity, RoundPhase, VoteEntity,
    },
    storage::StorageResult,
};
use crate::scheduler::TimerId;

const ROOMS: &str = "rooms";
const PLAYERS: &str = "players";
const ROUNDS: &str = "rounds";
const PROMPTS: &str = "prompts";
const IMAGES: &str = "images";
const VOTES: &str = "votes";
const QUESTIONS: &str = "questions";

/// MongoDB-backed [`GameStore`] implementation.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

/// The serde snake_case tag used for a phase inside update documents.
fn phase_str(phase: RoundPhase) -> &'static str {
    match phase {
        RoundPhase::Prompt => "prompt",
        RoundPhase::Generating => "generating",
        RoundPhase::Voting => "voting",
        RoundPhase::Results => "results",
        RoundPhase::Complete => "complete",
    }
}

fn status_str(status: PlayerStatus) -> &'static str {
    match status {
        PlayerStatus::Connected => "connected",
        PlayerStatus::Disconnected => "disconnected",
        PlayerStatus::Kicked => "kicked",
    }
}

fn room_status_str(status: RoomStatus) -> &'static str {
    match status {
        RoomStatus::Waiting => "waiting",
        RoomStatus::Starting => "starting",
        RoomStatus::Playing => "playing",
        RoomStatus::Finished => "finished",
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        &*err.kind,
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11_000
    )
}

fn timer_bson(timer: Option<TimerId>) -> mongodb::bson::Bson {
    match timer {
        Some(id) => uuid_as_binary(id).into(),
        None => mongodb::bson::Bson::Null,
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let build = |keys, name: &'static str, unique| {
            mongodb::IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(name.to_owned()))
                        .unique(Some(unique))
                        .build(),
                )
                .build()
        };

        let plans: [(&'static str, &'static str, mongodb::IndexModel); 7] = [
            (ROOMS, "code", build(doc! {"code": 1}, "room_code_idx", true)),
            (
                PLAYERS,
                "room_id,user_id",
                build(
                    doc! {"room_id": 1, "user_id": 1},
                    "player_room_user_idx",
                    true,
                ),
            ),
            (
                ROUNDS,
                "room_id,number",
                build(doc! {"room_id": 1, "number": 1}, "round_room_idx", true),
            ),
            (
                PROMPTS,
                "round_id,player_id",
                build(
                    doc! {"round_id": 1, "player_id": 1},
                    "prompt_round_player_idx",
                    true,
                ),
            ),
            (
                IMAGES,
                "round_id",
                build(doc! {"round_id": 1}, "image_round_idx", false),
            ),
            (
                VOTES,
                "round_id,voter_id",
                build(
                    doc! {"round_id": 1, "voter_id": 1},
                    "vote_round_voter_idx",
                    true,
                ),
            ),
            (
                QUESTIONS,
                "active",
                build(doc! {"active": 1}, "question_active_idx", false),
            ),
        ];

        for (collection, index, model) in plans {
            database
                .collection::<mongodb::bson::Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn rooms(&self) -> Collection<RoomDocument> {
        self.database().await.collection(ROOMS)
    }

    async fn players(&self) -> Collection<PlayerDocument> {
        self.database().await.collection(PLAYERS)
    }

    async fn rounds(&self) -> Collection<RoundDocument> {
        self.database().await.collection(ROUNDS)
    }

    async fn prompts(&self) -> Collection<PromptDocument> {
        self.database().await.collection(PROMPTS)
    }

    async fn images(&self) -> Collection<ImageDocument> {
        self.database().await.collection(IMAGES)
    }

    async fn votes(&self) -> Collection<VoteDocument> {
        self.database().await.collection(VOTES)
    }

    async fn questions(&self) -> Collection<QuestionDocument> {
        self.database().await.collection(QUESTIONS)
    }

    async fn round_ids_for_room(&self, room_id: Uuid) -> MongoResult<Vec<Binary>> {
        let rounds: Vec<RoundDocument> = self
            .rounds()
            .await
            .find(doc! {"room_id": uuid_as_binary(room_id)})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: ROUNDS,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: ROUNDS,
                source,
            })?;
        Ok(rounds
            .into_iter()
            .map(|round| uuid_as_binary(RoundEntity::from(round).id))
            .collect())
    }
}

macro_rules! read_err {
    ($collection:expr) => {
        |source| MongoDaoError::Read {
            collection: $collection,
            source,
        }
    };
}

macro_rules! write_err {
    ($collection:expr) => {
        |source| MongoDaoError::Write {
            collection: $collection,
            source,
        }
    };
}

impl GameStore for MongoGameStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document: RoomDocument = room.into();
            store
                .rooms()
                .await
                .insert_one(&document)
                .await
                .map_err(|source| {
                    if is_duplicate_key(&source) {
                        MongoDaoError::Duplicate { collection: ROOMS }
                    } else {
                        MongoDaoError::Write {
                            collection: ROOMS,
                            source,
                        }
                    }
                })?;
            Ok(())
        })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .rooms()
                .await
                .find_one(doc_id(id))
                .await
                .map_err(read_err!(ROOMS))?;
            Ok(document.map(Into::into))
        })
    }

    fn find_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .rooms()
                .await
                .find_one(doc! {"code": code.to_lowercase()})
                .await
                .map_err(read_err!(ROOMS))?;
            Ok(document.map(Into::into))
        })
    }

    fn set_room_status(
        &self,
        id: Uuid,
        status: RoomStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .rooms()
                .await
                .update_one(
                    doc_id(id),
                    doc! {"$set": {
                        "status": room_status_str(status),
                        "updated_at": DateTime::from_system_time(SystemTime::now()),
                    }},
                )
                .await
                .map_err(write_err!(ROOMS))?;
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
            store
                .rooms()
                .await
                .update_one(
                    doc_id(id),
                    doc! {"$set": {
                        "current_round": number,
                        "updated_at": DateTime::from_system_time(SystemTime::now()),
                    }},
                )
                .await
                .map_err(write_err!(ROOMS))?;
            Ok(())
        })
    }

    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let round_ids = store.round_ids_for_room(id).await?;
            let by_round = doc! {"round_id": {"$in": round_ids.clone()}};

            store
                .prompts()
                .await
                .delete_many(by_round.clone())
                .await
                .map_err(write_err!(PROMPTS))?;
            store
                .images()
                .await
                .delete_many(by_round.clone())
                .await
                .map_err(write_err!(IMAGES))?;
            store
                .votes()
                .await
                .delete_many(by_round)
                .await
                .map_err(write_err!(VOTES))?;
            store
                .rounds()
                .await
                .delete_many(doc! {"room_id": uuid_as_binary(id)})
                .await
                .map_err(write_err!(ROUNDS))?;
            store
                .players()
                .await
                .delete_many(doc! {"room_id": uuid_as_binary(id)})
                .await
                .map_err(write_err!(PLAYERS))?;

            let result = store
                .rooms()
                .await
                .delete_one(doc_id(id))
                .await
                .map_err(write_err!(ROOMS))?;
            Ok(result.deleted_count > 0)
        })
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document: PlayerDocument = player.into();
            store
                .players()
                .await
                .insert_one(&document)
                .await
                .map_err(|source| {
                    if is_duplicate_key(&source) {
                        MongoDaoError::Duplicate {
                            collection: PLAYERS,
                        }
                    } else {
                        MongoDaoError::Write {
                            collection: PLAYERS,
                            source,
                        }
                    }
                })?;
            Ok(())
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .players()
                .await
                .find_one(doc_id(id))
                .await
                .map_err(read_err!(PLAYERS))?;
            Ok(document.map(Into::into))
        })
    }

    fn players_in_room(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents: Vec<PlayerDocument> = store
                .players()
                .await
                .find(doc! {"room_id": uuid_as_binary(room_id)})
                .sort(doc! {"created_at": 1})
                .await
                .map_err(read_err!(PLAYERS))?
                .try_collect()
                .await
                .map_err(read_err!(PLAYERS))?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn set_player_status(
        &self,
        id: Uuid,
        status: PlayerStatus,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .players()
                .await
                .update_one(doc_id(id), doc! {"$set": {"status": status_str(status)}})
                .await
                .map_err(write_err!(PLAYERS))?;
            Ok(())
        })
    }

    fn add_player_score(&self, id: Uuid, delta: i64) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .players()
                .await
                .update_one(doc_id(id), doc! {"$inc": {"score": delta}})
                .await
                .map_err(write_err!(PLAYERS))?;
            Ok(())
        })
    }

    fn insert_round(&self, round: RoundEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document: RoundDocument = round.into();
            store
                .rounds()
                .await
                .insert_one(&document)
                .await
                .map_err(write_err!(ROUNDS))?;
            Ok(())
        })
    }

    fn find_round(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .rounds()
                .await
                .find_one(doc_id(id))
                .await
                .map_err(read_err!(ROUNDS))?;
            Ok(document.map(Into::into))
        })
    }

    fn current_round_for_room(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .rounds()
                .await
                .find_one(doc! {
                    "room_id": uuid_as_binary(room_id),
                    "phase": {"$ne": phase_str(RoundPhase::Complete)},
                })
                .await
                .map_err(read_err!(ROUNDS))?;
            Ok(document.map(Into::into))
        })
    }

    fn rounds_for_room(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents: Vec<RoundDocument> = store
                .rounds()
                .await
                .find(doc! {"room_id": uuid_as_binary(room_id)})
                .sort(doc! {"number": 1})
                .await
                .map_err(read_err!(ROUNDS))?
                .try_collect()
                .await
                .map_err(read_err!(ROUNDS))?;
            Ok(documents.into_iter().map(Into::into).collect())
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
            store
                .rounds()
                .await
                .update_one(
                    doc_id(id),
                    doc! {"$set": {
                        "phase": phase_str(phase),
                        "phase_end_time": DateTime::from_system_time(phase_end_time),
                        "scheduled_timer": timer_bson(timer),
                    }},
                )
                .await
                .map_err(write_err!(ROUNDS))?;
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
            store
                .rounds()
                .await
                .update_one(doc_id(id), doc! {"$set": {"scheduled_timer": timer_bson(timer)}})
                .await
                .map_err(write_err!(ROUNDS))?;
            Ok(())
        })
    }

    fn take_round_timer(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TimerId>>> {
        let store = self.clone();
        Box::pin(async move {
            // find_one_and_update returns the pre-image, so exactly one caller
            // observes the stored handle.
            let previous = store
                .rounds()
                .await
                .find_one_and_update(
                    doc_id(id),
                    doc! {"$set": {"scheduled_timer": mongodb::bson::Bson::Null}},
                )
                .return_document(ReturnDocument::Before)
                .await
                .map_err(write_err!(ROUNDS))?;
            Ok(previous.and_then(|document| RoundEntity::from(document).scheduled_timer))
        })
    }

    fn set_images_expected(
        &self,
        id: Uuid,
        expected: u32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .rounds()
                .await
                .update_one(doc_id(id), doc! {"$set": {"images_expected": expected}})
                .await
                .map_err(write_err!(ROUNDS))?;
            Ok(())
        })
    }

    fn increment_images_completed(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let updated = store
                .rounds()
                .await
                .find_one_and_update(doc_id(id), doc! {"$inc": {"images_completed": 1}})
                .return_document(ReturnDocument::After)
                .await
                .map_err(write_err!(ROUNDS))?;
            Ok(updated.map(Into::into))
        })
    }

    fn set_generation_error(
        &self,
        id: Uuid,
        error: String,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .rounds()
                .await
                .update_one(doc_id(id), doc! {"$set": {"generation_error": error}})
                .await
                .map_err(write_err!(ROUNDS))?;
            Ok(())
        })
    }

    fn upsert_prompt(&self, prompt: PromptEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let filter = doc! {
                "round_id": uuid_as_binary(prompt.round_id),
                "player_id": uuid_as_binary(prompt.player_id),
            };
            let document: PromptDocument = prompt.into();
            store
                .prompts()
                .await
                .replace_one(filter, &document)
                .upsert(true)
                .await
                .map_err(write_err!(PROMPTS))?;
            Ok(())
        })
    }

    fn prompts_for_round(
        &self,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PromptEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents: Vec<PromptDocument> = store
                .prompts()
                .await
                .find(doc! {"round_id": uuid_as_binary(round_id)})
                .sort(doc! {"submitted_at": 1})
                .await
                .map_err(read_err!(PROMPTS))?
                .try_collect()
                .await
                .map_err(read_err!(PROMPTS))?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn insert_image(&self, image: GeneratedImageEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document: ImageDocument = image.into();
            store
                .images()
                .await
                .insert_one(&document)
                .await
                .map_err(write_err!(IMAGES))?;
            Ok(())
        })
    }

    fn find_image(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<GeneratedImageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .images()
                .await
                .find_one(doc_id(id))
                .await
                .map_err(read_err!(IMAGES))?;
            Ok(document.map(Into::into))
        })
    }

    fn images_for_round(
        &self,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GeneratedImageEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents: Vec<ImageDocument> = store
                .images()
                .await
                .find(doc! {"round_id": uuid_as_binary(round_id)})
                .sort(doc! {"created_at": 1})
                .await
                .map_err(read_err!(IMAGES))?
                .try_collect()
                .await
                .map_err(read_err!(IMAGES))?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn upsert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let filter = doc! {
                "round_id": uuid_as_binary(vote.round_id),
                "voter_id": uuid_as_binary(vote.voter_id),
            };
            let document: VoteDocument = vote.into();
            store
                .votes()
                .await
                .replace_one(filter, &document)
                .upsert(true)
                .await
                .map_err(write_err!(VOTES))?;
            Ok(())
        })
    }

    fn votes_for_round(
        &self,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents: Vec<VoteDocument> = store
                .votes()
                .await
                .find(doc! {"round_id": uuid_as_binary(round_id)})
                .sort(doc! {"submitted_at": 1})
                .await
                .map_err(read_err!(VOTES))?
                .try_collect()
                .await
                .map_err(read_err!(VOTES))?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn insert_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document: QuestionDocument = question.into();
            store
                .questions()
                .await
                .insert_one(&document)
                .await
                .map_err(write_err!(QUESTIONS))?;
            Ok(())
        })
    }

    fn find_question(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .questions()
                .await
                .find_one(doc_id(id))
                .await
                .map_err(read_err!(QUESTIONS))?;
            Ok(document.map(Into::into))
        })
    }

    fn active_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents: Vec<QuestionDocument> = store
                .questions()
                .await
                .find(doc! {"active": true})
                .sort(doc! {"created_at": 1})
                .await
                .map_err(read_err!(QUESTIONS))?
                .try_collect()
                .await
                .map_err(read_err!(QUESTIONS))?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
