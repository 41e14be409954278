//! Shared harness for the engine integration tests: an in-memory store, a
//! manually driven scheduler, and helpers that stand in for the external
//! roster component.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

use prompt_party_back::{
    config::GameTuning,
    dao::game_store::{GameStore, memory::MemoryStore},
    dao::models::{
        GeneratedImageEntity, PlayerEntity, PlayerStatus, QuestionEntity, RoomEntity,
        RoomSettings, RoomStatus, RoundEntity, RoundPhase,
    },
    engine::generation::{GeneratedImage, GenerationError, ImageGenerator, PlaceholderGenerator},
    scheduler::{ScheduledJob, Scheduler, TimerId},
    state::{AppState, SharedState},
};

/// Scheduler fake: records jobs instead of sleeping, so tests decide when and
/// whether each timer fires.
#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<Vec<(TimerId, ScheduledJob)>>,
    canceled: Mutex<HashSet<TimerId>>,
}

impl ManualScheduler {
    fn push(&self, job: ScheduledJob) -> TimerId {
        let id = Uuid::new_v4();
        self.pending.lock().unwrap().push((id, job));
        id
    }

    /// Remove and return every pending (non-canceled) job.
    pub fn drain(&self) -> Vec<(TimerId, ScheduledJob)> {
        self.pending.lock().unwrap().drain(..).collect()
    }

    /// Pending jobs without consuming them.
    pub fn pending_jobs(&self) -> Vec<ScheduledJob> {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .map(|(_, job)| job.clone())
            .collect()
    }

    /// Whether the given timer was canceled.
    pub fn was_canceled(&self, id: TimerId) -> bool {
        self.canceled.lock().unwrap().contains(&id)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_at(&self, _deadline: SystemTime, job: ScheduledJob) -> TimerId {
        self.push(job)
    }

    fn schedule_after(&self, _delay: Duration, job: ScheduledJob) -> TimerId {
        self.push(job)
    }

    fn cancel(&self, id: TimerId) {
        self.pending.lock().unwrap().retain(|(entry, _)| *entry != id);
        self.canceled.lock().unwrap().insert(id);
    }
}

/// Generator fake whose every call fails, producing error placeholders.
pub struct FailingGenerator;

impl ImageGenerator for FailingGenerator {
    fn generate(
        &self,
        _prompt: &prompt_party_back::dao::models::PromptEntity,
    ) -> futures::future::BoxFuture<'static, Result<GeneratedImage, GenerationError>> {
        Box::pin(async { Err(GenerationError::Rejected("safety filter".into())) })
    }
}

/// Everything a scenario needs in one place.
pub struct Harness {
    pub state: SharedState,
    pub store: Arc<MemoryStore>,
    pub scheduler: Arc<ManualScheduler>,
}

/// Build a harness backed by the in-memory store and the manual scheduler.
pub fn harness() -> Harness {
    harness_with_generator(Arc::new(PlaceholderGenerator))
}

/// Same as [`harness`] with a custom generation collaborator.
pub fn harness_with_generator(generator: Arc<dyn ImageGenerator>) -> Harness {
    let scheduler = Arc::new(ManualScheduler::default());
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(GameTuning::default(), scheduler.clone(), generator);
    Harness {
        state,
        store,
        scheduler,
    }
}

impl Harness {
    /// Install the in-memory store (the harness starts degraded).
    pub async fn install_store(&self) {
        self.state
            .set_game_store(self.store.clone() as Arc<dyn GameStore>)
            .await;
    }

    /// Create a waiting room with `player_count` connected players. The first
    /// player is the host. Stands in for the external roster component.
    pub async fn seed_room(&self, player_count: usize) -> (RoomEntity, Vec<PlayerEntity>) {
        let now = SystemTime::now();
        let room = RoomEntity {
            id: Uuid::new_v4(),
            code: format!("r{}", &Uuid::new_v4().simple().to_string()[..5]),
            host_user_id: "user-0".into(),
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
        };
        self.store.insert_room(room.clone()).await.unwrap();

        let mut players = Vec::with_capacity(player_count);
        for index in 0..player_count {
            let player = PlayerEntity {
                id: Uuid::new_v4(),
                room_id: room.id,
                user_id: format!("user-{index}"),
                status: PlayerStatus::Connected,
                is_host: index == 0,
                score: 0,
                created_at: now + Duration::from_millis(index as u64),
            };
            self.store.insert_player(player.clone()).await.unwrap();
            players.push(player);
        }

        (room, players)
    }

    /// Insert an active question and return it.
    pub async fn seed_question(&self, text: &str) -> QuestionEntity {
        let question = QuestionEntity {
            id: Uuid::new_v4(),
            text: text.into(),
            active: true,
            created_at: SystemTime::now(),
        };
        self.store.insert_question(question.clone()).await.unwrap();
        question
    }

    /// Fabricate a round already sitting in `phase`, old enough to pass the
    /// minimum-dwell guard (its deadline is "now", as when a timer fires).
    pub async fn seed_round_in_phase(
        &self,
        room: &RoomEntity,
        number: u32,
        phase: RoundPhase,
    ) -> RoundEntity {
        let question = self.seed_question("a test theme").await;
        let now = SystemTime::now();
        let round = RoundEntity {
            id: Uuid::new_v4(),
            room_id: room.id,
            number,
            question_id: question.id,
            phase,
            phase_end_time: now,
            scheduled_timer: None,
            images_expected: 0,
            images_completed: 0,
            generation_error: None,
            created_at: now - Duration::from_secs(120),
        };
        self.store.insert_round(round.clone()).await.unwrap();
        self.store
            .set_room_current_round(room.id, number)
            .await
            .unwrap();
        self.store
            .set_room_status(room.id, RoomStatus::Playing)
            .await
            .unwrap();
        round
    }

    /// Age the round's current phase so the next trigger clears the
    /// minimum-dwell guard, as wall-clock time would in production.
    pub async fn mature_round(&self, round_id: Uuid) {
        let round = self.store.find_round(round_id).await.unwrap().unwrap();
        self.store
            .set_round_phase(round_id, round.phase, SystemTime::now(), round.scheduled_timer)
            .await
            .unwrap();
    }

    /// Insert a votable image owned by `player_id`.
    pub async fn seed_image(&self, round_id: Uuid, player_id: Uuid) -> GeneratedImageEntity {
        let image = GeneratedImageEntity {
            id: Uuid::new_v4(),
            round_id,
            prompt_id: Uuid::new_v4(),
            player_id,
            url: Some(format!("https://img.example/{player_id}")),
            error: None,
            metadata: None,
            created_at: SystemTime::now(),
        };
        self.store.insert_image(image.clone()).await.unwrap();
        image
    }

    /// Current state of a round.
    pub async fn round(&self, round_id: Uuid) -> RoundEntity {
        self.store.find_round(round_id).await.unwrap().unwrap()
    }

    /// Current state of a player.
    pub async fn player(&self, player_id: Uuid) -> PlayerEntity {
        self.store.find_player(player_id).await.unwrap().unwrap()
    }

    /// Current state of a room.
    pub async fn room(&self, room_id: Uuid) -> RoomEntity {
        self.store.find_room(room_id).await.unwrap().unwrap()
    }
}
