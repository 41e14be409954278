//! Shared application state wiring the store, scheduler, generator, and SSE hub.

mod sse;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::GameTuning,
    dao::game_store::GameStore,
    engine::generation::ImageGenerator,
    error::ServiceError,
    scheduler::Scheduler,
};

pub use self::sse::SseHub;

/// Cheaply clonable handle to the central application state.
pub type SharedState = Arc<AppState>;

const SSE_CHANNEL_CAPACITY: usize = 32;

/// Central application state storing collaborator handles and the SSE hub.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    degraded: watch::Sender<bool>,
    scheduler: Arc<dyn Scheduler>,
    generator: Arc<dyn ImageGenerator>,
    tuning: GameTuning,
    sse: SseHub,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(
        tuning: GameTuning,
        scheduler: Arc<dyn Scheduler>,
        generator: Arc<dyn ImageGenerator>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            game_store: RwLock::new(None),
            degraded: degraded_tx,
            scheduler,
            generator,
            tuning,
            sse: SseHub::new(SSE_CHANNEL_CAPACITY),
        })
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the game store or fail with the degraded-mode error.
    pub async fn require_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn set_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.game_store.read().await;
        guard.is_none()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        if self.is_degraded().await == value {
            return;
        }

        let _ = self.degraded.send(value);
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// The delayed-job facility driving timer-based phase transitions.
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// The image-generation collaborator.
    pub fn generator(&self) -> &Arc<dyn ImageGenerator> {
        &self.generator
    }

    /// The engine tuning knobs loaded at startup.
    pub fn tuning(&self) -> &GameTuning {
        &self.tuning
    }

    /// Broadcast hub used for the SSE stream.
    pub fn sse(&self) -> &SseHub {
        &self.sse
    }
}
