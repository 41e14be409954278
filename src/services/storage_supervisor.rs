//! Keeps the storage backend connected, flipping the shared state in and out
//! of degraded mode as connectivity changes.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{game_store::GameStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect through `connect`, install the store, and keep it healthy.
///
/// Runs forever: lost connections put the application into degraded mode and
/// are retried with capped exponential backoff.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        state.set_game_store(store.clone()).await;
        info!("storage connection established; leaving degraded mode");
        delay = INITIAL_DELAY;

        watch_health(&state, store).await;

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll the installed store until its reconnect attempts are exhausted.
async fn watch_health(state: &SharedState, store: Arc<dyn GameStore>) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded().await {
                info!("storage healthy again; leaving degraded mode");
                state.update_degraded(false).await;
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        warn!("storage health check failed; entering degraded mode");
        state.update_degraded(true).await;

        let mut reconnect_delay = INITIAL_DELAY;
        for attempt in 1..=MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!(attempt, "storage reconnection succeeded");
                    state.update_degraded(false).await;
                    break;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                    if attempt == MAX_RECONNECT_ATTEMPTS {
                        warn!("exhausted storage reconnect attempts; rebuilding connection");
                        return;
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                }
            }
        }
    }
}
