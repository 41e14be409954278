use crate::{dao::game_store::GameStore, dto::health::HealthResponse, state::SharedState};

/// Build the health payload, probing the storage backend when one is installed.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage = match state.game_store().await {
        Some(store) => store.health_check().await.is_ok(),
        None => false,
    };

    HealthResponse {
        status: if storage { "ok" } else { "degraded" }.into(),
        storage,
    }
}
