//! Prompt Party Back binary entrypoint wiring REST, SSE, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prompt_party_back::{
    config::GameTuning,
    dao::game_store::memory::MemoryStore,
    engine,
    engine::generation::PlaceholderGenerator,
    routes,
    scheduler::TokioScheduler,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let tuning = GameTuning::load();
    let (scheduler, jobs) = TokioScheduler::new();
    let app_state = AppState::new(tuning, Arc::new(scheduler), Arc::new(PlaceholderGenerator));

    // Fired timers are executed by the job worker for the life of the process.
    tokio::spawn(engine::run_job_worker(app_state.clone(), jobs));
    install_storage(app_state.clone()).await;

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the storage backend: MongoDB behind a reconnecting supervisor when
/// `MONGO_URI` is set, the in-memory store otherwise.
async fn install_storage(state: SharedState) {
    #[cfg(feature = "mongo-store")]
    if let Ok(uri) = env::var("MONGO_URI") {
        use prompt_party_back::dao::game_store::GameStore;
        use prompt_party_back::dao::game_store::mongodb::{MongoConfig, MongoGameStore};
        use prompt_party_back::services::storage_supervisor;

        let db_name = env::var("MONGO_DB").ok();
        tokio::spawn(storage_supervisor::run(state, move || {
            let uri = uri.clone();
            let db_name = db_name.clone();
            async move {
                let config = MongoConfig::from_uri(&uri, db_name.as_deref()).await?;
                let store = MongoGameStore::connect(config).await?;
                Ok(Arc::new(store) as Arc<dyn GameStore>)
            }
        }));
        return;
    }

    warn!("MONGO_URI not set; using the in-memory store (state is lost on restart)");
    state.set_game_store(Arc::new(MemoryStore::new())).await;
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
