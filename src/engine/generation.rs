//! Image-generation collaborator and the progress tracking around it.
//!
//! The real AI call is an opaque async job behind [`ImageGenerator`]. The
//! engine drives it: `verify_generation` confirms prompts are visible (with a
//! bounded, progressively longer retry), `run_generation` awaits one outcome
//! per prompt, and `record_image_progress` counts outcomes and advances the
//! round early once everything expected has landed.

use std::time::SystemTime;

use futures::future::{BoxFuture, join_all};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::game_store::GameStore,
    dao::models::{GeneratedImageEntity, PromptEntity, RoundPhase},
    engine::lifecycle,
    error::ServiceError,
    scheduler::ScheduledJob,
    services::sse_events,
    state::SharedState,
};

/// Successful output of the generation collaborator for one prompt.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Where the rendered image can be fetched.
    pub url: String,
    /// Backend-specific metadata (model name, seed) when available.
    pub metadata: Option<String>,
}

/// Failure reported by the generation collaborator for one prompt.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The backend refused the prompt (safety filter, malformed input).
    #[error("generation backend rejected the prompt: {0}")]
    Rejected(String),
    /// The backend could not be reached or timed out.
    #[error("generation backend unavailable: {0}")]
    Unavailable(String),
}

/// Opaque async image-generation job, one call per prompt.
pub trait ImageGenerator: Send + Sync {
    /// Produce an image for a single prompt. Failures become error
    /// placeholder records so progress counting stays uniform.
    fn generate(
        &self,
        prompt: &PromptEntity,
    ) -> BoxFuture<'static, Result<GeneratedImage, GenerationError>>;
}

/// Generator used when no real backend is wired: deterministic placeholder
/// URLs keyed by the prompt id.
#[derive(Debug, Default, Clone)]
pub struct PlaceholderGenerator;

impl ImageGenerator for PlaceholderGenerator {
    fn generate(
        &self,
        prompt: &PromptEntity,
    ) -> BoxFuture<'static, Result<GeneratedImage, GenerationError>> {
        let seed = prompt.id.simple().to_string();
        Box::pin(async move {
            Ok(GeneratedImage {
                url: format!("https://picsum.photos/seed/{seed}/512/512"),
                metadata: Some("placeholder".into()),
            })
        })
    }
}

/// Check that the prompts a generating round expects are actually visible,
/// then fire the collaborator.
///
/// When no prompts can be seen yet the check re-schedules itself with a
/// progressively longer delay; after the attempt cap the round records the
/// failure and is forced forward into voting with zero images rather than
/// stalling forever.
pub async fn verify_generation(
    state: &SharedState,
    round_id: Uuid,
    attempt: u32,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let Some(round) = store.find_round(round_id).await? else {
        debug!(%round_id, "verification target no longer exists");
        return Ok(());
    };
    if round.phase != RoundPhase::Generating {
        debug!(%round_id, phase = ?round.phase, "round left generating before verification");
        return Ok(());
    }

    let tuning = state.tuning();
    let prompts = store.prompts_for_round(round_id).await?;

    if prompts.is_empty() {
        if attempt >= tuning.verify_max_attempts {
            warn!(
                %round_id,
                attempt,
                "no prompts found after retries; failing the round open into voting"
            );
            store
                .set_generation_error(
                    round_id,
                    "no prompts were available for image generation".into(),
                )
                .await?;
            store.set_images_expected(round_id, 0).await?;

            if let Some(timer) = store.take_round_timer(round_id).await? {
                state.scheduler().cancel(timer);
            }
            lifecycle::transition(state, round_id).await?;
            return Ok(());
        }

        let delay = tuning.verify_backoff_base * attempt;
        debug!(%round_id, attempt, delay_ms = delay.as_millis() as u64, "prompts not visible yet; retrying");
        state.scheduler().schedule_after(
            delay,
            ScheduledJob::VerifyGeneration {
                round_id,
                attempt: attempt + 1,
            },
        );
        return Ok(());
    }

    // Late prompt writes may have landed since the transition counted them.
    if round.images_expected != prompts.len() as u32 {
        store
            .set_images_expected(round_id, prompts.len() as u32)
            .await?;
    }

    info!(%round_id, prompts = prompts.len(), "dispatching image generation");
    let task_state = state.clone();
    tokio::spawn(async move {
        run_generation(&task_state, round_id, prompts).await;
    });

    Ok(())
}

/// Await one generation outcome per prompt and record each as progress.
pub async fn run_generation(state: &SharedState, round_id: Uuid, prompts: Vec<PromptEntity>) {
    let generator = state.generator().clone();
    let outcomes = join_all(prompts.iter().map(|prompt| generator.generate(prompt))).await;

    for (prompt, outcome) in prompts.iter().zip(outcomes) {
        let image = match outcome {
            Ok(generated) => GeneratedImageEntity {
                id: Uuid::new_v4(),
                round_id,
                prompt_id: prompt.id,
                player_id: prompt.player_id,
                url: Some(generated.url),
                error: None,
                metadata: generated.metadata,
                created_at: SystemTime::now(),
            },
            Err(err) => GeneratedImageEntity {
                id: Uuid::new_v4(),
                round_id,
                prompt_id: prompt.id,
                player_id: prompt.player_id,
                url: None,
                error: Some(err.to_string()),
                metadata: None,
                created_at: SystemTime::now(),
            },
        };

        if let Err(err) = record_image_progress(state, round_id, image).await {
            warn!(%round_id, error = %err, "failed to record generation progress");
        }
    }
}

/// Record one generation outcome (success or error placeholder) and advance
/// the round early once everything expected has been produced.
///
/// The early jump is scheduled after a short settle delay instead of firing
/// inline, and the fresh timer handle replaces the canceled one on the round.
pub async fn record_image_progress(
    state: &SharedState,
    round_id: Uuid,
    image: GeneratedImageEntity,
) -> Result<(), ServiceError> {
    let store = state.require_store().await?;

    store.insert_image(image).await?;
    let Some(round) = store.increment_images_completed(round_id).await? else {
        debug!(%round_id, "progress recorded for a round that no longer exists");
        return Ok(());
    };

    sse_events::broadcast_generation_progress(
        state,
        round.room_id,
        round.images_completed,
        round.images_expected,
    );

    if round.phase == RoundPhase::Generating
        && round.images_expected > 0
        && round.images_completed >= round.images_expected
    {
        if let Some(timer) = store.take_round_timer(round_id).await? {
            state.scheduler().cancel(timer);
        }
        let settle = state.tuning().generation_settle;
        let timer = state
            .scheduler()
            .schedule_after(settle, ScheduledJob::RoundDeadline { round_id });
        store.set_round_timer(round_id, Some(timer)).await?;
        debug!(%round_id, "generation complete; voting begins after settle delay");
    }

    Ok(())
}
