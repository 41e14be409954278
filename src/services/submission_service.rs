//! Validate and persist player actions, then check for early phase completion.

use std::collections::HashSet;
use std::time::SystemTime;

use tracing::debug;
use uuid::Uuid;

use crate::{
    dao::game_store::GameStore,
    dao::models::{PlayerEntity, PromptEntity, RoomEntity, RoundEntity, RoundPhase, VoteEntity},
    dto::validation::{PROMPT_MAX_CHARS, PROMPT_MIN_CHARS},
    engine::{
        eligibility::{all_required_have_acted, prompt_eligibility, vote_eligibility},
        lifecycle,
    },
    error::ServiceError,
    services::sse_events,
    state::SharedState,
};

/// Upsert the acting player's prompt for the active round.
pub async fn submit_prompt(
    state: &SharedState,
    room_id: Uuid,
    player_id: Uuid,
    text: &str,
) -> Result<(), ServiceError> {
    let (_, player, round) = load_action_context(state, room_id, player_id).await?;

    if round.phase != RoundPhase::Prompt {
        return Err(ServiceError::InvalidState(format!(
            "prompts can only be submitted during the prompt phase, current phase {:?}",
            round.phase
        )));
    }

    let trimmed = text.trim();
    if trimmed.chars().count() < PROMPT_MIN_CHARS || trimmed.chars().count() > PROMPT_MAX_CHARS {
        return Err(ServiceError::InvalidInput(format!(
            "prompt must be between {PROMPT_MIN_CHARS} and {PROMPT_MAX_CHARS} characters"
        )));
    }

    let store = state.require_store().await?;
    store
        .upsert_prompt(PromptEntity {
            id: Uuid::new_v4(),
            round_id: round.id,
            player_id: player.id,
            text: trimmed.to_owned(),
            submitted_at: SystemTime::now(),
        })
        .await?;

    sse_events::broadcast_prompt_submitted(state, room_id, player.id);
    try_early_transition(state, &round).await
}

/// Upsert the acting player's vote for the active round.
pub async fn submit_vote(
    state: &SharedState,
    room_id: Uuid,
    player_id: Uuid,
    image_id: Uuid,
) -> Result<(), ServiceError> {
    let (_, player, round) = load_action_context(state, room_id, player_id).await?;

    if round.phase != RoundPhase::Voting {
        return Err(ServiceError::InvalidState(format!(
            "votes can only be cast during the voting phase, current phase {:?}",
            round.phase
        )));
    }

    let store = state.require_store().await?;
    let Some(image) = store.find_image(image_id).await? else {
        return Err(ServiceError::InvalidInput("vote target does not exist".into()));
    };
    if image.round_id != round.id {
        return Err(ServiceError::InvalidInput(
            "vote target is not part of the current round".into(),
        ));
    }
    if !image.is_votable() {
        return Err(ServiceError::InvalidInput(
            "vote target failed generation and cannot be voted for".into(),
        ));
    }
    if image.player_id == player.id {
        return Err(ServiceError::InvalidState(
            "voting for your own image is not allowed".into(),
        ));
    }

    store
        .upsert_vote(VoteEntity {
            id: Uuid::new_v4(),
            round_id: round.id,
            voter_id: player.id,
            image_id,
            submitted_at: SystemTime::now(),
        })
        .await?;

    sse_events::broadcast_vote_submitted(state, room_id, player.id);
    try_early_transition(state, &round).await
}

/// Load and authorize the (room, player, active round) triple behind an action.
async fn load_action_context(
    state: &SharedState,
    room_id: Uuid,
    player_id: Uuid,
) -> Result<(RoomEntity, PlayerEntity, RoundEntity), ServiceError> {
    let store = state.require_store().await?;

    let Some(room) = store.find_room(room_id).await? else {
        return Err(ServiceError::NotFound(format!("room `{room_id}` not found")));
    };
    let Some(player) = store.find_player(player_id).await? else {
        return Err(ServiceError::Unauthorized("unknown player".into()));
    };
    if player.room_id != room_id {
        return Err(ServiceError::Unauthorized(
            "player is not a member of this room".into(),
        ));
    }
    if !player.is_connected() {
        return Err(ServiceError::InvalidState(
            "player is not connected to the room".into(),
        ));
    }

    let Some(round) = store.current_round_for_room(room_id).await? else {
        return Err(ServiceError::NotFound("no round is currently active".into()));
    };

    Ok((room, player, round))
}

/// Re-evaluate the full eligibility set and advance the phase the moment every
/// required participant has acted.
///
/// Every submission runs this independently against freshly loaded state, so
/// whichever submission completes the set is the one that fires. The cancel
/// tolerates timers that already fired, and the transition itself absorbs the
/// duplicate when the timer won the race.
async fn try_early_transition(state: &SharedState, round: &RoundEntity) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let players = store.players_in_room(round.room_id).await?;

    let complete = match round.phase {
        RoundPhase::Prompt => {
            let prompts = store.prompts_for_round(round.id).await?;
            let actors: HashSet<Uuid> = prompts.iter().map(|p| p.player_id).collect();
            all_required_have_acted(&prompt_eligibility(&players), &actors)
        }
        RoundPhase::Voting => {
            let images = store.images_for_round(round.id).await?;
            let votes = store.votes_for_round(round.id).await?;
            let actors: HashSet<Uuid> = votes.iter().map(|v| v.voter_id).collect();
            all_required_have_acted(&vote_eligibility(&players, &images), &actors)
        }
        _ => false,
    };

    if !complete {
        return Ok(());
    }

    debug!(round_id = %round.id, phase = ?round.phase, "all required participants acted; advancing early");
    if let Some(timer) = store.take_round_timer(round.id).await? {
        state.scheduler().cancel(timer);
    }
    lifecycle::transition(state, round.id).await?;
    Ok(())
}
