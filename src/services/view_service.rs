//! Read-only projection of a room for polling clients. Derived from
//! authoritative state on every call, never stored.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    dao::game_store::GameStore,
    dao::models::{RoundEntity, RoundPhase},
    dto::{
        format_system_time,
        view::{GenerationProgressView, ImageView, PlayerView, RoomView, RoundView},
    },
    engine::eligibility::{count_per_target, winning_targets},
    error::ServiceError,
    state::SharedState,
};

/// Assemble the current room snapshot: status, roster flags, and (phase
/// permitting) the image gallery with vote counts and winner flags.
pub async fn room_view(state: &SharedState, room_id: Uuid) -> Result<RoomView, ServiceError> {
    let store = state.require_store().await?;

    let Some(room) = store.find_room(room_id).await? else {
        return Err(ServiceError::NotFound(format!("room `{room_id}` not found")));
    };

    let players = store.players_in_room(room_id).await?;
    let round = store.current_round_for_room(room_id).await?;

    let (submitted, voted, round_view) = match &round {
        Some(round) => {
            let prompts = store.prompts_for_round(round.id).await?;
            let votes = store.votes_for_round(round.id).await?;
            let submitted: HashSet<Uuid> = prompts.iter().map(|p| p.player_id).collect();
            let voted: HashSet<Uuid> = votes.iter().map(|v| v.voter_id).collect();

            let view = build_round_view(state, round).await?;
            (submitted, voted, Some(view))
        }
        None => (HashSet::new(), HashSet::new(), None),
    };

    Ok(RoomView {
        room_id: room.id,
        code: room.code,
        status: room.status.into(),
        players: players
            .into_iter()
            .map(|player| PlayerView {
                has_submitted: submitted.contains(&player.id),
                has_voted: voted.contains(&player.id),
                connected: player.is_connected(),
                id: player.id,
                user_id: player.user_id,
                score: player.score,
                is_host: player.is_host,
            })
            .collect(),
        round: round_view,
    })
}

async fn build_round_view(
    state: &SharedState,
    round: &RoundEntity,
) -> Result<RoundView, ServiceError> {
    let store = state.require_store().await?;

    let question = store
        .find_question(round.question_id)
        .await?
        .map(|question| question.text)
        .unwrap_or_default();

    // The gallery is exposed only during voting and results.
    let images = match round.phase {
        RoundPhase::Voting | RoundPhase::Results => {
            let images = store.images_for_round(round.id).await?;
            let votes = store.votes_for_round(round.id).await?;
            let counts = count_per_target(&votes);
            let winners = winning_targets(&counts);
            Some(
                images
                    .into_iter()
                    .filter(|image| image.is_votable())
                    .map(|image| ImageView {
                        votes: counts.get(&image.id).copied().unwrap_or(0),
                        winner: winners.contains(&image.id),
                        player_id: image.player_id,
                        id: image.id,
                        url: image.url.unwrap_or_default(),
                    })
                    .collect(),
            )
        }
        _ => None,
    };

    Ok(RoundView {
        number: round.number,
        phase: round.phase.into(),
        phase_ends_at: format_system_time(round.phase_end_time),
        question,
        generation: GenerationProgressView {
            completed: round.images_completed,
            expected: round.images_expected,
        },
        generation_error: round.generation_error.clone(),
        images,
    })
}
