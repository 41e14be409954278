use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::{
        requests::{ActionResponse, StartGameRequest, SubmitPromptRequest, SubmitVoteRequest},
        view::RoomView,
    },
    error::AppError,
    services::{session_service, submission_service, view_service},
    state::SharedState,
};

/// Routes handling game actions and room snapshots.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{id}", get(get_room))
        .route("/rooms/{id}/start", post(start_game))
        .route("/rooms/{id}/prompts", post(submit_prompt))
        .route("/rooms/{id}/votes", post(submit_vote))
}

/// Return the derived room snapshot for polling clients.
#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = String, Path, description = "Identifier of the room")),
    responses(
        (status = 200, description = "Room snapshot", body = RoomView),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomView>, AppError> {
    let view = view_service::room_view(&state, id).await?;
    Ok(Json(view))
}

/// Start the game. The acting player must be the host.
#[utoipa::path(
    post,
    path = "/rooms/{id}/start",
    tag = "rooms",
    params(("id" = String, Path, description = "Identifier of the room")),
    request_body = StartGameRequest,
    responses(
        (status = 200, description = "Game starting", body = ActionResponse),
        (status = 401, description = "Caller is not the host"),
        (status = 409, description = "Room is not in a startable state")
    )
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<StartGameRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    session_service::start_game(&state, id, payload.player_id).await?;
    Ok(Json(ActionResponse {
        message: "starting".into(),
    }))
}

/// Submit (or replace) the acting player's prompt for the active round.
#[utoipa::path(
    post,
    path = "/rooms/{id}/prompts",
    tag = "rooms",
    params(("id" = String, Path, description = "Identifier of the room")),
    request_body = SubmitPromptRequest,
    responses(
        (status = 200, description = "Prompt recorded", body = ActionResponse),
        (status = 400, description = "Prompt failed validation"),
        (status = 409, description = "Round is not in the prompt phase")
    )
)]
pub async fn submit_prompt(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SubmitPromptRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    submission_service::submit_prompt(&state, id, payload.player_id, &payload.text).await?;
    Ok(Json(ActionResponse {
        message: "prompt recorded".into(),
    }))
}

/// Cast (or change) the acting player's vote for the active round.
#[utoipa::path(
    post,
    path = "/rooms/{id}/votes",
    tag = "rooms",
    params(("id" = String, Path, description = "Identifier of the room")),
    request_body = SubmitVoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = ActionResponse),
        (status = 400, description = "Vote target is not legal"),
        (status = 409, description = "Round is not in the voting phase")
    )
)]
pub async fn submit_vote(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<SubmitVoteRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    submission_service::submit_vote(&state, id, payload.player_id, payload.image_id).await?;
    Ok(Json(ActionResponse {
        message: "vote recorded".into(),
    }))
}
