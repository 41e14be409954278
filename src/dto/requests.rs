use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::dto::validation::validate_prompt_text;

/// Request to start the game. The acting player must be the host.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StartGameRequest {
    /// Player performing the action.
    pub player_id: Uuid,
}

/// One player's prompt submission for the active round.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitPromptRequest {
    /// Player performing the action.
    pub player_id: Uuid,
    /// The prompt text; 3 to 200 characters once trimmed.
    #[validate(custom(function = validate_prompt_text))]
    pub text: String,
}

/// One player's vote for the active round.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitVoteRequest {
    /// Player performing the action.
    pub player_id: Uuid,
    /// Image the vote targets. Must not be the voter's own.
    pub image_id: Uuid,
}

/// Generic acknowledgement returned by action endpoints.
#[derive(Debug, serde::Serialize, ToSchema)]
pub struct ActionResponse {
    /// Human-readable confirmation.
    pub message: String,
}
