use utoipa::OpenApi;

/// Aggregated OpenAPI specification for Prompt Party Back.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::event_stream,
        crate::routes::rooms::start_game,
        crate::routes::rooms::submit_prompt,
        crate::routes::rooms::submit_vote,
        crate::routes::rooms::get_room,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::requests::StartGameRequest,
            crate::dto::requests::SubmitPromptRequest,
            crate::dto::requests::SubmitVoteRequest,
            crate::dto::requests::ActionResponse,
            crate::dto::view::RoomView,
            crate::dto::view::RoundView,
            crate::dto::view::PlayerView,
            crate::dto::view::ImageView,
            crate::dto::view::GenerationProgressView,
            crate::dto::phase::VisiblePhase,
            crate::dto::phase::VisibleRoomStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Game actions and room snapshots"),
        (name = "sse", description = "Server-sent events stream"),
    )
)]
pub struct ApiDoc;
