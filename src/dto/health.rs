use serde::Serialize;
use utoipa::ToSchema;

/// Health status payload returned by the healthcheck endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall service status, `ok` or `degraded`.
    pub status: String,
    /// Whether a storage backend is installed and answering.
    pub storage: bool,
}
