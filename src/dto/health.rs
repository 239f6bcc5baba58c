use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/` and `/healthcheck` routes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "stopped").
    pub status: String,
    /// Number of drawings in the catalog.
    pub drawings: usize,
    /// Number of currently connected viewers.
    pub viewers: usize,
}

impl HealthResponse {
    /// Create a health response indicating the drawing engine is running.
    pub fn ok(drawings: usize, viewers: usize) -> Self {
        Self {
            status: "ok".to_string(),
            drawings,
            viewers,
        }
    }

    /// Create a health response indicating the drawing engine has stopped.
    pub fn stopped(drawings: usize, viewers: usize) -> Self {
        Self {
            status: "stopped".to_string(),
            drawings,
            viewers,
        }
    }
}
