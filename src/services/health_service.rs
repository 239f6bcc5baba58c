use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the drawing engine is running along with catalog and audience sizes.
pub fn health_status(state: &SharedState) -> HealthResponse {
    let drawings = state.config().engine().catalog.len();
    let viewers = state.viewers().len();

    if state.engine().is_running() {
        HealthResponse::ok(drawings, viewers)
    } else {
        warn!("drawing engine is not running");
        HealthResponse::stopped(drawings, viewers)
    }
}
