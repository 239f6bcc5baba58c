use axum::Router;

use crate::state::SharedState;

/// Swagger UI and the OpenAPI document.
pub mod docs;
/// Drawing state and chat over plain HTTP.
pub mod drawing;
/// Health check routes.
pub mod health;
/// Server-Sent Events stream for viewers.
pub mod sse;
/// WebSocket endpoint for viewers.
pub mod websocket;

/// Compose all route trees and attach the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(websocket::router())
        .merge(drawing::router())
        .merge(docs::router());

    api_router.with_state(state)
}
