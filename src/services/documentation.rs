use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the drawing backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::drawing::get_state,
        crate::routes::drawing::post_chat,
        crate::routes::sse::viewer_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::messages::StateSnapshot,
            crate::dto::chat::ChatSendRequest,
            crate::state::chat::ChatMessage,
            crate::state::gallery::GalleryEntry,
            crate::state::state_machine::TimerState,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "drawing", description = "Drawing state and chat over HTTP"),
        (name = "viewers", description = "Realtime streams (SSE and WebSocket) for viewers"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in ["/healthcheck", "/state", "/chat", "/sse", "/ws"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
