use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse",
    tag = "viewers",
    responses(
        (status = 200, description = "Drawing event stream, `state:init` first", content_type = "text/event-stream", body = String),
        (status = 503, description = "Drawing engine stopped")
    )
)]
/// Stream the drawing state and every subsequent change to a viewer.
pub async fn viewer_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let subscription = sse_service::subscribe(&state).await?;
    Ok(sse_service::to_sse_stream(state, subscription))
}

/// Configure the SSE endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse", get(viewer_stream))
}
