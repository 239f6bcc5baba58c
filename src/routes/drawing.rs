use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{chat::ChatSendRequest, messages::StateSnapshot},
    error::AppError,
    services::drawing_service,
    state::{SharedState, chat::ChatMessage},
};

/// Routes exposing the drawing state and chat over plain HTTP.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/state", get(get_state))
        .route("/chat", post(post_chat))
}

/// Snapshot of the timer, current drawing, gallery and recent chat.
#[utoipa::path(
    get,
    path = "/state",
    tag = "drawing",
    responses(
        (status = 200, description = "Current drawing state", body = StateSnapshot),
        (status = 503, description = "Drawing engine stopped")
    )
)]
pub async fn get_state(State(state): State<SharedState>) -> Result<Json<StateSnapshot>, AppError> {
    let snapshot = drawing_service::snapshot(&state).await?;
    Ok(Json(snapshot))
}

/// Post a chat line; it is broadcast to every viewer as `chat:message`.
#[utoipa::path(
    post,
    path = "/chat",
    tag = "drawing",
    request_body = ChatSendRequest,
    responses(
        (status = 200, description = "Message accepted", body = ChatMessage),
        (status = 400, description = "Invalid username, text, color or avatar"),
        (status = 503, description = "Drawing engine stopped")
    )
)]
pub async fn post_chat(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ChatSendRequest>>,
) -> Result<Json<ChatMessage>, AppError> {
    let message = drawing_service::post_chat(&state, payload).await?;
    Ok(Json(message))
}
