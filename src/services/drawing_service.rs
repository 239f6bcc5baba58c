use tracing::info;

use crate::{
    dto::{chat::ChatSendRequest, messages::StateSnapshot},
    error::ServiceError,
    state::{SharedState, chat::ChatMessage},
};

/// Current drawing, gallery, timer and chat as one snapshot.
pub async fn snapshot(state: &SharedState) -> Result<StateSnapshot, ServiceError> {
    state.engine().snapshot().await
}

/// Validate a chat line and broadcast it to every viewer.
pub async fn post_chat(
    state: &SharedState,
    request: ChatSendRequest,
) -> Result<ChatMessage, ServiceError> {
    let message = state.engine().post_chat(request).await?;
    info!(id = %message.id, username = %message.username, "chat message posted");
    Ok(message)
}
