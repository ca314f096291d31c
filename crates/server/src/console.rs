//! Owner console routes - the operations the dashboard invokes against a
//! conversation.
//!
//! - `POST /conversations/{conversation_id}/status` - validated status
//!   transition, injecting the matching system message
//! - `POST /conversations/{conversation_id}/messages` - owner-authored reply
//!   while the conversation is in human takeover

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use convey_core::domain::conversation::{ConversationId, ConversationStatus};
use convey_core::domain::message::MessageRole;
use convey_db::repositories::{ConversationRepository, MessageRepository, RepositoryError};

#[derive(Clone)]
pub struct ConsoleState {
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: ConversationStatus,
}

#[derive(Debug, Deserialize)]
pub struct OwnerMessageRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ConsoleResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ConsoleError {
    pub error: String,
}

pub fn router(state: ConsoleState) -> Router {
    Router::new()
        .route("/conversations/{conversation_id}/status", post(change_status))
        .route("/conversations/{conversation_id}/messages", post(send_owner_message))
        .with_state(state)
}

pub async fn change_status(
    Path(conversation_id): Path<String>,
    State(state): State<ConsoleState>,
    Json(body): Json<StatusChangeRequest>,
) -> Result<Json<ConsoleResponse>, (StatusCode, Json<ConsoleError>)> {
    let id = ConversationId(conversation_id.clone());

    state.conversations.transition(&id, body.status).await.map_err(map_repository_error)?;

    info!(
        event_name = "console.conversation.status_changed",
        conversation_id = %conversation_id,
        status = ?body.status,
        "conversation status changed via owner console"
    );

    Ok(Json(ConsoleResponse {
        success: true,
        message: format!("Conversation moved to {:?}.", body.status),
    }))
}

pub async fn send_owner_message(
    Path(conversation_id): Path<String>,
    State(state): State<ConsoleState>,
    Json(body): Json<OwnerMessageRequest>,
) -> Result<Json<ConsoleResponse>, (StatusCode, Json<ConsoleError>)> {
    let text = body.message.trim();
    if text.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ConsoleError { error: "message text is required".to_string() }),
        ));
    }

    let id = ConversationId(conversation_id.clone());
    let conversation = state
        .conversations
        .find_by_id(&id)
        .await
        .map_err(map_repository_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ConsoleError { error: format!("conversation `{conversation_id}` not found") }),
            )
        })?;

    if conversation.status != ConversationStatus::HumanTakeover {
        return Err((
            StatusCode::CONFLICT,
            Json(ConsoleError {
                error: "owner messages are only accepted while in human takeover".to_string(),
            }),
        ));
    }

    state.messages.append(&id, MessageRole::Agent, text).await.map_err(map_repository_error)?;

    info!(
        event_name = "console.conversation.owner_message",
        conversation_id = %conversation_id,
        "owner message appended during human takeover"
    );

    Ok(Json(ConsoleResponse { success: true, message: "Message sent to visitor.".to_string() }))
}

fn map_repository_error(error: RepositoryError) -> (StatusCode, Json<ConsoleError>) {
    match error {
        RepositoryError::ConversationNotFound(id) => (
            StatusCode::NOT_FOUND,
            Json(ConsoleError { error: format!("conversation `{id}` not found") }),
        ),
        RepositoryError::Domain(error) => {
            (StatusCode::CONFLICT, Json(ConsoleError { error: error.to_string() }))
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ConsoleError { error: other.to_string() }),
        ),
    }
}
