//! Public widget routes - the unauthenticated surface the embeddable chat
//! widget talks to.
//!
//! - `POST /agents/{agent_id}/messages` - inbound visitor message
//! - `GET  /agents/{agent_id}/widget` - widget bootstrap configuration
//! - `GET  /agents/{agent_id}/conversations/{visitor_id}/messages` - history
//!   of the visitor's latest conversation

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use convey_agent::orchestrator::{OrchestrateError, Orchestrator, Outcome};
use convey_core::domain::agent::{AgentId, AgentStatus};
use convey_core::domain::conversation::{VisitorId, VisitorInfo};
use convey_core::domain::message::MessageRole;
use convey_db::repositories::{AgentRepository, ConversationRepository, MessageRepository};

#[derive(Clone)]
pub struct WidgetState {
    pub orchestrator: Arc<Orchestrator>,
    pub agents: Arc<dyn AgentRepository>,
    pub conversations: Arc<dyn ConversationRepository>,
    pub messages: Arc<dyn MessageRepository>,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub visitor_id: String,
    pub message: String,
    pub visitor_info: Option<VisitorInfo>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub response: String,
    pub conversation_id: String,
    pub status: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WidgetAgentConfig {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub welcome_message: Option<String>,
    pub widget_color: Option<String>,
    pub widget_position: Option<String>,
    pub require_email: bool,
    pub fallback_email: Option<String>,
    pub fallback_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WidgetConfigResponse {
    pub agent: WidgetAgentConfig,
    pub status: AgentStatus,
}

#[derive(Debug, Serialize)]
pub struct PublicMessage {
    pub role: MessageRole,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct WidgetError {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: WidgetState) -> Router {
    // The widget is embedded on arbitrary customer sites, so this surface is
    // fully cross-origin.
    Router::new()
        .route("/agents/{agent_id}/messages", post(send_message))
        .route("/agents/{agent_id}/widget", get(widget_config))
        .route("/agents/{agent_id}/conversations/{visitor_id}/messages", get(conversation_history))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn send_message(
    Path(agent_id): Path<String>,
    State(state): State<WidgetState>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, (StatusCode, Json<WidgetError>)> {
    let visitor_id = body.visitor_id.trim();
    let message = body.message.trim();
    if visitor_id.is_empty() || message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(WidgetError { error: "visitor_id and message are required".to_string() }),
        ));
    }

    let reply = state
        .orchestrator
        .handle_inbound_message(
            &AgentId(agent_id.clone()),
            &VisitorId(visitor_id.to_string()),
            message,
            body.visitor_info.unwrap_or_default(),
        )
        .await
        .map_err(|error| match error {
            OrchestrateError::AgentNotFound(id) => (
                StatusCode::NOT_FOUND,
                Json(WidgetError { error: format!("agent `{id}` not found") }),
            ),
            OrchestrateError::Repository(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WidgetError { error: format!("persistence failure: {error}") }),
            ),
        })?;

    info!(
        event_name = "widget.message.handled",
        agent_id = %agent_id,
        visitor_id = %visitor_id,
        conversation_id = %reply.conversation_id.as_ref().map(|c| c.0.as_str()).unwrap_or(""),
        outcome = ?reply.outcome,
        "inbound widget message handled"
    );

    Ok(Json(SendMessageResponse {
        response: reply.response,
        conversation_id: reply.conversation_id.map(|c| c.0).unwrap_or_default(),
        status: reply.outcome,
        fallback_email: reply.fallback_email,
    }))
}

pub async fn widget_config(
    Path(agent_id): Path<String>,
    State(state): State<WidgetState>,
) -> Result<Json<WidgetConfigResponse>, (StatusCode, Json<WidgetError>)> {
    let agent = state
        .agents
        .find_by_id(&AgentId(agent_id))
        .await
        .map_err(internal_error)?
        .ok_or_else(not_found)?;

    Ok(Json(WidgetConfigResponse {
        agent: WidgetAgentConfig {
            id: agent.id.0,
            name: agent.name,
            avatar_url: agent.avatar_url,
            welcome_message: agent.welcome_message,
            widget_color: agent.widget_color,
            widget_position: agent.widget_position,
            require_email: agent.require_email,
            fallback_email: agent.fallback_email,
            fallback_message: agent.fallback_message,
        },
        status: agent.status,
    }))
}

pub async fn conversation_history(
    Path((agent_id, visitor_id)): Path<(String, String)>,
    State(state): State<WidgetState>,
) -> Result<Json<Vec<PublicMessage>>, (StatusCode, Json<WidgetError>)> {
    let latest = state
        .conversations
        .find_latest(&AgentId(agent_id), &VisitorId(visitor_id))
        .await
        .map_err(internal_error)?;

    let Some(conversation) = latest else {
        return Ok(Json(Vec::new()));
    };

    let messages = state.messages.list(&conversation.id).await.map_err(internal_error)?;

    Ok(Json(
        messages
            .into_iter()
            .map(|m| PublicMessage {
                role: m.role,
                content: m.content,
                created_at: m.created_at.to_rfc3339(),
            })
            .collect(),
    ))
}

fn internal_error<E: std::fmt::Display>(error: E) -> (StatusCode, Json<WidgetError>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(WidgetError { error: error.to_string() }))
}

fn not_found() -> (StatusCode, Json<WidgetError>) {
    (StatusCode::NOT_FOUND, Json(WidgetError { error: "agent not found".to_string() }))
}
