use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback text returned to visitors when an agent cannot answer and its
/// owner did not configure a custom message.
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "This service is temporarily offline. Please try again later.";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Paused,
    Draft,
    Archived,
}

/// A configured chatbot persona owned by an account.
///
/// Agents are read-only to the orchestration core with one exception: the
/// status field is flipped to `Paused` when the owning account runs out of
/// credit. Everything else is maintained by the owner console.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub account_id: AccountId,
    pub name: String,
    pub status: AgentStatus,
    pub system_prompt: String,
    pub routing_key: String,
    pub fallback_message: Option<String>,
    pub fallback_email: Option<String>,
    pub welcome_message: Option<String>,
    pub avatar_url: Option<String>,
    pub widget_color: Option<String>,
    pub widget_position: Option<String>,
    pub require_email: bool,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    pub fn fallback_text(&self) -> &str {
        self.fallback_message.as_deref().unwrap_or(DEFAULT_FALLBACK_MESSAGE)
    }
}
