use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conversation::ConversationId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    Visitor,
    Agent,
}

/// One turn in a conversation. Messages are append-only; ordering within a
/// conversation is the backing store's append order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
