use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

/// Opaque visitor identifier supplied by the embedding widget.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisitorId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    HumanTakeover,
    Resolved,
}

impl ConversationStatus {
    /// Whether a visitor's inbound message may still be appended. Resolved
    /// conversations are terminal until explicitly reopened.
    pub fn accepts_visitor_messages(self) -> bool {
        !matches!(self, Self::Resolved)
    }

    pub fn can_transition_to(self, next: ConversationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::HumanTakeover)
                | (Self::Active, Self::Resolved)
                | (Self::HumanTakeover, Self::Active)
                | (Self::HumanTakeover, Self::Resolved)
                | (Self::Resolved, Self::Active)
        )
    }
}

/// The system-authored message injected alongside each owner-console status
/// transition. Exactly one note per legal transition.
pub fn transition_note(from: ConversationStatus, to: ConversationStatus) -> Option<&'static str> {
    match (from, to) {
        (ConversationStatus::Active, ConversationStatus::HumanTakeover) => {
            Some("A human operator has joined the conversation.")
        }
        (ConversationStatus::HumanTakeover, ConversationStatus::Active) => {
            Some("The assistant has resumed the conversation.")
        }
        (ConversationStatus::Active, ConversationStatus::Resolved)
        | (ConversationStatus::HumanTakeover, ConversationStatus::Resolved) => {
            Some("This conversation was marked as resolved.")
        }
        (ConversationStatus::Resolved, ConversationStatus::Active) => {
            Some("This conversation was reopened.")
        }
        _ => None,
    }
}

/// Optional identity details a visitor supplies with their first message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorInfo {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// One visitor's session-scoped exchange with one agent. For a given
/// (agent, visitor) pair only the most recently started conversation is
/// current.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub agent_id: AgentId,
    pub visitor_id: VisitorId,
    pub visitor_name: Option<String>,
    pub visitor_email: Option<String>,
    pub status: ConversationStatus,
    pub started_at: DateTime<Utc>,
}

impl Conversation {
    /// Open a fresh conversation for a visitor's first (or post-resolution)
    /// message.
    pub fn open(agent_id: AgentId, visitor_id: VisitorId, visitor_info: VisitorInfo) -> Self {
        Self {
            id: ConversationId(Uuid::new_v4().to_string()),
            agent_id,
            visitor_id,
            visitor_name: visitor_info.name,
            visitor_email: visitor_info.email,
            status: ConversationStatus::Active,
            started_at: Utc::now(),
        }
    }

    pub fn transition_to(&mut self, next: ConversationStatus) -> Result<(), DomainError> {
        if self.status.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidConversationTransition { from: self.status, to: next })
    }
}
