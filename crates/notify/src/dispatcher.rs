use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use convey_core::domain::agent::AccountId;
use convey_core::domain::conversation::ConversationId;
use convey_db::repositories::OwnerProfileRepository;

use crate::webhook::{NotifyChannel, NotifyError};

/// Payload for a "new conversation" owner notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewConversationNote {
    pub account_id: AccountId,
    pub agent_name: String,
    pub visitor_name: Option<String>,
    pub visitor_email: Option<String>,
    pub conversation_id: ConversationId,
}

/// Payload for a low-balance warning after a metered reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LowCreditsNote {
    pub account_id: AccountId,
    pub balance: i64,
    pub threshold: i64,
}

#[async_trait]
pub trait ConversationNotifier: Send + Sync {
    async fn notify_new_conversation(&self, note: NewConversationNote) -> Result<(), NotifyError>;
    async fn notify_low_credits(&self, note: LowCreditsNote) -> Result<(), NotifyError>;
}

/// Looks up the owner's opt-in and forwards the note through the configured
/// channel. A missing profile, or one with notifications disabled, makes the
/// whole call a silent no-op.
pub struct NotificationDispatcher {
    profiles: Arc<dyn OwnerProfileRepository>,
    channel: Arc<dyn NotifyChannel>,
}

impl NotificationDispatcher {
    pub fn new(profiles: Arc<dyn OwnerProfileRepository>, channel: Arc<dyn NotifyChannel>) -> Self {
        Self { profiles, channel }
    }
}

#[async_trait]
impl ConversationNotifier for NotificationDispatcher {
    async fn notify_new_conversation(&self, note: NewConversationNote) -> Result<(), NotifyError> {
        let Some(profile) = self.profiles.find_by_account(&note.account_id).await? else {
            debug!(
                event_name = "notify.new_conversation.skipped",
                account_id = %note.account_id.0,
                "no owner profile, notification suppressed"
            );
            return Ok(());
        };

        if !profile.notify_new_conversation {
            debug!(
                event_name = "notify.new_conversation.skipped",
                account_id = %note.account_id.0,
                "owner opted out of new conversation notifications"
            );
            return Ok(());
        }

        let payload = json!({
            "kind": "new_conversation",
            "email": profile.email,
            "ownerName": profile.display_name(),
            "agentName": note.agent_name,
            "visitorName": note.visitor_name.as_deref().unwrap_or("Anonymous visitor"),
            "visitorEmail": note.visitor_email.as_deref().unwrap_or("No email"),
            "conversationId": note.conversation_id.0,
        });

        self.channel.send(payload).await
    }

    async fn notify_low_credits(&self, note: LowCreditsNote) -> Result<(), NotifyError> {
        let Some(profile) = self.profiles.find_by_account(&note.account_id).await? else {
            return Ok(());
        };

        if !profile.notify_new_conversation {
            return Ok(());
        }

        let payload = json!({
            "kind": "low_credits",
            "email": profile.email,
            "ownerName": profile.display_name(),
            "balance": note.balance,
            "threshold": note.threshold,
        });

        self.channel.send(payload).await
    }
}
