use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use convey_core::domain::agent::{Agent, AgentId, AgentStatus};
use convey_core::domain::conversation::{
    Conversation, ConversationId, ConversationStatus, VisitorId, VisitorInfo,
};
use convey_core::domain::message::MessageRole;
use convey_db::repositories::{
    AgentRepository, ConversationRepository, CreditLedgerGateway, MessageRepository,
    RepositoryError,
};
use convey_notify::{ConversationNotifier, LowCreditsNote, NewConversationNote};

use crate::dispatch::{DispatchClient, DispatchRequest};

/// Apology returned when the external responder fails or times out.
pub const DISPATCH_APOLOGY: &str =
    "Sorry, something went wrong while handling your message. Please try again in a moment.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    OutOfService,
    HumanTakeover,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InboundReply {
    pub response: String,
    pub conversation_id: Option<ConversationId>,
    pub outcome: Outcome,
    pub fallback_email: Option<String>,
}

impl InboundReply {
    fn out_of_service(agent: &Agent) -> Self {
        Self {
            response: agent.fallback_text().to_string(),
            conversation_id: None,
            outcome: Outcome::OutOfService,
            fallback_email: agent.fallback_email.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("agent `{0}` not found")]
    AgentNotFound(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Per-request control flow for one inbound visitor message. All shared
/// state lives behind the injected store ports; an instance is cheap to
/// share across concurrent requests.
pub struct Orchestrator {
    agents: Arc<dyn AgentRepository>,
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    credits: Arc<dyn CreditLedgerGateway>,
    dispatch: Arc<dyn DispatchClient>,
    notifier: Arc<dyn ConversationNotifier>,
    low_credit_threshold: i64,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        credits: Arc<dyn CreditLedgerGateway>,
        dispatch: Arc<dyn DispatchClient>,
        notifier: Arc<dyn ConversationNotifier>,
        low_credit_threshold: i64,
    ) -> Self {
        Self {
            agents,
            conversations,
            messages,
            credits,
            dispatch,
            notifier,
            low_credit_threshold,
        }
    }

    pub async fn handle_inbound_message(
        &self,
        agent_id: &AgentId,
        visitor_id: &VisitorId,
        text: &str,
        visitor_info: VisitorInfo,
    ) -> Result<InboundReply, OrchestrateError> {
        // Availability is checked before any conversation state exists, so an
        // inactive agent never creates a conversation or message.
        let agent = self
            .agents
            .find_by_id(agent_id)
            .await?
            .ok_or_else(|| OrchestrateError::AgentNotFound(agent_id.0.clone()))?;

        if !agent.is_active() {
            debug!(
                event_name = "orchestrator.agent.unavailable",
                agent_id = %agent_id.0,
                visitor_id = %visitor_id.0,
                "agent is not active, returning fallback"
            );
            return Ok(InboundReply::out_of_service(&agent));
        }

        // A missing balance record allows the message through; only an
        // explicit balance below one unit blocks and auto-pauses the agent.
        if let Some(balance) = self.credits.balance(&agent.account_id).await? {
            if balance < 1 {
                self.agents.set_status(agent_id, AgentStatus::Paused).await?;
                info!(
                    event_name = "orchestrator.agent.auto_paused",
                    agent_id = %agent_id.0,
                    account_id = %agent.account_id.0,
                    "credit balance exhausted, agent paused"
                );
                return Ok(InboundReply::out_of_service(&agent));
            }
        }

        let latest = self.conversations.find_latest(agent_id, visitor_id).await?;
        let (conversation_id, prior_status, freshly_created) = match latest {
            Some(existing) if existing.status.accepts_visitor_messages() => {
                (existing.id, existing.status, false)
            }
            _ => {
                let conversation =
                    Conversation::open(agent_id.clone(), visitor_id.clone(), visitor_info.clone());
                let id = conversation.id.clone();
                self.conversations.create(conversation).await?;
                (id, ConversationStatus::Active, true)
            }
        };

        self.messages.append(&conversation_id, MessageRole::Visitor, text).await?;

        if freshly_created {
            self.spawn_new_conversation_note(&agent, &visitor_info, &conversation_id);
        }

        // Held for a human operator: persist only, never auto-respond, never
        // meter.
        if prior_status == ConversationStatus::HumanTakeover {
            return Ok(InboundReply {
                response: String::new(),
                conversation_id: Some(conversation_id),
                outcome: Outcome::HumanTakeover,
                fallback_email: None,
            });
        }

        let request = DispatchRequest {
            routing_key: agent.routing_key.clone(),
            agent_name: agent.name.clone(),
            system_prompt: agent.system_prompt.clone(),
            message: text.to_string(),
        };

        let reply = match self.dispatch.dispatch(&request).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    event_name = "orchestrator.dispatch.failed",
                    agent_id = %agent_id.0,
                    conversation_id = %conversation_id.0,
                    error = %error,
                    "dispatch failed, returning apology without metering"
                );
                return Ok(InboundReply {
                    response: DISPATCH_APOLOGY.to_string(),
                    conversation_id: Some(conversation_id),
                    outcome: Outcome::Error,
                    fallback_email: None,
                });
            }
        };

        self.messages.append(&conversation_id, MessageRole::Agent, &reply.reply).await?;

        let remaining = self
            .credits
            .decrement(&agent.account_id, 1, &format!("Public chat - agent: {}", agent.name))
            .await?;

        if let Some(remaining) = remaining {
            if self.low_credit_threshold > 0 && remaining < self.low_credit_threshold {
                self.spawn_low_credits_note(&agent, remaining);
            }
        }

        Ok(InboundReply {
            response: reply.reply,
            conversation_id: Some(conversation_id),
            outcome: Outcome::Success,
            fallback_email: None,
        })
    }

    fn spawn_new_conversation_note(
        &self,
        agent: &Agent,
        visitor_info: &VisitorInfo,
        conversation_id: &ConversationId,
    ) {
        let notifier = Arc::clone(&self.notifier);
        let note = NewConversationNote {
            account_id: agent.account_id.clone(),
            agent_name: agent.name.clone(),
            visitor_name: visitor_info.name.clone(),
            visitor_email: visitor_info.email.clone(),
            conversation_id: conversation_id.clone(),
        };

        tokio::spawn(async move {
            let conversation_id = note.conversation_id.0.clone();
            if let Err(error) = notifier.notify_new_conversation(note).await {
                warn!(
                    event_name = "orchestrator.notify.new_conversation_failed",
                    conversation_id = %conversation_id,
                    error = %error,
                    "new conversation notification failed"
                );
            }
        });
    }

    fn spawn_low_credits_note(&self, agent: &Agent, remaining: i64) {
        let notifier = Arc::clone(&self.notifier);
        let note = LowCreditsNote {
            account_id: agent.account_id.clone(),
            balance: remaining,
            threshold: self.low_credit_threshold,
        };

        tokio::spawn(async move {
            let account_id = note.account_id.0.clone();
            if let Err(error) = notifier.notify_low_credits(note).await {
                warn!(
                    event_name = "orchestrator.notify.low_credits_failed",
                    account_id = %account_id,
                    error = %error,
                    "low credit notification failed"
                );
            }
        });
    }
}
