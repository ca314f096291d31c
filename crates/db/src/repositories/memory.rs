//! In-memory fakes mirroring the SQL repositories, for orchestrator and
//! handler tests.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use convey_core::domain::agent::{AccountId, Agent, AgentId, AgentStatus};
use convey_core::domain::conversation::{
    transition_note, Conversation, ConversationId, ConversationStatus, VisitorId,
};
use convey_core::domain::message::{Message, MessageRole};
use convey_core::domain::profile::OwnerProfile;
use convey_core::errors::DomainError;

use super::{
    AgentRepository, ConversationRepository, CreditLedgerGateway, MessageRepository,
    OwnerProfileRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryAgentRepository {
    agents: RwLock<HashMap<String, Agent>>,
}

impl InMemoryAgentRepository {
    pub async fn put(&self, agent: Agent) {
        let mut agents = self.agents.write().await;
        agents.insert(agent.id.0.clone(), agent);
    }
}

#[async_trait::async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        let agents = self.agents.read().await;
        Ok(agents.get(&id.0).cloned())
    }

    async fn set_status(&self, id: &AgentId, status: AgentStatus) -> Result<(), RepositoryError> {
        let mut agents = self.agents.write().await;
        if let Some(agent) = agents.get_mut(&id.0) {
            agent.status = status;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: RwLock<Vec<Message>>,
}

impl InMemoryMessageRepository {
    pub async fn count(&self, conversation_id: &ConversationId) -> usize {
        let messages = self.messages.read().await;
        messages.iter().filter(|m| m.conversation_id == *conversation_id).count()
    }
}

#[async_trait::async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(
        &self,
        conversation_id: &ConversationId,
        role: MessageRole,
        content: &str,
    ) -> Result<(), RepositoryError> {
        let mut messages = self.messages.write().await;
        messages.push(Message {
            conversation_id: conversation_id.clone(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let messages = self.messages.read().await;
        Ok(messages.iter().filter(|m| m.conversation_id == *conversation_id).cloned().collect())
    }
}

/// Shares the message fake so that status transitions can inject their
/// system note, as the SQL repository does inside one transaction.
pub struct InMemoryConversationRepository {
    conversations: RwLock<Vec<Conversation>>,
    messages: Arc<InMemoryMessageRepository>,
}

impl InMemoryConversationRepository {
    pub fn new(messages: Arc<InMemoryMessageRepository>) -> Self {
        Self { conversations: RwLock::new(Vec::new()), messages }
    }
}

#[async_trait::async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn find_latest(
        &self,
        agent_id: &AgentId,
        visitor_id: &VisitorId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .iter()
            .filter(|c| c.agent_id == *agent_id && c.visitor_id == *visitor_id)
            .max_by_key(|c| c.started_at)
            .cloned())
    }

    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let conversations = self.conversations.read().await;
        Ok(conversations.iter().find(|c| c.id == *id).cloned())
    }

    async fn create(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        conversations.push(conversation);
        Ok(())
    }

    async fn transition(
        &self,
        id: &ConversationId,
        next: ConversationStatus,
    ) -> Result<(), RepositoryError> {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .iter_mut()
            .find(|c| c.id == *id)
            .ok_or_else(|| RepositoryError::ConversationNotFound(id.0.clone()))?;

        let note = transition_note(conversation.status, next).ok_or(
            DomainError::InvalidConversationTransition { from: conversation.status, to: next },
        )?;

        conversation.status = next;
        drop(conversations);

        self.messages.append(id, MessageRole::Agent, note).await
    }
}

#[derive(Default)]
pub struct InMemoryCreditLedgerGateway {
    balances: RwLock<HashMap<String, i64>>,
    usage: RwLock<Vec<(String, i64, String)>>,
}

impl InMemoryCreditLedgerGateway {
    pub async fn set_balance(&self, account_id: &AccountId, balance: i64) {
        let mut balances = self.balances.write().await;
        balances.insert(account_id.0.clone(), balance);
    }

    pub async fn usage_entries(&self) -> usize {
        self.usage.read().await.len()
    }
}

#[async_trait::async_trait]
impl CreditLedgerGateway for InMemoryCreditLedgerGateway {
    async fn balance(&self, account_id: &AccountId) -> Result<Option<i64>, RepositoryError> {
        let balances = self.balances.read().await;
        Ok(balances.get(&account_id.0).copied())
    }

    async fn decrement(
        &self,
        account_id: &AccountId,
        amount: i64,
        description: &str,
    ) -> Result<Option<i64>, RepositoryError> {
        let mut balances = self.balances.write().await;
        let Some(balance) = balances.get_mut(&account_id.0) else {
            return Ok(None);
        };

        *balance = (*balance - amount).max(0);
        let remaining = *balance;
        drop(balances);

        let mut usage = self.usage.write().await;
        usage.push((account_id.0.clone(), amount, description.to_string()));

        Ok(Some(remaining))
    }
}

#[derive(Default)]
pub struct InMemoryOwnerProfileRepository {
    profiles: RwLock<HashMap<String, OwnerProfile>>,
}

impl InMemoryOwnerProfileRepository {
    pub async fn put(&self, profile: OwnerProfile) {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.account_id.0.clone(), profile);
    }
}

#[async_trait::async_trait]
impl OwnerProfileRepository for InMemoryOwnerProfileRepository {
    async fn find_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<OwnerProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&account_id.0).cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use convey_core::domain::agent::AgentId;
    use convey_core::domain::conversation::{
        Conversation, ConversationStatus, VisitorId, VisitorInfo,
    };
    use convey_core::domain::message::MessageRole;

    use crate::repositories::{
        ConversationRepository, InMemoryConversationRepository, InMemoryMessageRepository,
        MessageRepository, RepositoryError,
    };

    #[tokio::test]
    async fn in_memory_transition_matches_sql_semantics() {
        let messages = Arc::new(InMemoryMessageRepository::default());
        let repo = InMemoryConversationRepository::new(Arc::clone(&messages));

        let conversation = Conversation::open(
            AgentId("agent-1".to_string()),
            VisitorId("visitor-1".to_string()),
            VisitorInfo::default(),
        );
        repo.create(conversation.clone()).await.expect("create");

        repo.transition(&conversation.id, ConversationStatus::HumanTakeover)
            .await
            .expect("takeover");

        let listed = messages.list(&conversation.id).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].role, MessageRole::Agent);

        let error = repo
            .transition(&conversation.id, ConversationStatus::HumanTakeover)
            .await
            .expect_err("takeover -> takeover should fail");
        assert!(matches!(error, RepositoryError::Domain(_)));
    }
}
