use async_trait::async_trait;
use thiserror::Error;

use convey_core::domain::agent::{AccountId, Agent, AgentId, AgentStatus};
use convey_core::domain::conversation::{
    Conversation, ConversationId, ConversationStatus, VisitorId,
};
use convey_core::domain::message::{Message, MessageRole};
use convey_core::domain::profile::OwnerProfile;
use convey_core::errors::DomainError;

pub mod agent;
pub mod conversation;
pub mod credit;
pub mod memory;
pub mod message;
pub mod profile;

pub use agent::SqlAgentRepository;
pub use conversation::SqlConversationRepository;
pub use credit::SqlCreditLedgerGateway;
pub use memory::{
    InMemoryAgentRepository, InMemoryConversationRepository, InMemoryCreditLedgerGateway,
    InMemoryMessageRepository, InMemoryOwnerProfileRepository,
};
pub use message::SqlMessageRepository;
pub use profile::SqlOwnerProfileRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conversation `{0}` not found")]
    ConversationNotFound(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Read access to agent configuration plus the single status write this core
/// performs (auto-pause on credit exhaustion).
#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError>;

    /// Idempotent status write.
    async fn set_status(&self, id: &AgentId, status: AgentStatus) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Most recently started conversation for the (agent, visitor) pair,
    /// regardless of status.
    async fn find_latest(
        &self,
        agent_id: &AgentId,
        visitor_id: &VisitorId,
    ) -> Result<Option<Conversation>, RepositoryError>;

    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError>;

    async fn create(&self, conversation: Conversation) -> Result<(), RepositoryError>;

    /// Validated status transition. Writes the new status and appends the
    /// corresponding system message in one transaction.
    async fn transition(
        &self,
        id: &ConversationId,
        next: ConversationStatus,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn append(
        &self,
        conversation_id: &ConversationId,
        role: MessageRole,
        content: &str,
    ) -> Result<(), RepositoryError>;

    /// Messages in append order, oldest first.
    async fn list(&self, conversation_id: &ConversationId)
        -> Result<Vec<Message>, RepositoryError>;
}

/// Reads and best-effort decrements of the per-account usage balance.
#[async_trait]
pub trait CreditLedgerGateway: Send + Sync {
    /// `None` when the account has no balance record at all, which callers
    /// treat differently from a zero balance.
    async fn balance(&self, account_id: &AccountId) -> Result<Option<i64>, RepositoryError>;

    /// Atomic decrement clamped at zero, with a usage-log append. Returns
    /// the remaining balance, or `None` when no balance record exists (the
    /// decrement is then a no-op).
    async fn decrement(
        &self,
        account_id: &AccountId,
        amount: i64,
        description: &str,
    ) -> Result<Option<i64>, RepositoryError>;
}

#[async_trait]
pub trait OwnerProfileRepository: Send + Sync {
    async fn find_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<OwnerProfile>, RepositoryError>;
}
