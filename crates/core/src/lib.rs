pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::agent::{AccountId, Agent, AgentId, AgentStatus, DEFAULT_FALLBACK_MESSAGE};
pub use domain::conversation::{
    Conversation, ConversationId, ConversationStatus, VisitorId, VisitorInfo,
};
pub use domain::message::{Message, MessageRole};
pub use domain::profile::OwnerProfile;
pub use errors::DomainError;
