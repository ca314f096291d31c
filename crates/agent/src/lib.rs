//! Conversation orchestration: the control flow between the stores, the
//! external AI responder, and the owner notification side-channel.

pub mod dispatch;
pub mod orchestrator;

pub use dispatch::{DispatchClient, DispatchError, DispatchReply, DispatchRequest, HttpDispatchClient};
pub use orchestrator::{InboundReply, Orchestrator, OrchestrateError, Outcome};
