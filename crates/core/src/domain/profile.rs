use serde::{Deserialize, Serialize};

use crate::domain::agent::AccountId;

/// Per-account owner record consulted by the notification dispatcher. A
/// missing record means notifications stay off.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub account_id: AccountId,
    pub email: String,
    pub full_name: Option<String>,
    pub notify_new_conversation: bool,
}

impl OwnerProfile {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or("Owner")
    }
}
