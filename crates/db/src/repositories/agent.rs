use chrono::{DateTime, Utc};
use sqlx::Row;

use convey_core::domain::agent::{AccountId, Agent, AgentId, AgentStatus};

use super::{AgentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAgentRepository {
    pool: DbPool,
}

impl SqlAgentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> AgentStatus {
    match s {
        "active" => AgentStatus::Active,
        "paused" => AgentStatus::Paused,
        "archived" => AgentStatus::Archived,
        _ => AgentStatus::Draft,
    }
}

pub fn agent_status_as_str(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Active => "active",
        AgentStatus::Paused => "paused",
        AgentStatus::Draft => "draft",
        AgentStatus::Archived => "archived",
    }
}

fn row_to_agent(row: &sqlx::sqlite::SqliteRow) -> Result<Agent, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let account_id: String =
        row.try_get("account_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let system_prompt: String =
        row.try_get("system_prompt").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let routing_key: String =
        row.try_get("routing_key").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let fallback_message: Option<String> =
        row.try_get("fallback_message").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let fallback_email: Option<String> =
        row.try_get("fallback_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let welcome_message: Option<String> =
        row.try_get("welcome_message").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let avatar_url: Option<String> =
        row.try_get("avatar_url").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let widget_color: Option<String> =
        row.try_get("widget_color").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let widget_position: Option<String> =
        row.try_get("widget_position").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let require_email: i64 =
        row.try_get("require_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Agent {
        id: AgentId(id),
        account_id: AccountId(account_id),
        name,
        status: parse_status(&status_str),
        system_prompt,
        routing_key,
        fallback_message,
        fallback_email,
        welcome_message,
        avatar_url,
        widget_color,
        widget_position,
        require_email: require_email != 0,
        created_at,
    })
}

#[async_trait::async_trait]
impl AgentRepository for SqlAgentRepository {
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, account_id, name, status, system_prompt, routing_key,
                    fallback_message, fallback_email, welcome_message, avatar_url,
                    widget_color, widget_position, require_email, created_at
             FROM agent WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_agent(r)?)),
            None => Ok(None),
        }
    }

    async fn set_status(&self, id: &AgentId, status: AgentStatus) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE agent SET status = ? WHERE id = ?")
            .bind(agent_status_as_str(status))
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
