use chrono::{DateTime, Utc};
use sqlx::Row;

use convey_core::domain::conversation::ConversationId;
use convey_core::domain::message::{Message, MessageRole};

use super::{MessageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_role(s: &str) -> MessageRole {
    match s {
        "agent" => MessageRole::Agent,
        _ => MessageRole::Visitor,
    }
}

pub fn message_role_as_str(role: MessageRole) -> &'static str {
    match role {
        MessageRole::Visitor => "visitor",
        MessageRole::Agent => "agent",
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, RepositoryError> {
    let conversation_id: String =
        row.try_get("conversation_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role_str: String =
        row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let content: String =
        row.try_get("content").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Message {
        conversation_id: ConversationId(conversation_id),
        role: parse_role(&role_str),
        content,
        created_at,
    })
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn append(
        &self,
        conversation_id: &ConversationId,
        role: MessageRole,
        content: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO message (conversation_id, role, content, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&conversation_id.0)
        .bind(message_role_as_str(role))
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT conversation_id, role, content, created_at
             FROM message
             WHERE conversation_id = ?
             ORDER BY id ASC",
        )
        .bind(&conversation_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_message).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
mod tests {
    use convey_core::domain::agent::AgentId;
    use convey_core::domain::conversation::{Conversation, VisitorId, VisitorInfo};
    use convey_core::domain::message::MessageRole;

    use super::SqlMessageRepository;
    use crate::fixtures;
    use crate::repositories::{ConversationRepository, MessageRepository, SqlConversationRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> (sqlx::SqlitePool, Conversation) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        fixtures::seed_demo(&pool).await.expect("seed");

        let conversation = Conversation::open(
            AgentId(fixtures::DEMO_AGENT_ID.to_string()),
            VisitorId("visitor-1".to_string()),
            VisitorInfo::default(),
        );
        SqlConversationRepository::new(pool.clone())
            .create(conversation.clone())
            .await
            .expect("create conversation");

        (pool, conversation)
    }

    #[tokio::test]
    async fn append_and_list_preserves_order() {
        let (pool, conversation) = setup().await;
        let repo = SqlMessageRepository::new(pool);

        repo.append(&conversation.id, MessageRole::Visitor, "hi").await.expect("append visitor");
        repo.append(&conversation.id, MessageRole::Agent, "hello").await.expect("append agent");
        repo.append(&conversation.id, MessageRole::Visitor, "thanks").await.expect("append again");

        let messages = repo.list(&conversation.id).await.expect("list");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, MessageRole::Visitor);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, MessageRole::Agent);
        assert_eq!(messages[1].content, "hello");
        assert_eq!(messages[2].content, "thanks");
    }

    #[tokio::test]
    async fn list_of_empty_conversation_is_empty() {
        let (pool, conversation) = setup().await;
        let repo = SqlMessageRepository::new(pool);

        let messages = repo.list(&conversation.id).await.expect("list");
        assert!(messages.is_empty());
    }
}
