use chrono::{DateTime, Utc};
use sqlx::Row;

use convey_core::domain::agent::AgentId;
use convey_core::domain::conversation::{
    transition_note, Conversation, ConversationId, ConversationStatus, VisitorId,
};
use convey_core::domain::message::MessageRole;
use convey_core::errors::DomainError;

use super::{ConversationRepository, RepositoryError};
use crate::repositories::message::message_role_as_str;
use crate::DbPool;

pub struct SqlConversationRepository {
    pool: DbPool,
}

impl SqlConversationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> ConversationStatus {
    match s {
        "human_takeover" => ConversationStatus::HumanTakeover,
        "resolved" => ConversationStatus::Resolved,
        _ => ConversationStatus::Active,
    }
}

pub fn conversation_status_as_str(status: ConversationStatus) -> &'static str {
    match status {
        ConversationStatus::Active => "active",
        ConversationStatus::HumanTakeover => "human_takeover",
        ConversationStatus::Resolved => "resolved",
    }
}

fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let agent_id: String =
        row.try_get("agent_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let visitor_id: String =
        row.try_get("visitor_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let visitor_name: Option<String> =
        row.try_get("visitor_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let visitor_email: Option<String> =
        row.try_get("visitor_email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let started_at_str: String =
        row.try_get("started_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let started_at = DateTime::parse_from_rfc3339(&started_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    Ok(Conversation {
        id: ConversationId(id),
        agent_id: AgentId(agent_id),
        visitor_id: VisitorId(visitor_id),
        visitor_name,
        visitor_email,
        status: parse_status(&status_str),
        started_at,
    })
}

#[async_trait::async_trait]
impl ConversationRepository for SqlConversationRepository {
    async fn find_latest(
        &self,
        agent_id: &AgentId,
        visitor_id: &VisitorId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, agent_id, visitor_id, visitor_name, visitor_email, status, started_at
             FROM conversation
             WHERE agent_id = ? AND visitor_id = ?
             ORDER BY started_at DESC, id DESC
             LIMIT 1",
        )
        .bind(&agent_id.0)
        .bind(&visitor_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_conversation(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_id(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, agent_id, visitor_id, visitor_name, visitor_email, status, started_at
             FROM conversation WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_conversation(r)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, conversation: Conversation) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO conversation
                (id, agent_id, visitor_id, visitor_name, visitor_email, status, started_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id.0)
        .bind(&conversation.agent_id.0)
        .bind(&conversation.visitor_id.0)
        .bind(&conversation.visitor_name)
        .bind(&conversation.visitor_email)
        .bind(conversation_status_as_str(conversation.status))
        .bind(conversation.started_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn transition(
        &self,
        id: &ConversationId,
        next: ConversationStatus,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let status_str: Option<String> =
            sqlx::query_scalar("SELECT status FROM conversation WHERE id = ?")
                .bind(&id.0)
                .fetch_optional(&mut *tx)
                .await?;

        let current = match status_str {
            Some(value) => parse_status(&value),
            None => return Err(RepositoryError::ConversationNotFound(id.0.clone())),
        };

        let note = transition_note(current, next).ok_or(DomainError::InvalidConversationTransition {
            from: current,
            to: next,
        })?;

        sqlx::query("UPDATE conversation SET status = ? WHERE id = ?")
            .bind(conversation_status_as_str(next))
            .bind(&id.0)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO message (conversation_id, role, content, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(message_role_as_str(MessageRole::Agent))
        .bind(note)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use convey_core::domain::agent::AgentId;
    use convey_core::domain::conversation::{
        Conversation, ConversationId, ConversationStatus, VisitorId, VisitorInfo,
    };

    use super::SqlConversationRepository;
    use crate::fixtures;
    use crate::repositories::{ConversationRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        fixtures::seed_demo(&pool).await.expect("seed");
        pool
    }

    fn open_conversation(visitor: &str) -> Conversation {
        Conversation::open(
            AgentId(fixtures::DEMO_AGENT_ID.to_string()),
            VisitorId(visitor.to_string()),
            VisitorInfo { name: Some("Pat".to_string()), email: None },
        )
    }

    #[tokio::test]
    async fn create_and_find_latest_round_trip() {
        let repo = SqlConversationRepository::new(setup().await);
        let conversation = open_conversation("visitor-1");

        repo.create(conversation.clone()).await.expect("create");
        let found = repo
            .find_latest(&conversation.agent_id, &conversation.visitor_id)
            .await
            .expect("find latest")
            .expect("should exist");

        assert_eq!(found.id, conversation.id);
        assert_eq!(found.status, ConversationStatus::Active);
        assert_eq!(found.visitor_name.as_deref(), Some("Pat"));
    }

    #[tokio::test]
    async fn find_latest_prefers_most_recently_started() {
        let repo = SqlConversationRepository::new(setup().await);

        let mut first = open_conversation("visitor-1");
        first.started_at = first.started_at - chrono::Duration::minutes(5);
        let second = open_conversation("visitor-1");

        repo.create(first).await.expect("create first");
        repo.create(second.clone()).await.expect("create second");

        let found = repo
            .find_latest(&second.agent_id, &second.visitor_id)
            .await
            .expect("find latest")
            .expect("should exist");

        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn transition_writes_status_and_one_system_message() {
        let pool = setup().await;
        let repo = SqlConversationRepository::new(pool.clone());
        let conversation = open_conversation("visitor-1");
        repo.create(conversation.clone()).await.expect("create");

        repo.transition(&conversation.id, ConversationStatus::HumanTakeover)
            .await
            .expect("takeover");

        let found = repo.find_by_id(&conversation.id).await.expect("find").expect("exists");
        assert_eq!(found.status, ConversationStatus::HumanTakeover);

        let message_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM message WHERE conversation_id = ?")
                .bind(&conversation.id.0)
                .fetch_one(&pool)
                .await
                .expect("count messages");
        assert_eq!(message_count, 1);

        let (role, content): (String, String) = sqlx::query_as(
            "SELECT role, content FROM message WHERE conversation_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(&conversation.id.0)
        .fetch_one(&pool)
        .await
        .expect("fetch system message");
        assert_eq!(role, "agent");
        assert!(content.contains("human operator"));
    }

    #[tokio::test]
    async fn transition_rejects_illegal_move_without_writing() {
        let pool = setup().await;
        let repo = SqlConversationRepository::new(pool.clone());
        let conversation = open_conversation("visitor-1");
        repo.create(conversation.clone()).await.expect("create");

        repo.transition(&conversation.id, ConversationStatus::Resolved).await.expect("resolve");
        let error = repo
            .transition(&conversation.id, ConversationStatus::HumanTakeover)
            .await
            .expect_err("resolved -> takeover should fail");
        assert!(matches!(error, RepositoryError::Domain(_)));

        let found = repo.find_by_id(&conversation.id).await.expect("find").expect("exists");
        assert_eq!(found.status, ConversationStatus::Resolved);

        // only the resolve note was written
        let message_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM message WHERE conversation_id = ?")
                .bind(&conversation.id.0)
                .fetch_one(&pool)
                .await
                .expect("count messages");
        assert_eq!(message_count, 1);
    }

    #[tokio::test]
    async fn transition_of_unknown_conversation_fails() {
        let repo = SqlConversationRepository::new(setup().await);

        let error = repo
            .transition(&ConversationId("missing".to_string()), ConversationStatus::Resolved)
            .await
            .expect_err("unknown conversation");
        assert!(matches!(error, RepositoryError::ConversationNotFound(_)));
    }

    #[tokio::test]
    async fn reopen_returns_resolved_conversation_to_active() {
        let repo = SqlConversationRepository::new(setup().await);
        let conversation = open_conversation("visitor-1");
        repo.create(conversation.clone()).await.expect("create");

        repo.transition(&conversation.id, ConversationStatus::Resolved).await.expect("resolve");
        repo.transition(&conversation.id, ConversationStatus::Active).await.expect("reopen");

        let found = repo.find_by_id(&conversation.id).await.expect("find").expect("exists");
        assert_eq!(found.status, ConversationStatus::Active);
    }
}
