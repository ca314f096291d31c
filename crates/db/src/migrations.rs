use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "agent",
        "conversation",
        "message",
        "credit_ledger",
        "usage_log",
        "owner_profile",
        "idx_agent_account_id",
        "idx_conversation_agent_visitor",
        "idx_message_conversation_id",
        "idx_usage_log_account_id",
    ];

    #[tokio::test]
    async fn migrations_create_baseline_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = ? AND type IN ('table', 'index')",
            )
            .bind(*object)
            .fetch_one(&pool)
            .await
            .expect("check schema object");

            assert_eq!(count, 1, "expected schema object `{object}` after migrations");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
    }
}
