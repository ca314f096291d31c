//! Deterministic demo data for local development and tests.

use chrono::Utc;

use crate::DbPool;

pub const DEMO_ACCOUNT_ID: &str = "acct-demo";
pub const DEMO_AGENT_ID: &str = "agent-demo";
pub const DEMO_CREDIT_BALANCE: i64 = 25;

/// Seed one active agent, its owner profile, and a funded credit ledger row.
/// Safe to call more than once.
pub async fn seed_demo(pool: &DbPool) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO agent
            (id, account_id, name, status, system_prompt, routing_key,
             fallback_message, fallback_email, welcome_message, require_email, created_at)
         VALUES (?, ?, 'Demo Assistant', 'active',
                 'You are a friendly support assistant for the demo store.',
                 ?, NULL, 'owner@demo.test', 'Hi! How can I help you today?', 0, ?)
         ON CONFLICT(id) DO NOTHING",
    )
    .bind(DEMO_AGENT_ID)
    .bind(DEMO_ACCOUNT_ID)
    .bind(DEMO_AGENT_ID)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO credit_ledger (account_id, balance, updated_at)
         VALUES (?, ?, ?)
         ON CONFLICT(account_id) DO NOTHING",
    )
    .bind(DEMO_ACCOUNT_ID)
    .bind(DEMO_CREDIT_BALANCE)
    .bind(&now)
    .execute(pool)
    .await?;

    sqlx::query(
        "INSERT INTO owner_profile (account_id, email, full_name, notify_new_conversation)
         VALUES (?, 'owner@demo.test', 'Demo Owner', 1)
         ON CONFLICT(account_id) DO NOTHING",
    )
    .bind(DEMO_ACCOUNT_ID)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::seed_demo;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn seeding_twice_is_safe() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        seed_demo(&pool).await.expect("first seed");
        seed_demo(&pool).await.expect("second seed");

        let agent_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agent")
            .fetch_one(&pool)
            .await
            .expect("count agents");
        assert_eq!(agent_count, 1);
    }
}
