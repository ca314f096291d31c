use chrono::Utc;

use convey_core::domain::agent::AccountId;

use super::{CreditLedgerGateway, RepositoryError};
use crate::DbPool;

pub struct SqlCreditLedgerGateway {
    pool: DbPool,
}

impl SqlCreditLedgerGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CreditLedgerGateway for SqlCreditLedgerGateway {
    async fn balance(&self, account_id: &AccountId) -> Result<Option<i64>, RepositoryError> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM credit_ledger WHERE account_id = ?")
                .bind(&account_id.0)
                .fetch_optional(&self.pool)
                .await?;

        Ok(balance)
    }

    async fn decrement(
        &self,
        account_id: &AccountId,
        amount: i64,
        description: &str,
    ) -> Result<Option<i64>, RepositoryError> {
        let now = Utc::now().to_rfc3339();

        // Single conditional update clamped at zero; concurrent decrements
        // for the same account must not lose units or go negative.
        let result = sqlx::query(
            "UPDATE credit_ledger SET balance = MAX(balance - ?, 0), updated_at = ?
             WHERE account_id = ?",
        )
        .bind(amount)
        .bind(&now)
        .bind(&account_id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        sqlx::query(
            "INSERT INTO usage_log (account_id, amount, description, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&account_id.0)
        .bind(amount)
        .bind(description)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.balance(account_id).await
    }
}

#[cfg(test)]
mod tests {
    use convey_core::domain::agent::AccountId;

    use super::SqlCreditLedgerGateway;
    use crate::fixtures;
    use crate::repositories::CreditLedgerGateway;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        fixtures::seed_demo(&pool).await.expect("seed");
        pool
    }

    fn demo_account() -> AccountId {
        AccountId(fixtures::DEMO_ACCOUNT_ID.to_string())
    }

    #[tokio::test]
    async fn balance_distinguishes_missing_record_from_zero() {
        let gateway = SqlCreditLedgerGateway::new(setup().await);

        let seeded = gateway.balance(&demo_account()).await.expect("balance");
        assert_eq!(seeded, Some(fixtures::DEMO_CREDIT_BALANCE));

        let missing = gateway.balance(&AccountId("acct-unknown".to_string())).await.expect("balance");
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn decrement_consumes_one_unit_and_logs_usage() {
        let pool = setup().await;
        let gateway = SqlCreditLedgerGateway::new(pool.clone());

        let remaining = gateway
            .decrement(&demo_account(), 1, "Public chat - demo agent")
            .await
            .expect("decrement");
        assert_eq!(remaining, Some(fixtures::DEMO_CREDIT_BALANCE - 1));

        let (amount, description): (i64, String) = sqlx::query_as(
            "SELECT amount, description FROM usage_log WHERE account_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(fixtures::DEMO_ACCOUNT_ID)
        .fetch_one(&pool)
        .await
        .expect("usage log row");
        assert_eq!(amount, 1);
        assert!(description.contains("demo agent"));
    }

    #[tokio::test]
    async fn decrement_clamps_at_zero() {
        let pool = setup().await;
        let gateway = SqlCreditLedgerGateway::new(pool);

        let remaining = gateway
            .decrement(&demo_account(), fixtures::DEMO_CREDIT_BALANCE + 100, "overdraw")
            .await
            .expect("decrement");
        assert_eq!(remaining, Some(0));

        let after = gateway.decrement(&demo_account(), 1, "empty").await.expect("decrement");
        assert_eq!(after, Some(0));
    }

    #[tokio::test]
    async fn decrement_of_missing_account_is_a_noop() {
        let gateway = SqlCreditLedgerGateway::new(setup().await);

        let remaining = gateway
            .decrement(&AccountId("acct-unknown".to_string()), 1, "noop")
            .await
            .expect("decrement");
        assert_eq!(remaining, None);
    }
}
