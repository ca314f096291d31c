use sqlx::Row;

use convey_core::domain::agent::AccountId;
use convey_core::domain::profile::OwnerProfile;

use super::{OwnerProfileRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOwnerProfileRepository {
    pool: DbPool,
}

impl SqlOwnerProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<OwnerProfile, RepositoryError> {
    let account_id: String =
        row.try_get("account_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String = row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let full_name: Option<String> =
        row.try_get("full_name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let notify_new_conversation: i64 = row
        .try_get("notify_new_conversation")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(OwnerProfile {
        account_id: AccountId(account_id),
        email,
        full_name,
        notify_new_conversation: notify_new_conversation != 0,
    })
}

#[async_trait::async_trait]
impl OwnerProfileRepository for SqlOwnerProfileRepository {
    async fn find_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<OwnerProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT account_id, email, full_name, notify_new_conversation
             FROM owner_profile WHERE account_id = ?",
        )
        .bind(&account_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_profile(r)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use convey_core::domain::agent::AccountId;

    use super::SqlOwnerProfileRepository;
    use crate::fixtures;
    use crate::repositories::OwnerProfileRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn find_by_account_round_trip() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        fixtures::seed_demo(&pool).await.expect("seed");

        let repo = SqlOwnerProfileRepository::new(pool);

        let profile = repo
            .find_by_account(&AccountId(fixtures::DEMO_ACCOUNT_ID.to_string()))
            .await
            .expect("find")
            .expect("profile should exist");
        assert!(profile.notify_new_conversation);
        assert!(profile.email.contains('@'));

        let missing =
            repo.find_by_account(&AccountId("acct-unknown".to_string())).await.expect("find");
        assert!(missing.is_none());
    }
}
