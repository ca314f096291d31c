use std::sync::Arc;

use convey_agent::dispatch::{DispatchError, HttpDispatchClient};
use convey_agent::orchestrator::Orchestrator;
use convey_core::config::{AppConfig, ConfigError, LoadOptions};
use convey_db::repositories::{
    SqlAgentRepository, SqlConversationRepository, SqlCreditLedgerGateway, SqlMessageRepository,
    SqlOwnerProfileRepository,
};
use convey_db::{connect_with_settings, migrations, DbPool};
use convey_notify::{NoopChannel, NotificationDispatcher, NotifyChannel, WebhookChannel};
use thiserror::Error;
use tracing::info;

use crate::console::ConsoleState;
use crate::widget::WidgetState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub widget_state: WidgetState,
    pub console_state: ConsoleState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("dispatch client setup failed: {0}")]
    Dispatch(#[source] DispatchError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let agents = Arc::new(SqlAgentRepository::new(db_pool.clone()));
    let conversations = Arc::new(SqlConversationRepository::new(db_pool.clone()));
    let messages = Arc::new(SqlMessageRepository::new(db_pool.clone()));
    let credits = Arc::new(SqlCreditLedgerGateway::new(db_pool.clone()));
    let profiles = Arc::new(SqlOwnerProfileRepository::new(db_pool.clone()));

    let dispatch =
        Arc::new(HttpDispatchClient::new(&config.dispatch).map_err(BootstrapError::Dispatch)?);

    let channel: Arc<dyn NotifyChannel> = match &config.notify.webhook_url {
        Some(url) => Arc::new(WebhookChannel::new(url.clone())),
        None => Arc::new(NoopChannel),
    };
    let notifier = Arc::new(NotificationDispatcher::new(profiles, channel));

    let orchestrator = Arc::new(Orchestrator::new(
        agents.clone(),
        conversations.clone(),
        messages.clone(),
        credits,
        dispatch,
        notifier,
        config.notify.low_credit_threshold,
    ));

    let widget_state = WidgetState {
        orchestrator,
        agents: agents.clone(),
        conversations: conversations.clone(),
        messages: messages.clone(),
    };
    let console_state = ConsoleState { conversations, messages };

    Ok(Application { config, db_pool, widget_state, console_state })
}

#[cfg(test)]
mod tests {
    use convey_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn in_memory_options() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_runs_migrations_and_wires_the_data_path() {
        let app = bootstrap(in_memory_options()).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('agent', 'conversation', 'message', 'credit_ledger')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected baseline tables after bootstrap");
        assert_eq!(table_count, 4, "bootstrap should expose the conversation-path tables");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_dispatch_url() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                dispatch_webhook_url: Some("not-a-url".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("dispatch.webhook_url"));
    }
}
