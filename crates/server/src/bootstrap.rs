//! Startup wiring: config, database pool, migrations, and the submit
//! service with its real dependencies.

use std::sync::Arc;

use sqlx::migrate::MigrateError;
use thiserror::Error;
use tracing::info;

use teamcoach_core::config::{AppConfig, ConfigError, LoadOptions};
use teamcoach_db::{connect, migrations, DbPool, SqlHistoryRepository};
use teamcoach_inference::HttpInferenceClient;

use crate::submit::SubmitService;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to connect to the database: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(#[from] MigrateError),
    #[error("failed to build the inference HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub submit: Arc<SubmitService>,
    pub history: Arc<SqlHistoryRepository>,
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool =
        connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    migrations::run_pending(&db_pool).await?;
    info!(
        event_name = "bootstrap.database_ready",
        url = %config.database.url,
        "database connected and migrated"
    );

    let inference = Arc::new(HttpInferenceClient::from_config(&config.inference)?);
    info!(
        event_name = "bootstrap.inference_client_ready",
        base_url = %config.inference.base_url,
        default_model = %config.inference.default_model,
        timeout_secs = config.inference.timeout_secs,
        "inference client configured"
    );

    let history = Arc::new(SqlHistoryRepository::new(db_pool.clone()));
    let submit = Arc::new(SubmitService::new(
        history.clone(),
        inference,
        config.quota.daily_limit,
        config.inference.default_model.clone(),
    ));

    Ok(Application { config, db_pool, submit, history })
}

#[cfg(test)]
mod tests {
    use teamcoach_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    #[tokio::test]
    async fn bootstrap_prepares_the_schema() {
        let options = LoadOptions {
            config_path: None,
            require_file: false,
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
        };

        let app = bootstrap(options).await.expect("bootstrap succeeds");

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'query_history'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query runs");
        assert_eq!(count, 1);
    }
}
