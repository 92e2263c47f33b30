use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};
use tracing::info;

use crate::config::Config;
use crate::domain::ports::{EmailJobRepository, EmailSender};
use crate::domain::services::delivery::DeliveryService;
use crate::domain::services::recovery::{RecoveryConfig, RecoveryService};
use crate::infra::email::http_email_sender::HttpEmailSender;
use crate::infra::repositories::{
    postgres_email_job_repo::PostgresEmailJobRepo, sqlite_email_job_repo::SqliteEmailJobRepo,
};
use crate::state::AppState;

pub async fn bootstrap_state(config: &Config) -> AppState {
    let email_sender: Arc<dyn EmailSender> = Arc::new(HttpEmailSender::new(
        config.mail_api_url.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
    ));

    let database_url = &config.database_url;
    let job_repo: Arc<dyn EmailJobRepository> = if database_url.starts_with("postgres://")
        || database_url.starts_with("postgresql://")
    {
        info!("Initializing PostgreSQL connection...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .expect("Failed to connect to Postgres");

        run_postgres_migrations(&pool).await;

        Arc::new(PostgresEmailJobRepo::new(pool))
    } else {
        info!("Initializing SQLite connection with WAL Mode...");

        let opts = SqliteConnectOptions::from_str(database_url)
            .expect("Invalid SQLite connection string")
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .expect("Failed to connect to SQLite");

        run_sqlite_migrations(&pool).await;

        Arc::new(SqliteEmailJobRepo::new(pool))
    };

    let delivery_service = Arc::new(DeliveryService::new(job_repo.clone(), email_sender.clone()));
    let recovery_service = Arc::new(RecoveryService::new(
        job_repo.clone(),
        email_sender.clone(),
        delivery_service.clone(),
        RecoveryConfig::from_app_config(config),
    ));

    AppState {
        config: config.clone(),
        job_repo,
        email_sender,
        delivery_service,
        recovery_service,
    }
}

async fn run_postgres_migrations(pool: &PgPool) {
    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .expect("Failed to run Postgres migrations");
}

async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}
