use crate::config::AppConfig;
use crate::entities::{case_documents, case_images, case_info, cases, sessions, users};
use crate::infrastructure::storage::ensure_writable_dir;
use anyhow::Context;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, Schema, SqlxSqliteConnector, Statement, TransactionTrait,
};
use sqlx::ConnectOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);",
    "CREATE INDEX IF NOT EXISTS idx_cases_owner_id ON cases(owner_id);",
    "CREATE INDEX IF NOT EXISTS idx_case_info_case_owner ON case_info(case_id, owner_id);",
    "CREATE INDEX IF NOT EXISTS idx_case_images_case_owner ON case_images(case_id, owner_id);",
    "CREATE INDEX IF NOT EXISTS idx_case_documents_case_owner ON case_documents(case_id, owner_id);",
];

pub async fn setup_database(config: &AppConfig) -> anyhow::Result<DatabaseConnection> {
    ensure_writable_dir(&config.data_dir)
        .await
        .with_context(|| format!("data directory {} is not writable", config.data_dir.display()))?;

    info!("📂 Database: {}", config.database_url);

    let db = connect(config).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

/// Opens the SQLite pool. Production runs with `synchronous=FULL`, development with `NORMAL`.
pub async fn connect(config: &AppConfig) -> anyhow::Result<DatabaseConnection> {
    let synchronous = if config.mode.is_production() {
        SqliteSynchronous::Full
    } else {
        SqliteSynchronous::Normal
    };

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .with_context(|| format!("invalid database url {}", config.database_url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(synchronous)
        .busy_timeout(Duration::from_secs(config.db_busy_timeout_secs))
        .foreign_keys(true)
        .log_statements(log::LevelFilter::Debug);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect_with(options)
        .await
        .context("failed to open SQLite database")?;

    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

/// Creates tables and indexes inside one transaction; any failing statement rolls back the lot.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("🔄 Running schema migrations...");
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = vec![
        schema
            .create_table_from_entity(users::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(sessions::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(cases::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(case_info::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(case_images::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(case_documents::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    let mut stmts: Vec<Statement> = tables.iter().map(|t| builder.build(t)).collect();
    stmts.extend(
        INDEXES
            .iter()
            .map(|sql| Statement::from_string(builder, sql.to_string())),
    );

    let txn = db.begin().await?;
    for stmt in stmts {
        if let Err(e) = txn.execute(stmt).await {
            txn.rollback().await?;
            return Err(anyhow::anyhow!("Migration failed, rolled back: {}", e));
        }
    }
    txn.commit().await?;

    info!("✅ Schema is up to date");
    Ok(())
}
