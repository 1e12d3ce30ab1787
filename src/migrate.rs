//! Schema bootstrap for the PostgreSQL row store.
//!
//! Every statement is `IF NOT EXISTS`, so running it any number of times
//! leaves exactly one table and one GIN index.

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::db;

pub const ROWS_TABLE: &str = "csv_rows";
pub const SEARCH_INDEX: &str = "idx_csv_rows_gin";

pub async fn create_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS csv_rows (
            id BIGSERIAL PRIMARY KEY,
            data JSONB NOT NULL,
            ts TSVECTOR
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_csv_rows_gin ON csv_rows USING GIN (ts)")
        .execute(pool)
        .await?;

    Ok(())
}

/// `csv-search init`: create the schema in the configured database.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::shared_pool(&config.db);
    create_schema(pool).await.with_context(|| {
        format!(
            "failed to bootstrap schema in {}@{}:{}/{}",
            config.db.user, config.db.host, config.db.port, config.db.name
        )
    })?;
    info!(table = ROWS_TABLE, index = SEARCH_INDEX, "schema ready");
    println!("database initialized");
    Ok(())
}
