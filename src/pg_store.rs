//! PostgreSQL-backed [`RowStore`].
//!
//! Documents are stored as `JSONB` next to a `TSVECTOR` computed with the
//! `simple` configuration from the document's JSON text. Both are written by
//! the same `INSERT ... SELECT`, so a row never exists without its search
//! representation.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row as _};
use tokio::sync::OnceCell;

use crate::error::StoreError;
use crate::migrate;
use crate::models::Row;
use crate::store::{RowStore, RowWindow};

pub struct PgStore {
    pool: PgPool,
    schema: OnceCell<()>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema: OnceCell::new(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RowStore for PgStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.schema
            .get_or_try_init(|| migrate::create_schema(&self.pool))
            .await?;
        Ok(())
    }

    async fn insert_batch(&self, docs: &[String]) -> Result<u64, StoreError> {
        if docs.is_empty() {
            return Ok(0);
        }

        // Dropping `tx` on any error path rolls the batch back.
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO csv_rows (data, ts)
            SELECT elem::jsonb, to_tsvector('simple', elem)
            FROM unnest($1::text[]) AS elem
            "#,
        )
        .bind(docs)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }

    async fn search(
        &self,
        query: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<RowWindow, StoreError> {
        let mut conn = self.pool.acquire().await?;

        let (total, rows) = match query {
            Some(q) => {
                let total: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*)::bigint FROM csv_rows WHERE ts @@ plainto_tsquery('simple', $1)",
                )
                .bind(q)
                .fetch_one(&mut *conn)
                .await?;
                let rows = sqlx::query(
                    r#"
                    SELECT id, data FROM csv_rows
                    WHERE ts @@ plainto_tsquery('simple', $1)
                    ORDER BY id
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(q)
                .bind(limit)
                .bind(offset)
                .fetch_all(&mut *conn)
                .await?;
                (total, rows)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*)::bigint FROM csv_rows")
                    .fetch_one(&mut *conn)
                    .await?;
                let rows = sqlx::query("SELECT id, data FROM csv_rows ORDER BY id LIMIT $1 OFFSET $2")
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&mut *conn)
                    .await?;
                (total, rows)
            }
        };

        let rows = rows
            .iter()
            .map(|row| {
                let Json(data): Json<serde_json::Value> = row.try_get("data")?;
                Ok(Row {
                    id: row.try_get("id")?,
                    data,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(RowWindow { total, rows })
    }
}
