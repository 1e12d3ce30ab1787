//! Row Store abstraction.
//!
//! The [`RowStore`] trait is everything ingestion and search need from the
//! backing database, so the pipeline can run against PostgreSQL
//! ([`PgStore`](crate::pg_store::PgStore)) or the in-memory backend used in
//! tests ([`memory::InMemoryStore`]).
//!
//! Implementations must be `Send + Sync` to be shared across request
//! handlers.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::Row;

/// Matching row count plus one window of rows, ordered by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowWindow {
    pub total: i64,
    pub rows: Vec<Row>,
}

/// Durable storage for ingested rows.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_schema`](RowStore::ensure_schema) | Idempotent schema bootstrap |
/// | [`insert_batch`](RowStore::insert_batch) | All-or-nothing bulk insert |
/// | [`search`](RowStore::search) | Full-text filtered, id-ordered window |
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Create tables and indexes if they do not exist. Safe to call repeatedly.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Insert serialized JSON documents in a single transaction.
    ///
    /// Each row's searchable text is derived in the same statement. Either
    /// every document is committed or none is. Returns the number of rows
    /// inserted.
    async fn insert_batch(&self, docs: &[String]) -> Result<u64, StoreError>;

    /// Count rows matching `query` and return `limit` of them after
    /// skipping `offset`, ordered by id ascending. `None` matches all rows.
    async fn search(
        &self,
        query: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<RowWindow, StoreError>;
}
