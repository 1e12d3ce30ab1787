//! In-memory [`RowStore`] for tests and local demos.
//!
//! Searchable text is the set of lowercase alphanumeric tokens of the
//! serialized document, and a query matches when every one of its tokens is
//! present. This mirrors PostgreSQL's `simple` text search configuration
//! closely enough for pagination and filtering tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::Row;

use super::{RowStore, RowWindow};

struct StoredRow {
    id: i64,
    data: serde_json::Value,
    terms: HashSet<String>,
}

#[derive(Default)]
struct Table {
    rows: Vec<StoredRow>,
    last_id: i64,
}

/// In-memory store with optional failure injection.
pub struct InMemoryStore {
    table: RwLock<Table>,
    insert_calls: AtomicU64,
    fail_on_insert: Option<u64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table::default()),
            insert_calls: AtomicU64::new(0),
            fail_on_insert: None,
        }
    }

    /// A store whose `n`-th call to `insert_batch` (1-based) is rejected.
    pub fn failing_on_insert(n: u64) -> Self {
        Self {
            fail_on_insert: Some(n),
            ..Self::new()
        }
    }

    /// Number of `insert_batch` calls made, including rejected ones.
    pub fn insert_calls(&self) -> u64 {
        self.insert_calls.load(Ordering::SeqCst)
    }

    /// Number of committed rows.
    pub fn len(&self) -> usize {
        self.read().map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All committed documents in id order.
    pub fn documents(&self) -> Vec<serde_json::Value> {
        self.read()
            .map(|t| t.rows.iter().map(|r| r.data.clone()).collect())
            .unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Table>, StoreError> {
        self.table
            .read()
            .map_err(|_| StoreError::Rejected("row table lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Table>, StoreError> {
        self.table
            .write()
            .map_err(|_| StoreError::Rejected("row table lock poisoned".into()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl RowStore for InMemoryStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_batch(&self, docs: &[String]) -> Result<u64, StoreError> {
        let call = self.insert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_insert == Some(call) {
            return Err(StoreError::Rejected(format!(
                "injected failure on insert {}",
                call
            )));
        }

        // Decode everything before touching the table so a bad document
        // leaves it unchanged.
        let mut parsed = Vec::with_capacity(docs.len());
        for doc in docs {
            let data: serde_json::Value = serde_json::from_str(doc)
                .map_err(|e| StoreError::Rejected(format!("invalid document: {}", e)))?;
            parsed.push((data, tokenize(doc)));
        }

        let mut table = self.write()?;
        for (data, terms) in parsed {
            table.last_id += 1;
            let id = table.last_id;
            table.rows.push(StoredRow { id, data, terms });
        }
        Ok(docs.len() as u64)
    }

    async fn search(
        &self,
        query: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<RowWindow, StoreError> {
        let wanted = query.map(tokenize);
        let table = self.read()?;

        let matching: Vec<&StoredRow> = table
            .rows
            .iter()
            .filter(|row| match &wanted {
                None => true,
                Some(terms) => !terms.is_empty() && terms.is_subset(&row.terms),
            })
            .collect();

        let rows = matching
            .iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|row| Row {
                id: row.id,
                data: row.data.clone(),
            })
            .collect();

        Ok(RowWindow {
            total: matching.len() as i64,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(values: &[&str]) -> Vec<String> {
        values
            .iter()
            .map(|v| serde_json::json!({ "name": v }).to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_ids_increase_across_batches() {
        let store = InMemoryStore::new();
        store.insert_batch(&docs(&["a", "b"])).await.unwrap();
        store.insert_batch(&docs(&["c"])).await.unwrap();

        let window = store.search(None, 10, 0).await.unwrap();
        let ids: Vec<i64> = window.rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(window.total, 3);
    }

    #[tokio::test]
    async fn test_injected_failure_commits_nothing() {
        let store = InMemoryStore::failing_on_insert(2);
        store.insert_batch(&docs(&["a"])).await.unwrap();
        assert!(store.insert_batch(&docs(&["b", "c"])).await.is_err());
        store.insert_batch(&docs(&["d"])).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.insert_calls(), 3);
    }

    #[tokio::test]
    async fn test_invalid_document_rejects_whole_batch() {
        let store = InMemoryStore::new();
        let batch = vec![r#"{"ok":"1"}"#.to_string(), "not json".to_string()];
        assert!(store.insert_batch(&batch).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_search_requires_all_terms() {
        let store = InMemoryStore::new();
        store
            .insert_batch(&docs(&["red apple", "green apple", "red car"]))
            .await
            .unwrap();

        assert_eq!(store.search(Some("apple"), 10, 0).await.unwrap().total, 2);
        assert_eq!(store.search(Some("Red Apple"), 10, 0).await.unwrap().total, 1);
        assert_eq!(store.search(Some("!!"), 10, 0).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_window_past_end_is_empty() {
        let store = InMemoryStore::new();
        store.insert_batch(&docs(&["a", "b"])).await.unwrap();
        let window = store.search(None, 10, 20).await.unwrap();
        assert!(window.rows.is_empty());
        assert_eq!(window.total, 2);
    }
}
