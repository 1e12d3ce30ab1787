//! Data types shared by ingestion, search, and the HTTP layer.

use serde::{Deserialize, Serialize};

/// One parsed CSV record: header name to cell value, in header order.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A stored row as returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: i64,
    pub data: serde_json::Value,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub rows: Vec<Row>,
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Rows committed to the store.
    pub rows: u64,
    /// Number of batch transactions performed.
    pub batches: u64,
}
