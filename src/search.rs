//! Query service: free-text search with server-side clamped pagination.
//!
//! Matching is delegated entirely to the store's text-search predicate over
//! each row's derived search column. Results are ordered by id; there is no
//! ranking, fuzzy matching, or highlighting.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::{Config, SearchConfig};
use crate::db;
use crate::error::StoreError;
use crate::models::SearchPage;
use crate::pg_store::PgStore;
use crate::store::RowStore;

/// Raw query-string parameters. Numbers are parsed leniently: anything that
/// is not a finite number falls back to the default.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

impl SearchParams {
    pub fn query(&self) -> Option<&str> {
        normalize_query(self.q.as_deref())
    }

    pub fn page_request(&self, config: &SearchConfig) -> PageRequest {
        PageRequest::clamped(
            parse_number(self.page.as_deref()),
            parse_number(self.page_size.as_deref()),
            config,
        )
    }
}

fn parse_number(raw: Option<&str>) -> Option<i64> {
    let value: f64 = raw?.trim().parse().ok()?;
    value.is_finite().then(|| value.trunc() as i64)
}

/// Trimmed search term; blank means "match everything".
pub fn normalize_query(q: Option<&str>) -> Option<&str> {
    q.map(str::trim).filter(|q| !q.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    /// Apply defaults and clamp: `page >= 1`, `page_size` in `[1, max_page_size]`.
    pub fn clamped(page: Option<i64>, page_size: Option<i64>, config: &SearchConfig) -> Self {
        let max = config.max_page_size.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(config.default_page_size)
                .clamp(1, max),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// Run one search and build its result page.
pub async fn search_rows(
    store: &dyn RowStore,
    query: Option<&str>,
    request: PageRequest,
) -> Result<SearchPage, StoreError> {
    let window = store
        .search(normalize_query(query), request.page_size, request.offset())
        .await?;

    Ok(SearchPage {
        page: request.page,
        page_size: request.page_size,
        total: window.total,
        rows: window.rows,
    })
}

/// `csv-search search`: print one page of results as JSON.
pub async fn run_search(
    config: &Config,
    query: Option<&str>,
    page: Option<i64>,
    page_size: Option<i64>,
) -> Result<()> {
    let store = PgStore::new(db::shared_pool(&config.db).clone());
    store
        .ensure_schema()
        .await
        .context("failed to bootstrap schema")?;

    let request = PageRequest::clamped(page, page_size, &config.search);
    let result = search_rows(&store, query, request)
        .await
        .context("search failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
