//! Ingestion coordinator.
//!
//! Drives the streaming parser into the batch writer with a two-state
//! backpressure loop:
//!
//! ```text
//!            batch full                    flush ok
//! RUNNING ───────────────▶ FLUSHING ───────────────▶ RUNNING
//!    │                        │
//!    │ end of input           │ flush failed
//!    ▼                        ▼
//! final flush ──▶ done      abort
//! ```
//!
//! While FLUSHING the parser is not polled, so the upload body is not read
//! and at most one batch of rows is held in memory. Batches are written
//! strictly in the order they fill. The first parse or insert error ends the
//! upload: the parser is dropped, rows parsed since the last successful flush
//! are discarded, and earlier batches stay committed.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::AsyncRead;
use tracing::{debug, info};

use crate::batch::BatchWriter;
use crate::config::{Config, IngestConfig};
use crate::db;
use crate::error::IngestError;
use crate::models::IngestSummary;
use crate::parser::{CsvRowStream, ParserOptions};
use crate::pg_store::PgStore;
use crate::source;
use crate::store::RowStore;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Rows per batch; reaching it triggers a flush.
    pub batch_size: usize,
    pub parser: ParserOptions,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for IngestOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            parser: ParserOptions { trim: config.trim },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    /// Parser producing, rows being appended.
    Running,
    /// Parser paused while a batch is written.
    Flushing,
}

struct Coordinator<'s, R> {
    rows: CsvRowStream<R>,
    writer: BatchWriter<'s>,
    state: IngestState,
}

impl<'s, R> Coordinator<'s, R>
where
    R: AsyncRead + Unpin + Send,
{
    fn enter(&mut self, next: IngestState) {
        debug!(from = ?self.state, to = ?next, pending = self.writer.len(), "ingest state");
        self.state = next;
    }

    async fn run(mut self) -> Result<IngestSummary, IngestError> {
        while let Some(doc) = self.rows.next_row().await? {
            self.writer.append(doc);
            if self.writer.is_full() {
                self.enter(IngestState::Flushing);
                self.writer.flush().await?;
                self.enter(IngestState::Running);
            }
        }

        self.writer.flush().await?;
        Ok(IngestSummary {
            rows: self.writer.committed(),
            batches: self.writer.flushes(),
        })
    }
}

/// Parse CSV from `input` and insert every row into `store`.
///
/// Returns the committed row count on success, or the first error. No retry
/// is attempted; a failed upload must be restarted from the beginning.
pub async fn ingest_csv<R>(
    store: &dyn RowStore,
    input: R,
    options: &IngestOptions,
) -> Result<IngestSummary, IngestError>
where
    R: AsyncRead + Unpin + Send,
{
    let coordinator = Coordinator {
        rows: CsvRowStream::new(input, &options.parser),
        writer: BatchWriter::new(store, options.batch_size),
        state: IngestState::Running,
    };
    coordinator.run().await
}

/// `csv-search import <file>`: ingest a local CSV (optionally .gz / .zst).
pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let store = PgStore::new(db::shared_pool(&config.db).clone());
    store
        .ensure_schema()
        .await
        .context("failed to bootstrap schema")?;

    let reader = source::open_file(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;

    let options = IngestOptions::from(&config.ingest);
    let summary = ingest_csv(&store, reader, &options)
        .await
        .with_context(|| format!("import of {} failed", path.display()))?;

    info!(file = %path.display(), rows = summary.rows, batches = summary.batches, "import finished");
    println!("import {}", path.display());
    println!("  rows inserted: {}", summary.rows);
    println!("  batches: {}", summary.batches);
    println!("ok");
    Ok(())
}
