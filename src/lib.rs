//! # CSV Search
//!
//! Upload CSV files, store each row as a searchable JSON document in
//! PostgreSQL, and browse them with paginated full-text search.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────┐   ┌────────────┐
//! │  Upload  │──▶│  CsvRowStream │──▶│ BatchWriter │──▶│ PostgreSQL │
//! │ (HTTP)   │   │  (pull-based) │   │ (5000/tx)   │   │ JSONB+FTS  │
//! └──────────┘   └──────────────┘   └─────────────┘   └─────┬──────┘
//!                                                          │
//!                           ┌──────────────────────────────┘
//!                           ▼
//!                    ┌─────────────┐
//!                    │ /api/search │
//!                    └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`parser`] | Streaming CSV parser |
//! | [`batch`] | Transactional batch writer |
//! | [`ingest`] | Backpressure coordinator |
//! | [`search`] | Paginated full-text query service |
//! | [`store`] | Row store trait and in-memory backend |
//! | [`pg_store`] | PostgreSQL row store |
//! | [`source`] | Upload byte sources (gzip/zstd) |
//! | [`server`] | HTTP API and browser UI |
//! | [`config`] | TOML + environment configuration |
//! | [`db`] | Shared connection pool |
//! | [`migrate`] | Schema bootstrap |

pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod parser;
pub mod pg_store;
pub mod search;
pub mod server;
pub mod source;
pub mod store;
