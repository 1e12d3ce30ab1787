//! Process-wide PostgreSQL connection pool.
//!
//! The pool is created on first access and reused for the lifetime of the
//! process. Connections are opened lazily, acquired per flush or per query,
//! and returned to the pool as soon as the statement completes.

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::DbConfig;

static POOL: OnceLock<PgPool> = OnceLock::new();

pub fn connect_options(db: &DbConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&db.host)
        .port(db.port)
        .database(&db.name)
        .username(&db.user)
        .password(&db.password)
}

pub fn pool_options(db: &DbConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(db.max_connections)
        .acquire_timeout(Duration::from_secs(db.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(db.idle_timeout_secs))
}

/// The shared pool, built from `db` on the first call.
///
/// Later calls return the same pool regardless of their argument. Must be
/// called from within a Tokio runtime.
pub fn shared_pool(db: &DbConfig) -> &'static PgPool {
    POOL.get_or_init(|| pool_options(db).connect_lazy_with(connect_options(db)))
}
