//! # SQLite database methods
//!
//! This module contains the "low-level" SQLite interactions, one module per table group.
//!
//! All interactions are plain functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers obtain a connection from the pool, or begin a
//! transaction and pass `&mut *tx`, and compose these functions without any other changes. That
//! is how the engine keeps multi-row flows (order + items + payment + commission, debit +
//! payment, settle + side effect) atomic.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod catalog;
pub mod commissions;
pub mod contracts;
pub mod orders;
pub mod payments;

const SQLITE_DB_URL: &str = "sqlite://data/campus_eats.db";

pub fn db_url() -> String {
    let result = env::var("CE_DATABASE_URL").unwrap_or_else(|_| {
        info!("CE_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    // Wait out transient write-lock contention instead of failing immediately with SQLITE_BUSY.
    let options = SqliteConnectOptions::from_str(url)?
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Delete)
        .busy_timeout(Duration::from_secs(5));
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
