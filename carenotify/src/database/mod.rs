//! Database module
//!
//! This module provides all database functionality including:
//! - Schema and migrations
//! - Model definitions
//! - Repository layer for users, care records, notifications,
//!   emergency contacts and health reports

pub mod models;
pub mod repository;
pub mod schema;

pub use models::*;
pub use repository::Repository;
pub use schema::initialize_database;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Build connection options shared by migration and application connections.
fn connect_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display())).map(
        |opts| {
            opts.create_if_missing(true)
                .busy_timeout(Duration::from_secs(5))
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
        },
    )
}

/// Create and initialize a database connection pool.
///
/// Migrations run on a dedicated single-connection pool that is closed
/// before the application pool is created, so every pooled connection
/// sees the final schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Creating database connection pool at: {:?}", db_path);

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Run migrations on a single dedicated connection so every PRAGMA
    // and schema change happens on the same connection.
    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path)?)
        .await?;

    initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    // Application pool, opened after the schema is final
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options(db_path)?)
        .await?;

    tracing::info!("Database pool created successfully");

    Ok(pool)
}

/// Create an initialized in-memory database.
///
/// Every SQLite in-memory connection is its own database, so the pool is
/// pinned to a single connection that is never recycled.
pub async fn create_memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    initialize_database(&pool).await?;

    Ok(pool)
}
