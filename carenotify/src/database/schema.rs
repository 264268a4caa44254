//! Database schema and migrations
//!
//! Applies versioned SQL migrations on top of a `migrations` bookkeeping
//! table. Each migration runs in its own transaction.

use crate::error::Result;
use sqlx::{sqlite::SqlitePool, Row};

/// Initialize database with schema
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    // Enable foreign keys
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    // Create migrations table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Get current version
    let current_version: i32 = sqlx::query("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?
        .get(0);

    tracing::info!("Current database version: {}", current_version);

    // Apply migrations
    apply_migrations(pool, current_version).await?;

    tracing::info!("Database initialization complete");
    Ok(())
}

async fn apply_migrations(pool: &SqlitePool, current_version: i32) -> Result<()> {
    for (version, sql) in get_migrations() {
        if version <= current_version {
            continue;
        }

        tracing::info!("Applying migration version {}", version);

        // Execute migration in a transaction
        let mut tx = pool.begin().await?;

        // Run migration SQL
        for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        // Record migration
        sqlx::query("INSERT INTO migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Migration version {} applied successfully", version);
    }

    Ok(())
}

fn get_migrations() -> Vec<(i32, &'static str)> {
    vec![(1, include_str!("migrations/001_initial_schema.sql"))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_memory_pool;

    #[tokio::test]
    async fn test_initialize_database() {
        let pool = create_memory_pool().await.unwrap();

        let version: i32 = sqlx::query_scalar("SELECT MAX(version) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(version, 1);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for table in [
            "emergency_contacts",
            "health_reports",
            "medicines",
            "notifications",
            "schedules",
            "users",
        ] {
            assert!(tables.iter().any(|t| t == table), "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let pool = create_memory_pool().await.unwrap();

        initialize_database(&pool).await.unwrap();

        let applied: i32 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let pool = create_memory_pool().await.unwrap();

        let foreign_keys: i32 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(foreign_keys, 1);
    }
}
