mod models;

pub use models::*;

use anyhow::Result;
use rand::Rng;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

pub type DbPool = SqlitePool;

/// Generate a store-assigned document id: 24 lowercase hex characters.
///
/// Ids of this shape always match the `[0-9a-z]{8,24}` segment the router
/// accepts on by-id routes.
pub fn new_document_id() -> String {
    let bytes: [u8; 12] = rand::rng().random();
    hex::encode(bytes)
}

/// Open the SQLite database in `data_dir` and run migrations.
///
/// This is the single place a connection is established; the returned pool
/// is passed down through `AppState`. A failure here is fatal and propagates
/// out of `main` — it is never converted into an HTTP response.
pub async fn init(data_dir: &Path) -> Result<DbPool> {
    let db_path = data_dir.join("webshop.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    info!("Initializing database at {}", db_path.display());

    let pool = connect(&db_url).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// Connect to the given SQLite URL and bring the schema up to date.
pub async fn connect(db_url: &str) -> Result<DbPool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await?;

    // Enable WAL mode for better concurrency
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Execute a SQL migration file, properly handling comments
async fn execute_sql(pool: &SqlitePool, sql: &str) -> Result<()> {
    for statement in sql.split(';') {
        // Strip SQL comment lines (lines starting with --)
        let cleaned: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = cleaned.trim();
        if !trimmed.is_empty() {
            sqlx::query(trimmed).execute(pool).await?;
        }
    }
    Ok(())
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    info!("Running database migrations...");

    // Migration 001: users, products and orders tables
    execute_sql(pool, include_str!("../../migrations/001_initial.sql")).await?;

    info!("Migrations completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_ids_match_route_shape() {
        let re = regex::Regex::new(r"^[0-9a-z]{8,24}$").unwrap();
        for _ in 0..32 {
            let id = new_document_id();
            assert_eq!(id.len(), 24);
            assert!(re.is_match(&id), "unexpected id {id}");
        }
    }

    #[tokio::test]
    async fn migrations_run_on_fresh_database() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init(dir.path()).await.unwrap();
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);

        // Running migrations again is a no-op
        let pool2 = init(dir.path()).await.unwrap();
        drop(pool);
        drop(pool2);
    }
}
