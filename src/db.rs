//! Store connection: pool setup, health check, shutdown, and the mapping
//! from `sqlx` failures onto the [`SkillError`] taxonomy.

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

use skillbank_core::{Result, SkillError};

use crate::config::DbConfig;

/// Outcome of a successful [`health_check`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthReport {
    pub status: String,
    pub sqlite_version: String,
    pub result: i64,
}

/// Open a pooled connection to the database at `config.path`, creating
/// the file and its parent directory if needed.
pub async fn connect(config: &DbConfig) -> Result<SqlitePool> {
    let db_path = &config.path;

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SkillError::Connectivity(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .map_err(|e| SkillError::Connectivity(format!("invalid database path: {e}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(|e| {
            SkillError::Connectivity(format!("cannot open {}: {e}", db_path.display()))
        })?;

    tracing::debug!(path = %db_path.display(), "database pool opened");
    Ok(pool)
}

/// Trivial round trip proving the database answers.
pub async fn health_check(pool: &SqlitePool) -> Result<HealthReport> {
    let (result, sqlite_version): (i64, String) =
        sqlx::query_as("SELECT 1, sqlite_version()")
            .fetch_one(pool)
            .await
            .map_err(|e| match store_err(e) {
                SkillError::Storage(msg) => SkillError::Connectivity(msg),
                other => other,
            })?;

    Ok(HealthReport {
        status: "ok".to_string(),
        sqlite_version,
        result,
    })
}

/// `skb health`: print the health report as JSON.
pub async fn run_health(config: &crate::config::Config) -> anyhow::Result<()> {
    let pool = connect(&config.db).await?;
    let report = health_check(&pool).await;
    close(&pool).await;
    println!("{}", serde_json::to_string_pretty(&report?)?);
    Ok(())
}

/// Release the pool. Subsequent queries fail with a connectivity error.
pub async fn close(pool: &SqlitePool) {
    pool.close().await;
    tracing::debug!("database pool closed");
}

/// Classify a `sqlx` error.
pub(crate) fn store_err(err: sqlx::Error) -> SkillError {
    match &err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::WorkerCrashed => SkillError::Connectivity(err.to_string()),
        sqlx::Error::Database(db) => {
            let msg = db.message();
            if msg.contains("no such table") || msg.contains("no such module") {
                SkillError::MissingIndex(msg.to_string())
            } else if msg.contains("database is locked") || msg.contains("unable to open") {
                SkillError::Connectivity(msg.to_string())
            } else {
                SkillError::Storage(msg.to_string())
            }
        }
        _ => SkillError::Storage(err.to_string()),
    }
}
