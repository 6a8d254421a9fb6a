//! Database error types.

use thiserror::Error;

/// Record store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to open a transaction.
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// Failed to commit staged changes.
    #[error("commit failed: {0}")]
    Commit(#[source] sqlx::Error),

    /// A session was used after it was committed.
    #[error("session already committed")]
    SessionClosed,

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}. Run from repo root or services/event-service.")]
    MigrationDirNotFound { tried: String, last_error: String },

    /// Failure injected by the in-memory store.
    #[cfg(test)]
    #[error("injected failure: {0}")]
    Injected(&'static str),
}
