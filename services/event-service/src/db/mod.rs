//! Database layer for the event service.
//!
//! This module provides:
//! - Connection pool management
//! - Migrations and dev-mode seeding
//! - The user event repository used by the HTTP API
//!
//! The database layer uses SQLx with Postgres. Account cleanup goes through
//! [`crate::store`] instead, which wraps a transaction per session.

mod error;
mod user_events;

pub use error::StoreError;
pub use user_events::{NewUserEvent, UserEventRepo, UserEventRow, UserEventUpdate};

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

use crate::store::PgRecordStore;

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of idle connections.
    pub min_connections: u32,

    /// Connection acquire timeout.
    pub acquire_timeout: Duration,

    /// Idle connection timeout.
    pub idle_timeout: Duration,

    /// Maximum lifetime of a connection.
    pub max_lifetime: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/pridr".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl DbConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/pridr".to_string());

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Self {
            database_url,
            max_connections,
            min_connections,
            ..Default::default()
        }
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    pub async fn connect(config: &DbConfig) -> Result<Self, StoreError> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .max_lifetime(Some(config.max_lifetime))
            .connect(&config.database_url)
            .await
            .map_err(StoreError::Connect)?;

        info!("Database connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(())
    }

    /// Run pending migrations.
    ///
    /// Production schemas are managed by the deployment; this is for dev mode
    /// and integration tests.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        info!("Running database migrations");

        let candidates = vec![
            std::path::PathBuf::from("./migrations"),
            std::path::PathBuf::from("services/event-service/migrations"),
            std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        ];
        let mut last_error: Option<sqlx::migrate::MigrateError> = None;

        for dir in &candidates {
            match sqlx::migrate::Migrator::new(dir.clone()).await {
                Ok(migrator) => {
                    info!(migrations_dir = %dir.display(), "Loaded migrations");
                    migrator.run(&self.pool).await.map_err(StoreError::Migration)?;
                    info!("Database migrations complete");
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        let tried = candidates
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        Err(StoreError::MigrationDirNotFound {
            tried,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    /// Insert demo rows when the table is empty. Returns how many were added.
    pub async fn seed_if_empty(&self) -> Result<u64, StoreError> {
        let repo = self.user_events();
        if repo.count().await? > 0 {
            info!("User events already present, skipping seed");
            return Ok(0);
        }

        info!("Seeding user events");
        let now = chrono::Utc::now();
        let seeds = [
            ("Test-Event-1", vec![1, 2, 3], "KeycloakUserId-1"),
            ("Test-Event-2", vec![4, 2, 6], "KeycloakUserId-2"),
        ];

        let mut tx = self.pool.begin().await.map_err(StoreError::Begin)?;
        for (name, profile_ids, created_by) in seeds {
            sqlx::query(
                r#"
                INSERT INTO user_events (name, date, profile_ids, created_by)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(name)
            .bind(now)
            .bind(profile_ids)
            .bind(created_by)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::Query)?;
        }
        tx.commit().await.map_err(StoreError::Commit)?;

        Ok(2)
    }

    /// Get a user event repository handle.
    pub fn user_events(&self) -> UserEventRepo {
        UserEventRepo::new(self.pool.clone())
    }

    /// Get a record store for owner-scoped cleanup sessions.
    pub fn record_store(&self) -> PgRecordStore {
        PgRecordStore::new(self.pool.clone())
    }
}
