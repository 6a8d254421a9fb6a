//! Postgres record store: one transaction per session.

use async_trait::async_trait;
use pridr_id::{AccountId, UserEventId};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::{OwnedRecord, RecordSession, RecordStore};
use crate::db::StoreError;

/// Record store backed by the `user_events` table.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn begin(&self) -> Result<Box<dyn RecordSession>, StoreError> {
        let tx = self.pool.begin().await.map_err(StoreError::Begin)?;
        Ok(Box::new(PgRecordSession { tx: Some(tx) }))
    }
}

/// Session over a single transaction; dropping it uncommitted rolls back.
pub struct PgRecordSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgRecordSession {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::SessionClosed)
    }
}

#[async_trait]
impl RecordSession for PgRecordSession {
    async fn exists_by_owner(&mut self, owner: &AccountId) -> Result<bool, StoreError> {
        let tx = self.tx()?;
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM user_events WHERE created_by = $1)")
            .bind(owner.as_str())
            .fetch_one(&mut **tx)
            .await
            .map_err(StoreError::Query)
    }

    async fn find_all_by_owner(
        &mut self,
        owner: &AccountId,
    ) -> Result<Vec<OwnedRecord>, StoreError> {
        let tx = self.tx()?;
        let ids: Vec<i32> =
            sqlx::query_scalar("SELECT id FROM user_events WHERE created_by = $1 ORDER BY id")
                .bind(owner.as_str())
                .fetch_all(&mut **tx)
                .await
                .map_err(StoreError::Query)?;

        Ok(ids
            .into_iter()
            .map(|id| OwnedRecord {
                id: UserEventId::new(id),
                owner_id: owner.clone(),
            })
            .collect())
    }

    async fn delete(&mut self, id: UserEventId) -> Result<(), StoreError> {
        let tx = self.tx()?;
        let result = sqlx::query("DELETE FROM user_events WHERE id = $1")
            .bind(id.value())
            .execute(&mut **tx)
            .await
            .map_err(StoreError::Query)?;
        debug!(id = %id, rows = result.rows_affected(), "Staged user event delete");
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::SessionClosed)?;
        tx.commit().await.map_err(StoreError::Commit)
    }
}
