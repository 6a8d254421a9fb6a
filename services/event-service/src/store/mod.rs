//! Owner-scoped record store gateway.
//!
//! Account cleanup never touches the pool directly. It opens a
//! [`RecordSession`] from a [`RecordStore`], stages its deletes there and
//! commits once. A session dropped without a successful commit discards
//! everything it staged, whichever way the caller leaves.

#[cfg(test)]
pub(crate) mod memory;
mod postgres;

pub use postgres::{PgRecordSession, PgRecordStore};

use async_trait::async_trait;
use pridr_id::{AccountId, UserEventId};

use crate::db::StoreError;

/// A stored record as seen by cleanup: its key and its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedRecord {
    pub id: UserEventId,
    pub owner_id: AccountId,
}

/// Opens record sessions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Acquire a session. Staged changes are visible only after `commit`.
    async fn begin(&self) -> Result<Box<dyn RecordSession>, StoreError>;
}

/// One unit of work against the record store.
#[async_trait]
pub trait RecordSession: Send {
    /// Whether any record is owned by `owner`.
    async fn exists_by_owner(&mut self, owner: &AccountId) -> Result<bool, StoreError>;

    /// All records owned by `owner`.
    async fn find_all_by_owner(&mut self, owner: &AccountId)
        -> Result<Vec<OwnedRecord>, StoreError>;

    /// Stage the deletion of one record.
    async fn delete(&mut self, id: UserEventId) -> Result<(), StoreError>;

    /// Apply every staged change atomically. The session is finished afterwards.
    async fn commit(&mut self) -> Result<(), StoreError>;
}
