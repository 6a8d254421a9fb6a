//! In-memory record store with fault injection, for tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pridr_id::{AccountId, UserEventId};

use super::{OwnedRecord, RecordSession, RecordStore};
use crate::db::StoreError;

/// Step at which the store can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Begin,
    Exists,
    Find,
    Delete,
    Commit,
}

#[derive(Default)]
struct Inner {
    records: BTreeMap<UserEventId, OwnedRecord>,
    fail_once: Option<FailPoint>,
    commits: usize,
}

impl Inner {
    fn trip(&mut self, point: FailPoint) -> Result<(), StoreError> {
        if self.fail_once == Some(point) {
            self.fail_once = None;
            return Err(StoreError::Injected(match point {
                FailPoint::Begin => "begin",
                FailPoint::Exists => "exists",
                FailPoint::Find => "find",
                FailPoint::Delete => "delete",
                FailPoint::Commit => "commit",
            }));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRecordStore {
    /// Store seeded with `(id, owner)` pairs.
    pub fn with_records(records: &[(i32, &str)]) -> Self {
        let store = Self::default();
        {
            let mut inner = store.inner.lock().unwrap();
            for (id, owner) in records {
                let id = UserEventId::new(*id);
                inner.records.insert(
                    id,
                    OwnedRecord {
                        id,
                        owner_id: AccountId::parse(owner).unwrap(),
                    },
                );
            }
        }
        store
    }

    /// Fail the next call that reaches `point`.
    pub fn fail_once(&self, point: FailPoint) {
        self.inner.lock().unwrap().fail_once = Some(point);
    }

    /// Committed records as `(id, owner)` pairs, ordered by id.
    pub fn snapshot(&self) -> Vec<(i32, String)> {
        self.inner
            .lock()
            .unwrap()
            .records
            .values()
            .map(|r| (r.id.value(), r.owner_id.to_string()))
            .collect()
    }

    pub fn commits(&self) -> usize {
        self.inner.lock().unwrap().commits
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn begin(&self) -> Result<Box<dyn RecordSession>, StoreError> {
        self.inner.lock().unwrap().trip(FailPoint::Begin)?;
        Ok(Box::new(MemorySession {
            inner: Arc::clone(&self.inner),
            staged: Vec::new(),
            finished: false,
        }))
    }
}

struct MemorySession {
    inner: Arc<Mutex<Inner>>,
    staged: Vec<UserEventId>,
    finished: bool,
}

impl MemorySession {
    fn open(&self) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::SessionClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl RecordSession for MemorySession {
    async fn exists_by_owner(&mut self, owner: &AccountId) -> Result<bool, StoreError> {
        self.open()?;
        let mut inner = self.inner.lock().unwrap();
        inner.trip(FailPoint::Exists)?;
        Ok(inner.records.values().any(|r| &r.owner_id == owner))
    }

    async fn find_all_by_owner(
        &mut self,
        owner: &AccountId,
    ) -> Result<Vec<OwnedRecord>, StoreError> {
        self.open()?;
        let mut inner = self.inner.lock().unwrap();
        inner.trip(FailPoint::Find)?;
        Ok(inner
            .records
            .values()
            .filter(|r| &r.owner_id == owner)
            .cloned()
            .collect())
    }

    async fn delete(&mut self, id: UserEventId) -> Result<(), StoreError> {
        self.open()?;
        self.inner.lock().unwrap().trip(FailPoint::Delete)?;
        self.staged.push(id);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.open()?;
        self.finished = true;
        let mut inner = self.inner.lock().unwrap();
        inner.trip(FailPoint::Commit)?;
        for id in self.staged.drain(..) {
            inner.records.remove(&id);
        }
        inner.commits += 1;
        Ok(())
    }
}
