//! Application state shared across request handlers.

use std::sync::Arc;

use tokio::sync::watch;

use crate::bus::SubscriptionState;
use crate::db::Database;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    db: Database,
    subscription: watch::Receiver<SubscriptionState>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(db: Database, subscription: watch::Receiver<SubscriptionState>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { db, subscription }),
        }
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    /// Latest state of the message bus subscription.
    pub fn subscription_state(&self) -> SubscriptionState {
        *self.inner.subscription.borrow()
    }
}
