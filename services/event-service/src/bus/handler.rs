//! Per-delivery handling: decode, classify, dispatch.

use std::sync::Arc;

use pridr_events::{routing_action, EventKind, Notification};
use tracing::{debug, info, instrument, warn};

use crate::cleanup::{cleanup_owner, CleanupOutcome};
use crate::store::RecordStore;

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// The body could not be decoded; handled as `Undetermined`.
    Undecodable,
    /// A kind with no handler.
    Ignored(EventKind),
    /// An account deletion that names no account.
    MissingAccount,
    /// An account deletion ran the cleanup workflow.
    Cleanup(CleanupOutcome),
}

/// Dispatches decoded notifications. Never fails: every path ends in a log
/// line and an outcome.
#[derive(Clone)]
pub struct NotificationHandler {
    store: Arc<dyn RecordStore>,
}

impl NotificationHandler {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(routing_key = %routing_key))]
    pub async fn handle(&self, routing_key: &str, body: &[u8]) -> HandleOutcome {
        debug!(bytes = body.len(), "Notification received");

        let notification = match Notification::decode(body) {
            Ok(notification) => notification,
            Err(e) => {
                warn!(
                    error = %e,
                    routing_action = %routing_action(routing_key),
                    "Undecodable notification, treating as undetermined"
                );
                return HandleOutcome::Undecodable;
            }
        };

        let kind = notification.kind();
        match kind {
            EventKind::AccountDeleted => self.on_account_deleted(&notification).await,
            EventKind::Login | EventKind::Logout | EventKind::Register => {
                debug!(
                    kind = %kind,
                    account_id = ?notification.account_id().map(|id| id.as_str()),
                    "Account event detected, no action"
                );
                HandleOutcome::Ignored(kind)
            }
            EventKind::Undetermined => {
                info!(
                    event_type = %notification.event_type(),
                    "Other event detected, ignoring"
                );
                HandleOutcome::Ignored(kind)
            }
        }
    }

    async fn on_account_deleted(&self, notification: &Notification) -> HandleOutcome {
        let Some(account_id) = notification.account_id() else {
            warn!(
                client_id = ?notification.client_id(),
                "Delete account event without a usable user id, ignoring"
            );
            return HandleOutcome::MissingAccount;
        };

        info!(
            account_id = %account_id,
            realm_id = ?notification.realm_id(),
            occurred_at = ?notification.occurred_at(),
            "Delete account event detected"
        );
        HandleOutcome::Cleanup(cleanup_owner(account_id, self.store.as_ref()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRecordStore;
    use rstest::rstest;

    const DELETE_KEY: &str = "KK.EVENT.CLIENT.pridr.SUCCESS.pridr-web.DELETE_ACCOUNT";

    fn handler(store: &MemoryRecordStore) -> NotificationHandler {
        NotificationHandler::new(Arc::new(store.clone()))
    }

    fn seeded() -> MemoryRecordStore {
        MemoryRecordStore::with_records(&[(1, "U1"), (2, "U1"), (3, "U2")])
    }

    #[tokio::test]
    async fn test_delete_account_removes_owned_records() {
        let store = seeded();

        let outcome = handler(&store)
            .handle(DELETE_KEY, br#"{"type":"DELETE_ACCOUNT","userId":"U1"}"#)
            .await;

        assert_eq!(
            outcome,
            HandleOutcome::Cleanup(CleanupOutcome::Deleted { count: 2 })
        );
        assert_eq!(store.snapshot(), vec![(3, "U2".to_string())]);
    }

    #[tokio::test]
    async fn test_delete_unknown_account_is_noop() {
        let store = seeded();

        let outcome = handler(&store)
            .handle(DELETE_KEY, br#"{"type":"DELETE_ACCOUNT","userId":"U9"}"#)
            .await;

        assert_eq!(outcome, HandleOutcome::Cleanup(CleanupOutcome::NoOp));
        assert_eq!(store.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_without_account_is_ignored() {
        let store = seeded();

        let outcome = handler(&store)
            .handle(DELETE_KEY, br#"{"type":"DELETE_ACCOUNT"}"#)
            .await;

        assert_eq!(outcome, HandleOutcome::MissingAccount);
        assert_eq!(store.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_with_overlong_account_is_ignored() {
        let store = seeded();
        let body = serde_json::json!({
            "type": "DELETE_ACCOUNT",
            "userId": "U".repeat(101),
        })
        .to_string();

        let outcome = handler(&store).handle(DELETE_KEY, body.as_bytes()).await;

        assert_eq!(outcome, HandleOutcome::MissingAccount);
        assert_eq!(store.snapshot().len(), 3);
        assert_eq!(store.commits(), 0);
    }

    #[rstest]
    #[case(br#"{"type":"LOGIN","userId":"U1"}"#.as_slice(), HandleOutcome::Ignored(EventKind::Login))]
    #[case(br#"{"type":"LOGOUT","userId":"U1"}"#.as_slice(), HandleOutcome::Ignored(EventKind::Logout))]
    #[case(br#"{"type":"REGISTER","userId":"U1"}"#.as_slice(), HandleOutcome::Ignored(EventKind::Register))]
    #[case(br#"{"type":"PASSWORD_RESET","userId":"U1"}"#.as_slice(), HandleOutcome::Ignored(EventKind::Undetermined))]
    #[case(br#"{"type":"delete_account","userId":"U1"}"#.as_slice(), HandleOutcome::Ignored(EventKind::Undetermined))]
    #[case(br#"{"userId":"U1"}"#.as_slice(), HandleOutcome::Undecodable)]
    #[case(b"not json".as_slice(), HandleOutcome::Undecodable)]
    #[case(b"".as_slice(), HandleOutcome::Undecodable)]
    #[tokio::test]
    async fn test_non_delete_payloads_leave_store_untouched(
        #[case] body: &[u8],
        #[case] expected: HandleOutcome,
    ) {
        let store = seeded();

        let outcome = handler(&store).handle(DELETE_KEY, body).await;

        assert_eq!(outcome, expected);
        assert_eq!(store.snapshot().len(), 3);
        assert_eq!(store.commits(), 0);
    }
}
