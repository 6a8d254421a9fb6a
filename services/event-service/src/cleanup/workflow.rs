use pridr_id::AccountId;
use tracing::{error, info, instrument};

use crate::store::RecordStore;

/// Step of the cleanup workflow that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStage {
    Session,
    ExistenceCheck,
    Fetch,
    Delete,
    Commit,
}

impl std::fmt::Display for CleanupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CleanupStage::Session => "session",
            CleanupStage::ExistenceCheck => "existence_check",
            CleanupStage::Fetch => "fetch",
            CleanupStage::Delete => "delete",
            CleanupStage::Commit => "commit",
        };
        write!(f, "{}", s)
    }
}

/// Result of one cleanup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The owner has no records here.
    NoOp,
    /// All of the owner's records were deleted in one commit.
    Deleted { count: usize },
    /// Nothing was committed.
    Failed { stage: CleanupStage, reason: String },
}

impl CleanupOutcome {
    fn failed(stage: CleanupStage, err: impl std::fmt::Display) -> Self {
        CleanupOutcome::Failed {
            stage,
            reason: err.to_string(),
        }
    }
}

/// Delete every record owned by `owner`, committing once at the end.
///
/// Never returns an error: failures come back as [`CleanupOutcome::Failed`]
/// and leave the store untouched, since the session rolls back when it is
/// dropped uncommitted. There is no retry.
#[instrument(skip_all, fields(account_id = %owner))]
pub async fn cleanup_owner(owner: &AccountId, store: &dyn RecordStore) -> CleanupOutcome {
    let outcome = run(owner, store).await;

    match &outcome {
        CleanupOutcome::NoOp => {
            info!("Account owns no user events, nothing to remove");
        }
        CleanupOutcome::Deleted { count } => {
            info!(deleted = count, "Removed all user events of deleted account");
        }
        CleanupOutcome::Failed { stage, reason } => {
            error!(
                stage = %stage,
                error = %reason,
                "Could not remove user events of deleted account"
            );
        }
    }

    outcome
}

async fn run(owner: &AccountId, store: &dyn RecordStore) -> CleanupOutcome {
    let mut session = match store.begin().await {
        Ok(session) => session,
        Err(e) => return CleanupOutcome::failed(CleanupStage::Session, e),
    };

    match session.exists_by_owner(owner).await {
        Ok(true) => {}
        Ok(false) => return CleanupOutcome::NoOp,
        Err(e) => return CleanupOutcome::failed(CleanupStage::ExistenceCheck, e),
    }

    let records = match session.find_all_by_owner(owner).await {
        Ok(records) => records,
        Err(e) => return CleanupOutcome::failed(CleanupStage::Fetch, e),
    };

    for record in &records {
        if let Err(e) = session.delete(record.id).await {
            return CleanupOutcome::failed(CleanupStage::Delete, e);
        }
    }

    if let Err(e) = session.commit().await {
        return CleanupOutcome::failed(CleanupStage::Commit, e);
    }

    CleanupOutcome::Deleted {
        count: records.len(),
    }
}
