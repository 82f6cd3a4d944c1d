//! Appeal persistence contract and the in-memory store.
//!
//! [`AppealStore`] is the only owner of appeal records. Implementations must
//! make `create` and `set_status` atomic with respect to each other; both
//! stores here do it by running every mutation against an [`AppealLedger`]
//! while holding a single lock.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::record::{Appeal, AppealId, AppealKind, AppealStatus, UserId};
use crate::error::{AppealError, StorageError};

/// Whether a user may file again after a rejection of the same kind.
///
/// Only a pending appeal or (by default) a rejected one blocks a new
/// submission. An approved appeal never does, so a user whose unban was
/// granted can file again if banned later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmissionPolicy {
    pub allow_resubmission: bool,
}

/// Durable record store for appeals.
pub trait AppealStore: Send + Sync {
    /// Insert a new pending appeal unless `(user_id, kind)` already has one.
    fn create(
        &self,
        user_id: UserId,
        username: Option<String>,
        kind: AppealKind,
    ) -> Result<Appeal, AppealError>;

    fn get(&self, id: AppealId) -> Result<Appeal, AppealError>;

    /// All appeals with `status`, oldest first.
    fn list_by_status(&self, status: AppealStatus) -> Result<Vec<Appeal>, AppealError>;

    /// Resolve a pending appeal. Only `Pending -> Approved|Rejected` succeeds.
    fn set_status(&self, id: AppealId, status: AppealStatus) -> Result<Appeal, AppealError>;
}

/// The full record set plus the id counter.
///
/// This is also the persisted document layout of the file store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppealLedger {
    pub version: u32,
    pub next_id: AppealId,
    pub appeals: BTreeMap<AppealId, Appeal>,
}

/// Current ledger format version.
pub const LEDGER_VERSION: u32 = 1;

impl Default for AppealLedger {
    fn default() -> Self {
        Self {
            version: LEDGER_VERSION,
            next_id: 1,
            appeals: BTreeMap::new(),
        }
    }
}

impl AppealLedger {
    /// Conditional insert: the conflict checks and the insert happen on the
    /// same borrow, so callers holding the ledger lock get an atomic create.
    pub fn insert_pending(
        &mut self,
        user_id: UserId,
        username: Option<String>,
        kind: AppealKind,
        policy: SubmissionPolicy,
    ) -> Result<Appeal, AppealError> {
        let mut prior = self
            .appeals
            .values()
            .filter(|a| a.user_id == user_id && a.kind == kind);

        if prior.clone().any(Appeal::is_pending) {
            return Err(AppealError::DuplicatePending { user_id, kind });
        }
        if !policy.allow_resubmission && prior.any(|a| a.status == AppealStatus::Rejected) {
            return Err(AppealError::ResubmissionBlocked { user_id, kind });
        }

        let id = self.next_id;
        self.next_id += 1;
        let appeal = Appeal::new(id, user_id, username, kind);
        self.appeals.insert(id, appeal.clone());
        Ok(appeal)
    }

    pub fn get(&self, id: AppealId) -> Result<Appeal, AppealError> {
        self.appeals.get(&id).cloned().ok_or(AppealError::NotFound(id))
    }

    pub fn by_status(&self, status: AppealStatus) -> Vec<Appeal> {
        let mut matching: Vec<Appeal> = self
            .appeals
            .values()
            .filter(|a| a.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        matching
    }

    pub fn transition(&mut self, id: AppealId, status: AppealStatus) -> Result<Appeal, AppealError> {
        let appeal = self.appeals.get_mut(&id).ok_or(AppealError::NotFound(id))?;
        appeal.transition(status)?;
        Ok(appeal.clone())
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: Mutex<AppealLedger>,
    policy: SubmissionPolicy,
}

impl MemoryStore {
    pub fn new(policy: SubmissionPolicy) -> Self {
        Self {
            ledger: Mutex::new(AppealLedger::default()),
            policy,
        }
    }

    fn with_ledger<T>(
        &self,
        f: impl FnOnce(&mut AppealLedger) -> Result<T, AppealError>,
    ) -> Result<T, AppealError> {
        let mut ledger = self.ledger.lock().map_err(|_| StorageError::Poisoned)?;
        f(&mut ledger)
    }
}

impl AppealStore for MemoryStore {
    fn create(
        &self,
        user_id: UserId,
        username: Option<String>,
        kind: AppealKind,
    ) -> Result<Appeal, AppealError> {
        let appeal = self.with_ledger(|l| l.insert_pending(user_id, username, kind, self.policy))?;
        info!(id = appeal.id, user_id, %kind, "appeal created");
        Ok(appeal)
    }

    fn get(&self, id: AppealId) -> Result<Appeal, AppealError> {
        self.with_ledger(|l| l.get(id))
    }

    fn list_by_status(&self, status: AppealStatus) -> Result<Vec<Appeal>, AppealError> {
        let appeals = self.with_ledger(|l| Ok(l.by_status(status)))?;
        debug!(%status, count = appeals.len(), "listed appeals");
        Ok(appeals)
    }

    fn set_status(&self, id: AppealId, status: AppealStatus) -> Result<Appeal, AppealError> {
        let appeal = self.with_ledger(|l| l.transition(id, status))?;
        info!(id, %status, "appeal resolved");
        Ok(appeal)
    }
}
