use std::fmt;

use tracing::{error, info, warn};

use super::record::{Appeal, AppealId, AppealKind, AppealStatus, Decision, UserId};
use super::store::AppealStore;
use crate::error::AppealError;

/// What the administrator is told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminPayload {
    NewAppeal(Appeal),
    Resolved(Appeal),
    NoSuchAppeal(AppealId),
    AlreadyResolved(Appeal),
    InvalidDecision(String),
    Failure(String),
}

/// What a submitting user is told.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserPayload {
    Submitted(Appeal),
    AlreadyPending(AppealKind),
    PreviouslyRejected(AppealKind),
    Decided(Appeal),
    Failure,
}

/// An outbound notification intent. Delivery belongs to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    AdminNotify(AdminPayload),
    UserNotify { user_id: UserId, payload: UserPayload },
}

impl AdminPayload {
    /// The appeal this notice is about, if any.
    pub fn appeal_id(&self) -> Option<AppealId> {
        match self {
            AdminPayload::NewAppeal(a) | AdminPayload::Resolved(a) | AdminPayload::AlreadyResolved(a) => {
                Some(a.id)
            }
            AdminPayload::NoSuchAppeal(id) => Some(*id),
            AdminPayload::InvalidDecision(_) | AdminPayload::Failure(_) => None,
        }
    }
}

impl UserPayload {
    pub fn kind(&self) -> Option<AppealKind> {
        match self {
            UserPayload::Submitted(a) | UserPayload::Decided(a) => Some(a.kind),
            UserPayload::AlreadyPending(kind) | UserPayload::PreviouslyRejected(kind) => Some(*kind),
            UserPayload::Failure => None,
        }
    }
}

impl fmt::Display for AdminPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminPayload::NewAppeal(a) => write!(
                f,
                "🚨 New Appeal\nUser: {} (ID: {})\nType: {}\nTime: {}\n\nUse /pending to view all appeals",
                a.display_user(),
                a.user_id,
                a.kind,
                a.created_at.format("%H:%M %d-%m-%Y"),
            ),
            AdminPayload::Resolved(a) => {
                let mut status = a.status.to_string();
                if let Some(first) = status.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                write!(f, "{status} appeal #{}", a.id)
            }
            AdminPayload::NoSuchAppeal(_) => write!(f, "no such appeal id"),
            AdminPayload::AlreadyResolved(_) => write!(f, "already resolved"),
            AdminPayload::InvalidDecision(raw) => write!(f, "unrecognized decision: {raw}"),
            AdminPayload::Failure(reason) => write!(f, "❌ Error processing request: {reason}"),
        }
    }
}

impl fmt::Display for UserPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserPayload::Submitted(a) => write!(f, "✅ {} submitted! Reference ID: {}", a.kind.label(), a.id),
            UserPayload::AlreadyPending(_) => {
                write!(f, "you already have a pending request of this kind")
            }
            UserPayload::PreviouslyRejected(_) => {
                write!(f, "your previous request of this kind was rejected")
            }
            UserPayload::Decided(a) => write!(f, "{}", a.status),
            UserPayload::Failure => write!(f, "❌ Error processing request, please try again later"),
        }
    }
}

/// Result of one workflow action together with the notifications it emitted.
///
/// Failures are carried in `result`; `events` always tells the triggering
/// party what happened.
#[derive(Debug)]
pub struct Outcome<T> {
    pub result: Result<T, AppealError>,
    pub events: Vec<Notification>,
}

impl<T> Outcome<T> {
    fn new(result: Result<T, AppealError>, events: Vec<Notification>) -> Self {
        Self { result, events }
    }
}

/// One page of the pending queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPage {
    /// Zero-based page index.
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub appeals: Vec<Appeal>,
}

impl PendingPage {
    pub fn has_previous(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        (self.page + 1) * self.page_size < self.total
    }
}

/// Submission and resolution rules layered on an [`AppealStore`].
pub struct AppealWorkflow<S: AppealStore> {
    store: S,
}

impl<S: AppealStore> AppealWorkflow<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// File a new appeal for `user_id`.
    ///
    /// - success: the admin gets `NewAppeal`, the user gets a receipt
    /// - an open appeal of the same kind: the user is told, nothing is stored
    pub fn submit(&self, user_id: UserId, username: Option<String>, kind: AppealKind) -> Outcome<Appeal> {
        match self.store.create(user_id, username, kind) {
            Ok(appeal) => {
                info!(id = appeal.id, user_id, %kind, "appeal submitted");
                let events = vec![
                    Notification::AdminNotify(AdminPayload::NewAppeal(appeal.clone())),
                    Notification::UserNotify {
                        user_id,
                        payload: UserPayload::Submitted(appeal.clone()),
                    },
                ];
                Outcome::new(Ok(appeal), events)
            }
            Err(err) => {
                let payload = match &err {
                    AppealError::DuplicatePending { .. } => {
                        warn!(user_id, %kind, "duplicate pending appeal refused");
                        UserPayload::AlreadyPending(kind)
                    }
                    AppealError::ResubmissionBlocked { .. } => {
                        warn!(user_id, %kind, "resubmission after rejection refused");
                        UserPayload::PreviouslyRejected(kind)
                    }
                    other => {
                        error!(user_id, %kind, error = %other, "appeal submission failed");
                        UserPayload::Failure
                    }
                };
                Outcome::new(Err(err), vec![Notification::UserNotify { user_id, payload }])
            }
        }
    }

    /// Apply an administrator decision to one appeal.
    ///
    /// `admin_id` is trusted; the transport has already checked it.
    pub fn resolve(&self, admin_id: UserId, appeal_id: AppealId, decision: Decision) -> Outcome<Appeal> {
        let target = decision.target_status();
        match self.store.set_status(appeal_id, target) {
            Ok(appeal) => {
                info!(admin_id, id = appeal_id, status = %target, "appeal decided");
                let events = vec![
                    Notification::UserNotify {
                        user_id: appeal.user_id,
                        payload: UserPayload::Decided(appeal.clone()),
                    },
                    Notification::AdminNotify(AdminPayload::Resolved(appeal.clone())),
                ];
                Outcome::new(Ok(appeal), events)
            }
            Err(err) => {
                let payload = self.resolution_failure(appeal_id, &err);
                Outcome::new(Err(err), vec![Notification::AdminNotify(payload)])
            }
        }
    }

    /// Same as [`resolve`](Self::resolve) but takes the decision as text.
    ///
    /// An unrecognized value is an invalid transition and touches nothing.
    pub fn resolve_raw(&self, admin_id: UserId, appeal_id: AppealId, decision: &str) -> Outcome<Appeal> {
        match decision.parse::<Decision>() {
            Ok(decision) => self.resolve(admin_id, appeal_id, decision),
            Err(err) => {
                warn!(admin_id, id = appeal_id, decision, "unrecognized decision");
                let payload = AdminPayload::InvalidDecision(decision.trim().to_string());
                Outcome::new(Err(err), vec![Notification::AdminNotify(payload)])
            }
        }
    }

    fn resolution_failure(&self, appeal_id: AppealId, err: &AppealError) -> AdminPayload {
        match err {
            AppealError::NotFound(_) => {
                warn!(id = appeal_id, "resolution for unknown appeal");
                AdminPayload::NoSuchAppeal(appeal_id)
            }
            AppealError::InvalidTransition { .. } => {
                warn!(id = appeal_id, "appeal already resolved");
                match self.store.get(appeal_id) {
                    Ok(current) => AdminPayload::AlreadyResolved(current),
                    Err(lookup) => AdminPayload::Failure(lookup.to_string()),
                }
            }
            other => {
                error!(id = appeal_id, error = %other, "appeal resolution failed");
                AdminPayload::Failure(other.to_string())
            }
        }
    }

    /// Pending appeals, oldest first.
    pub fn list_pending(&self) -> Result<Vec<Appeal>, AppealError> {
        self.store.list_by_status(AppealStatus::Pending)
    }

    /// A zero-based page of [`list_pending`](Self::list_pending).
    pub fn pending_page(&self, page: usize, page_size: usize) -> Result<PendingPage, AppealError> {
        let page_size = page_size.max(1);
        let pending = self.list_pending()?;
        let total = pending.len();
        let appeals = pending
            .into_iter()
            .skip(page.saturating_mul(page_size))
            .take(page_size)
            .collect();
        Ok(PendingPage {
            page,
            page_size,
            total,
            appeals,
        })
    }

    pub fn lookup(&self, appeal_id: AppealId) -> Result<Appeal, AppealError> {
        self.store.get(appeal_id)
    }
}
