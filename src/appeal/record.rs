use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppealError;

/// Store-assigned appeal identifier.
pub type AppealId = u64;

/// Chat-platform user identifier.
pub type UserId = i64;

/// The two kinds of request a user may file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppealKind {
    #[serde(rename = "unban")]
    UnbanAppeal,
    #[serde(rename = "admin")]
    AdminRequest,
}

impl AppealKind {
    /// Short name used on the wire and in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppealKind::UnbanAppeal => "unban",
            AppealKind::AdminRequest => "admin",
        }
    }

    /// Human-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            AppealKind::UnbanAppeal => "Fed Unban Appeal",
            AppealKind::AdminRequest => "Fed Admin Request",
        }
    }
}

impl fmt::Display for AppealKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an appeal.
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppealStatus {
    Pending,
    Approved,
    Rejected,
}

impl AppealStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppealStatus::Pending)
    }
}

impl fmt::Display for AppealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppealStatus::Pending => write!(f, "pending"),
            AppealStatus::Approved => write!(f, "approved"),
            AppealStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// An administrator's verdict on a pending appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    /// The terminal status this decision moves an appeal to.
    pub fn target_status(&self) -> AppealStatus {
        match self {
            Decision::Approve => AppealStatus::Approved,
            Decision::Reject => AppealStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = AppealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approve" | "approved" => Ok(Decision::Approve),
            "reject" | "rejected" => Ok(Decision::Reject),
            other => Err(AppealError::UnknownDecision(other.to_string())),
        }
    }
}

/// A single appeal record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appeal {
    pub id: AppealId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub kind: AppealKind,
    pub status: AppealStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Appeal {
    pub fn new(id: AppealId, user_id: UserId, username: Option<String>, kind: AppealKind) -> Self {
        Self {
            id,
            user_id,
            username,
            kind,
            status: AppealStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == AppealStatus::Pending
    }

    /// `@username` when known, otherwise the numeric id.
    pub fn display_user(&self) -> String {
        match &self.username {
            Some(name) if !name.is_empty() => format!("@{name}"),
            _ => format!("user {}", self.user_id),
        }
    }

    /// Move a pending appeal to a terminal status, stamping `resolved_at`.
    ///
    /// The record is left untouched on error.
    pub(crate) fn transition(&mut self, to: AppealStatus) -> Result<(), AppealError> {
        if self.status.is_terminal() || !to.is_terminal() {
            return Err(AppealError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Appeal {
        Appeal::new(1, 42, Some("alice".into()), AppealKind::UnbanAppeal)
    }

    #[test]
    fn new_appeal_is_pending_and_unresolved() {
        let appeal = pending();
        assert!(appeal.is_pending());
        assert!(appeal.resolved_at.is_none());
        assert_eq!(appeal.user_id, 42);
        assert_eq!(appeal.kind, AppealKind::UnbanAppeal);
    }

    #[test]
    fn transition_sets_resolved_at() {
        let mut appeal = pending();
        appeal.transition(AppealStatus::Approved).unwrap();
        assert_eq!(appeal.status, AppealStatus::Approved);
        assert!(appeal.resolved_at.is_some());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut appeal = pending();
        appeal.transition(AppealStatus::Rejected).unwrap();
        let snapshot = appeal.clone();

        let err = appeal.transition(AppealStatus::Approved).unwrap_err();
        assert!(matches!(
            err,
            AppealError::InvalidTransition {
                from: AppealStatus::Rejected,
                to: AppealStatus::Approved,
                ..
            }
        ));
        assert_eq!(appeal, snapshot);
    }

    #[test]
    fn pending_is_not_a_valid_target() {
        let mut appeal = pending();
        assert!(appeal.transition(AppealStatus::Pending).is_err());
        assert!(appeal.is_pending());
        assert!(appeal.resolved_at.is_none());
    }

    #[test]
    fn decision_parsing() {
        assert_eq!("approve".parse::<Decision>().unwrap(), Decision::Approve);
        assert_eq!(" Reject ".parse::<Decision>().unwrap(), Decision::Reject);
        assert!(matches!(
            "ban".parse::<Decision>(),
            Err(AppealError::UnknownDecision(_))
        ));
    }

    #[test]
    fn decision_targets() {
        assert_eq!(Decision::Approve.target_status(), AppealStatus::Approved);
        assert_eq!(Decision::Reject.target_status(), AppealStatus::Rejected);
    }

    #[test]
    fn wire_names() {
        assert_eq!(serde_json::to_string(&AppealKind::UnbanAppeal).unwrap(), "\"unban\"");
        assert_eq!(serde_json::to_string(&AppealKind::AdminRequest).unwrap(), "\"admin\"");
        assert_eq!(serde_json::to_string(&AppealStatus::Rejected).unwrap(), "\"rejected\"");
    }

    #[test]
    fn display_user_falls_back_to_id() {
        let mut appeal = pending();
        assert_eq!(appeal.display_user(), "@alice");
        appeal.username = None;
        assert_eq!(appeal.display_user(), "user 42");
    }

    #[test]
    fn status_display() {
        assert_eq!(AppealStatus::Pending.to_string(), "pending");
        assert_eq!(AppealStatus::Approved.to_string(), "approved");
        assert_eq!(AppealStatus::Rejected.to_string(), "rejected");
    }
}
