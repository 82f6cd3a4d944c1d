//! Transport-side glue between inbound chat commands and the workflow.
//!
//! The handler owns the administrator check, turns workflow events into
//! deliveries and renders replies. It holds no appeal state of its own.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::appeal::{
    Appeal, AppealId, AppealKind, AppealStore, AppealWorkflow, Notification, PendingPage, UserId,
};
use crate::error::AppealError;
use crate::notify::{Notifier, Recipient};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("⛔ Unauthorized access!")]
    Unauthorized(UserId),

    #[error("no administrator is configured; set ADMIN_ID or admin_id in fedappeal.toml")]
    AdminNotConfigured,

    #[error(transparent)]
    Appeal(#[from] AppealError),
}

/// The person who sent a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub username: Option<String>,
}

pub struct AppealHandler<S: AppealStore, N: Notifier> {
    workflow: AppealWorkflow<S>,
    notifier: N,
    admin_id: Option<UserId>,
    page_size: usize,
}

impl<S: AppealStore, N: Notifier> AppealHandler<S, N> {
    pub fn new(workflow: AppealWorkflow<S>, notifier: N, admin_id: Option<UserId>, page_size: usize) -> Self {
        Self {
            workflow,
            notifier,
            admin_id,
            page_size: page_size.max(1),
        }
    }

    pub fn start(&self) -> String {
        "📝 Use /appeal to submit a FedBan appeal or request Fed Admin status".to_string()
    }

    pub fn appeal_menu(&self) -> String {
        let mut text = String::from("Select appeal type:");
        for (icon, kind) in [("🔓", AppealKind::UnbanAppeal), ("👑", AppealKind::AdminRequest)] {
            text.push_str(&format!("\n  {icon} {} → /appeal {}", kind.label(), kind));
        }
        text
    }

    /// A user picked an appeal kind.
    pub async fn submit(&self, caller: &Caller, kind: AppealKind) -> Result<Appeal, AppealError> {
        let outcome = self.workflow.submit(caller.id, caller.username.clone(), kind);
        self.dispatch(&outcome.events).await;
        outcome.result
    }

    /// The administrator decided on an appeal; `decision` is the raw command word.
    pub async fn resolve(&self, caller: &Caller, appeal_id: AppealId, decision: &str) -> Result<Appeal, HandlerError> {
        let admin_id = self.authorize(caller)?;
        let outcome = self.workflow.resolve_raw(admin_id, appeal_id, decision);
        self.dispatch(&outcome.events).await;
        Ok(outcome.result?)
    }

    pub fn pending(&self, caller: &Caller, page: usize) -> Result<String, HandlerError> {
        self.authorize(caller)?;
        let page = self.workflow.pending_page(page, self.page_size)?;
        Ok(render_pending(&page))
    }

    pub fn show(&self, caller: &Caller, appeal_id: AppealId) -> Result<String, HandlerError> {
        self.authorize(caller)?;
        match self.workflow.lookup(appeal_id) {
            Ok(appeal) => Ok(render_appeal(&appeal)),
            Err(AppealError::NotFound(_)) => Ok("⚠ Appeal ID not found!".to_string()),
            Err(err) => Err(err.into()),
        }
    }

    fn authorize(&self, caller: &Caller) -> Result<UserId, HandlerError> {
        match self.admin_id {
            None => {
                warn!(caller = caller.id, "admin command refused: no administrator configured");
                Err(HandlerError::AdminNotConfigured)
            }
            Some(admin) if admin == caller.id => Ok(admin),
            Some(_) => {
                warn!(caller = caller.id, "admin command refused: unauthorized");
                Err(HandlerError::Unauthorized(caller.id))
            }
        }
    }

    /// Deliver every event. Failures are logged and not retried.
    async fn dispatch(&self, events: &[Notification]) {
        for event in events {
            let (recipient, text) = match event {
                Notification::AdminNotify(payload) => match self.admin_id {
                    Some(admin) => {
                        debug!(appeal = ?payload.appeal_id(), "notifying administrator");
                        (Recipient::Admin(admin), payload.to_string())
                    }
                    None => {
                        warn!(appeal = ?payload.appeal_id(), "no administrator configured; admin notification dropped");
                        continue;
                    }
                },
                Notification::UserNotify { user_id, payload } => {
                    debug!(user_id, kind = ?payload.kind(), "notifying user");
                    (Recipient::User(*user_id), payload.to_string())
                }
            };
            match self.notifier.deliver(recipient, &text).await {
                Ok(()) => info!(chat = recipient.chat_id(), "notification delivered"),
                Err(err) => warn!(chat = recipient.chat_id(), error = %err, "notification delivery failed"),
            }
        }
    }
}

pub fn render_pending(page: &PendingPage) -> String {
    if page.appeals.is_empty() {
        return "No pending appeals!".to_string();
    }

    let mut text = format!("📋 Pending Appeals (Page {}):\n", page.page + 1);
    for appeal in &page.appeals {
        text.push_str(&format!(
            "\nID: {}\nUser: {} (ID: {})\nType: {}\nTime: {}\n───────────────",
            appeal.id,
            appeal.display_user(),
            appeal.user_id,
            appeal.kind,
            appeal.created_at.to_rfc3339(),
        ));
    }

    let mut nav = Vec::new();
    if page.has_previous() {
        nav.push(format!("⬅ Previous: /pending {}", page.page - 1));
    }
    if page.has_next() {
        nav.push(format!("Next ➡: /pending {}", page.page + 1));
    }
    if !nav.is_empty() {
        text.push_str("\n\n");
        text.push_str(&nav.join("   "));
    }
    text
}

pub fn render_appeal(appeal: &Appeal) -> String {
    let resolved = appeal
        .resolved_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "Appeal #{}\nUser: {} (ID: {})\nType: {}\nStatus: {}\nCreated: {}\nResolved: {}",
        appeal.id,
        appeal.display_user(),
        appeal.user_id,
        appeal.kind,
        appeal.status,
        appeal.created_at.to_rfc3339(),
        resolved,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appeal::{AppealStatus, MemoryStore, SubmissionPolicy};
    use crate::notify::testing::RecordingNotifier;

    const ADMIN: UserId = 1000;

    fn handler_with(notifier: RecordingNotifier, admin: Option<UserId>) -> AppealHandler<MemoryStore, RecordingNotifier> {
        let workflow = AppealWorkflow::new(MemoryStore::new(SubmissionPolicy::default()));
        AppealHandler::new(workflow, notifier, admin, 5)
    }

    fn handler() -> AppealHandler<MemoryStore, RecordingNotifier> {
        handler_with(RecordingNotifier::default(), Some(ADMIN))
    }

    fn user(id: UserId) -> Caller {
        Caller {
            id,
            username: Some(format!("user{id}")),
        }
    }

    fn admin() -> Caller {
        Caller { id: ADMIN, username: None }
    }

    #[tokio::test]
    async fn submission_notifies_admin_and_user() {
        let h = handler();
        let appeal = h.submit(&user(42), AppealKind::UnbanAppeal).await.unwrap();
        assert_eq!(appeal.id, 1);

        let sent = h.notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, Recipient::Admin(ADMIN));
        assert!(sent[0].1.starts_with("🚨 New Appeal"));
        assert_eq!(sent[1].0, Recipient::User(42));
    }

    #[tokio::test]
    async fn approval_reaches_the_user() {
        let h = handler();
        h.submit(&user(42), AppealKind::UnbanAppeal).await.unwrap();
        let appeal = h.resolve(&admin(), 1, "approve").await.unwrap();
        assert_eq!(appeal.status, AppealStatus::Approved);

        let sent = h.notifier.sent();
        assert!(sent.contains(&(Recipient::User(42), "approved".to_string())));
        assert!(sent.contains(&(Recipient::Admin(ADMIN), "Approved appeal #1".to_string())));
    }

    #[tokio::test]
    async fn non_admin_cannot_resolve() {
        let h = handler();
        h.submit(&user(42), AppealKind::UnbanAppeal).await.unwrap();
        let err = h.resolve(&user(42), 1, "approve").await.unwrap_err();
        assert!(matches!(err, HandlerError::Unauthorized(42)));
        assert_eq!(err.to_string(), "⛔ Unauthorized access!");
        assert!(h.workflow.lookup(1).unwrap().is_pending());
    }

    #[tokio::test]
    async fn unset_admin_refuses_admin_commands() {
        let h = handler_with(RecordingNotifier::default(), None);
        h.submit(&user(42), AppealKind::UnbanAppeal).await.unwrap();

        assert!(matches!(h.pending(&user(0), 0), Err(HandlerError::AdminNotConfigured)));
        // the admin notice had nowhere to go; only the user receipt was sent
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn unknown_appeal_tells_admin() {
        let h = handler();
        let err = h.resolve(&admin(), 999, "approve").await.unwrap_err();
        assert!(matches!(err, HandlerError::Appeal(AppealError::NotFound(999))));
        assert_eq!(
            h.notifier.sent(),
            vec![(Recipient::Admin(ADMIN), "no such appeal id".to_string())]
        );
    }

    #[tokio::test]
    async fn delivery_failure_does_not_fail_the_action() {
        let notifier = RecordingNotifier {
            unreachable: vec![42],
            ..Default::default()
        };
        let h = handler_with(notifier, Some(ADMIN));
        let appeal = h.submit(&user(42), AppealKind::AdminRequest).await.unwrap();
        assert!(appeal.is_pending());
        assert_eq!(h.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn pending_is_rendered_with_navigation() {
        let h = handler();
        for id in 1..=6 {
            h.submit(&user(id), AppealKind::UnbanAppeal).await.unwrap();
        }
        let first = h.pending(&admin(), 0).unwrap();
        assert!(first.starts_with("📋 Pending Appeals (Page 1):"));
        assert!(first.contains("User: @user1 (ID: 1)"));
        assert!(first.contains("Next ➡: /pending 1"));
        assert!(!first.contains("Previous"));

        let second = h.pending(&admin(), 1).unwrap();
        assert!(second.contains("ID: 6"));
        assert!(second.contains("⬅ Previous: /pending 0"));
    }

    #[test]
    fn empty_queue_message() {
        let h = handler();
        assert_eq!(h.pending(&admin(), 0).unwrap(), "No pending appeals!");
    }

    #[tokio::test]
    async fn show_renders_status() {
        let h = handler();
        h.submit(&user(42), AppealKind::AdminRequest).await.unwrap();
        h.resolve(&admin(), 1, "reject").await.unwrap();

        let text = h.show(&admin(), 1).unwrap();
        assert!(text.contains("Status: rejected"));
        assert!(!text.contains("Resolved: -"));
        assert_eq!(h.show(&admin(), 5).unwrap(), "⚠ Appeal ID not found!");
    }

    #[test]
    fn menu_lists_both_kinds() {
        let menu = handler().appeal_menu();
        assert!(menu.contains("/appeal unban"));
        assert!(menu.contains("/appeal admin"));
    }
}
