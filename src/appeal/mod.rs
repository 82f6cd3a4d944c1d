mod file_store;
mod record;
mod store;
mod workflow;

pub use file_store::FileStore;
pub use record::{Appeal, AppealId, AppealKind, AppealStatus, UserId};
pub use store::{AppealStore, MemoryStore, SubmissionPolicy};
pub use workflow::{AppealWorkflow, Notification, PendingPage};
