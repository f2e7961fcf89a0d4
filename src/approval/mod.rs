pub mod queue;
pub mod requester;
pub mod types;
pub mod watcher;

pub use queue::ApprovalQueue;
pub use requester::ApprovalRequester;
pub use types::{ApprovalRequest, ApprovalResponse};
pub use watcher::ApprovalWatcher;
