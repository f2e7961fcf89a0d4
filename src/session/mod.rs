//! Session management seam between the bridge and the assistant processes.
//!
//! The bridge and the streamer only ever talk to the `SessionManager`
//! trait; the tmux implementation lives in `tmux`. Failures on this
//! boundary are logged and mapped to the trait's soft return values,
//! never propagated into the bridge loops.

pub mod tmux;

use crate::config::ProjectConfig;
use async_trait::async_trait;

pub use tmux::TmuxSessionManager;

/// What the bridge needs from whatever runs the assistant sessions.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Configured projects, in config order.
    fn projects(&self) -> Vec<ProjectConfig>;

    /// Currently selected project, if any.
    fn active(&self) -> Option<String>;

    /// Select a project by name. `false` for unknown names.
    fn set_active(&self, name: &str) -> bool;

    /// Whether a session is currently alive for the project.
    async fn is_running(&self, name: &str) -> bool;

    /// Start a fresh assistant session. `true` on success.
    async fn new_session(&self, name: &str) -> bool;

    /// Start a session that continues the previous conversation.
    async fn resume_session(&self, name: &str) -> bool;

    /// Tear the session down, if one exists.
    async fn kill_session(&self, name: &str);

    /// Type `text` into the session and submit it.
    async fn send_input(&self, name: &str, text: &str);

    /// Current visible output of the session. Empty on any failure.
    async fn capture_output(&self, name: &str) -> String;
}
