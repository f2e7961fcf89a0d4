//! tmux-backed session manager.
//!
//! Each project runs the assistant inside a detached tmux session named
//! `agentgram-<project>`, started in the project directory. Input goes in
//! as literal keystrokes plus a separate Enter; output comes back from
//! `capture-pane`. tmux failures degrade to the trait's soft values with a
//! log line.

use crate::config::{Config, ProjectConfig};
use crate::session::SessionManager;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::RwLock;
use tokio::process::Command;

/// Flag appended to the session command by `resume_session`. Matches the
/// assistant's own "continue last conversation" switch.
const RESUME_FLAG: &str = "--continue";

pub struct TmuxSessionManager {
    projects: Vec<ProjectConfig>,
    command: String,
    active: RwLock<Option<String>>,
}

impl TmuxSessionManager {
    pub fn new(config: &Config) -> Self {
        Self {
            projects: config.projects.clone(),
            command: config.session.command.clone(),
            active: RwLock::new(None),
        }
    }

    /// tmux session name for a project.
    pub fn session_name(project: &str) -> String {
        format!("agentgram-{project}")
    }

    fn project_path(&self, name: &str) -> Option<PathBuf> {
        self.projects
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.path.clone())
    }

    /// Run one tmux command, true on exit status 0.
    async fn tmux(args: &[&str]) -> bool {
        match Command::new("tmux").args(args).output().await {
            Ok(output) => output.status.success(),
            Err(err) => {
                tracing::warn!("tmux {:?} failed to spawn: {err}", args.first());
                false
            }
        }
    }

    async fn start(&self, name: &str, command: &str) -> bool {
        let Some(path) = self.project_path(name) else {
            tracing::warn!("unknown project {name}");
            return false;
        };
        let session = Self::session_name(name);
        let path = path.display().to_string();

        // A stale session would swallow the new command; clear it first.
        Self::tmux(&["kill-session", "-t", &session]).await;
        let started =
            Self::tmux(&["new-session", "-d", "-s", &session, "-c", &path, command]).await;
        if started {
            tracing::info!(session, path, "session started");
        } else {
            tracing::error!(session, "could not start session");
        }
        started
    }
}

#[async_trait]
impl SessionManager for TmuxSessionManager {
    fn projects(&self) -> Vec<ProjectConfig> {
        self.projects.clone()
    }

    fn active(&self) -> Option<String> {
        self.active.read().ok().and_then(|a| a.clone())
    }

    fn set_active(&self, name: &str) -> bool {
        if self.projects.iter().all(|p| p.name != name) {
            return false;
        }
        match self.active.write() {
            Ok(mut active) => {
                *active = Some(name.to_string());
                true
            }
            Err(_) => false,
        }
    }

    async fn is_running(&self, name: &str) -> bool {
        Self::tmux(&["has-session", "-t", &Self::session_name(name)]).await
    }

    async fn new_session(&self, name: &str) -> bool {
        self.start(name, &self.command).await
    }

    async fn resume_session(&self, name: &str) -> bool {
        self.start(name, &format!("{} {}", self.command, RESUME_FLAG))
            .await
    }

    async fn kill_session(&self, name: &str) {
        Self::tmux(&["kill-session", "-t", &Self::session_name(name)]).await;
    }

    async fn send_input(&self, name: &str, text: &str) {
        let session = Self::session_name(name);
        // Literal text first so nothing is parsed as a key name, then a
        // separate Enter to submit.
        if !Self::tmux(&["send-keys", "-t", &session, "-l", "--", text]).await {
            tracing::warn!("send-keys to {session} failed");
            return;
        }
        Self::tmux(&["send-keys", "-t", &session, "Enter"]).await;
    }

    async fn capture_output(&self, name: &str) -> String {
        let session = Self::session_name(name);
        match Command::new("tmux")
            .args(["capture-pane", "-p", "-t", &session])
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).into_owned()
            }
            Ok(_) => String::new(),
            Err(err) => {
                tracing::warn!("capture-pane for {session} failed: {err}");
                String::new()
            }
        }
    }
}
