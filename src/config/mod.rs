//! Bridge configuration — one JSON file shared by both binaries.
//!
//! Lives at `$AGENTGRAM_HOME/config.json`, falling back to
//! `~/.agentgram/config.json`. The bridge daemon and the hook binary load it
//! independently; a load failure is the only fatal error in either process.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the data directory (used by tests and
/// multi-account setups).
pub const HOME_ENV: &str = "AGENTGRAM_HOME";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Telegram credentials and the single authorized chat.
    pub telegram: TelegramConfig,

    /// Projects the operator can switch between.
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,

    /// Tool names that require remote approval before they run.
    #[serde(default = "default_approval_tools")]
    pub approval_tools: Vec<String>,

    /// How assistant sessions are launched.
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub token: String,

    /// Chat id allowed to drive the bridge. Everything else is ignored.
    pub chat_id: i64,

    /// Override for the API root, e.g. a self-hosted bot-api gateway.
    /// Defaults to the public `https://api.telegram.org`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Short name used in chat commands and tmux session names.
    pub name: String,

    /// Project root on disk. Sessions start here; hooks resolve their
    /// project by matching the working directory against this path.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Command launched inside a fresh tmux session.
    #[serde(default = "default_session_command")]
    pub command: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command: default_session_command(),
        }
    }
}

fn default_session_command() -> String {
    "claude".to_string()
}

fn default_approval_tools() -> Vec<String> {
    ["Bash", "Write", "Edit", "MultiEdit"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    /// Data directory: `$AGENTGRAM_HOME`, else `~/.agentgram`.
    pub fn data_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(HOME_ENV) {
            if !dir.trim().is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".agentgram"))
    }

    /// Path of the config file inside the data directory.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("config.json"))
    }

    /// Directory holding approval request/response files. Both processes
    /// derive this independently, so it must depend only on the data dir.
    pub fn approvals_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("approvals"))
    }

    /// Load the configuration from the default location.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load the configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        if config.telegram.token.trim().is_empty() {
            anyhow::bail!("Config must set a non-empty telegram.token");
        }
        Ok(config)
    }

    /// True if the tool name is in the approval gate list.
    pub fn is_gated(&self, tool: &str) -> bool {
        self.approval_tools.iter().any(|t| t == tool)
    }

    /// Look up a configured project by name.
    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Resolve the project a hook is running for: the first configured
    /// project whose path contains `cwd`, else the basename of `cwd`.
    pub fn project_for_cwd(&self, cwd: &Path) -> String {
        for project in &self.projects {
            if cwd.starts_with(&project.path) {
                return project.name.clone();
            }
        }
        cwd.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Write a starter config for `agentgram init`.
    pub fn write_starter(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, STARTER_CONFIG)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Template written by `agentgram init`. Placeholders are obvious enough
/// that the bridge refuses to start until they are filled in.
const STARTER_CONFIG: &str = r#"{
  "telegram": {
    "token": "123456:replace-with-your-bot-token",
    "chat_id": 0
  },
  "projects": [
    { "name": "myproject", "path": "/home/me/myproject" }
  ],
  "approval_tools": ["Bash", "Write", "Edit", "MultiEdit"],
  "session": { "command": "claude" }
}
"#;
