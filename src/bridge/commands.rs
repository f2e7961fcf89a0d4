//! Operator commands, the `/slash` surface of the bridge.
//!
//! Small handlers that read session state and answer with one message
//! each. Implemented on `Bridge` so they share its clients without extra
//! plumbing; `handle_command` is the single entry point from dispatch.

use super::Bridge;
use crate::telegram::{tail_chars, InlineButton, InlineKeyboard};

/// Longest pane tail `/output` will paste into the chat.
const OUTPUT_TAIL_CHARS: usize = 3000;

const HELP: &str = "🤖 *Agentgram commands*\n\n\
    /list - projects and session state\n\
    /switch <name> - select the active project\n\
    /status - active project details\n\
    /new - start a session in the active project\n\
    /resume - continue the previous conversation\n\
    /stop - kill the active session\n\
    /output - tail of the session output\n\n\
    Any other text is sent to the active session as a prompt.";

impl Bridge {
    pub(super) async fn handle_command(&self, text: &str) {
        let mut parts = text.split_whitespace();
        let command = parts.next().unwrap_or("").to_lowercase();
        let argument = parts.next();

        match command.as_str() {
            "/help" | "/start" => {
                self.telegram.send(HELP).await;
            }
            "/list" => self.list_projects().await,
            "/switch" => self.switch_command(argument).await,
            "/status" => self.status().await,
            "/new" => self.start_session(false).await,
            "/resume" => self.start_session(true).await,
            "/stop" => self.stop_session().await,
            "/output" => self.show_output().await,
            _ => {
                self.telegram
                    .send(&format!("Unknown command `{command}`. Try /help."))
                    .await;
            }
        }
    }

    /// Require an active project or tell the operator how to get one.
    async fn active_or_hint(&self) -> Option<String> {
        let active = self.sessions.active();
        if active.is_none() {
            self.telegram
                .send("⚠️ No active project. Pick one with /switch.")
                .await;
        }
        active
    }

    async fn list_projects(&self) {
        let projects = self.sessions.projects();
        if projects.is_empty() {
            self.telegram
                .send("No projects configured. Add some to config.json and restart.")
                .await;
            return;
        }

        let active = self.sessions.active();
        let mut lines = vec!["📂 *Projects*".to_string()];
        let mut buttons = Vec::new();
        for project in &projects {
            let state = if self.sessions.is_running(&project.name).await {
                "🟢"
            } else {
                "⚪️"
            };
            let marker = if active.as_deref() == Some(project.name.as_str()) {
                " ▶️"
            } else {
                ""
            };
            lines.push(format!(
                "{state} *{}*{marker}\n   `{}`",
                project.name,
                project.path.display()
            ));
            buttons.push(InlineButton::new(
                format!("Switch to {}", project.name),
                format!("switch:{}", project.name),
            ));
        }

        self.telegram
            .send_with_keyboard(&lines.join("\n"), InlineKeyboard::column(buttons))
            .await;
    }

    async fn switch_command(&self, name: Option<&str>) {
        match name {
            Some(name) => {
                if self.sessions.set_active(name) {
                    self.telegram
                        .send(&format!("▶️ Active project: *{name}*"))
                        .await;
                } else {
                    self.telegram
                        .send(&format!("❌ Unknown project `{name}`. See /list."))
                        .await;
                }
            }
            None => self.list_projects().await,
        }
    }

    async fn status(&self) {
        let Some(active) = self.active_or_hint().await else {
            return;
        };
        let state = if self.sessions.is_running(&active).await {
            "🟢 session running"
        } else {
            "⚪️ no session"
        };
        let path = self
            .sessions
            .projects()
            .iter()
            .find(|p| p.name == active)
            .map(|p| p.path.display().to_string())
            .unwrap_or_default();
        self.telegram
            .send(&format!("▶️ *{active}*\n`{path}`\n{state}"))
            .await;
    }

    async fn start_session(&self, resume: bool) {
        let Some(active) = self.active_or_hint().await else {
            return;
        };
        let started = if resume {
            self.sessions.resume_session(&active).await
        } else {
            self.sessions.new_session(&active).await
        };
        if started {
            let verb = if resume { "resumed" } else { "started" };
            self.telegram
                .send(&format!("🚀 Session {verb} in *{active}*\nSend a prompt when ready."))
                .await;
        } else {
            self.telegram
                .send(&format!("❌ Could not start a session in *{active}*."))
                .await;
        }
    }

    async fn stop_session(&self) {
        let Some(active) = self.active_or_hint().await else {
            return;
        };
        self.sessions.kill_session(&active).await;
        self.telegram
            .send(&format!("🛑 Session stopped in *{active}*"))
            .await;
    }

    async fn show_output(&self) {
        let Some(active) = self.active_or_hint().await else {
            return;
        };
        let output = self.sessions.capture_output(&active).await;
        let tail = tail_chars(output.trim_end(), OUTPUT_TAIL_CHARS);
        if tail.trim().is_empty() {
            self.telegram.send(&format!("*{active}*: no output.")).await;
        } else {
            self.telegram
                .send(&format!("📟 *{active}*:\n```\n{tail}\n```"))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::session::testing::ScriptedSessions;
    use crate::session::SessionManager;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_list_offers_switch_buttons() {
        let server = chat_server().await;
        let (_dir, queue) = test_queue();
        let sessions = Arc::new(ScriptedSessions::new("demo", true, &[""]));
        let (bridge, _tx) = bridge_with(&server, sessions, queue);

        bridge.handle_command("/list").await;

        let calls = calls(&server).await;
        assert_eq!(calls.len(), 1);
        let body = &calls[0].1;
        let text = body["text"].as_str().unwrap();
        assert!(text.contains("🟢 *demo*"));
        assert!(text.contains("/tmp/demo"));
        assert_eq!(
            body["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "switch:demo"
        );
    }

    #[tokio::test]
    async fn test_switch_unknown_project_is_an_error_message() {
        let server = chat_server().await;
        let (_dir, queue) = test_queue();
        let sessions = Arc::new(ScriptedSessions::new("demo", true, &[""]));
        let (bridge, _tx) = bridge_with(&server, sessions.clone(), queue);

        bridge.handle_command("/switch ghost").await;

        let calls = calls(&server).await;
        assert!(calls[0].1["text"].as_str().unwrap().contains("Unknown project"));
        assert_eq!(sessions.active().as_deref(), Some("demo"));
    }

    #[tokio::test]
    async fn test_switch_with_name_changes_active() {
        let server = chat_server().await;
        let (_dir, queue) = test_queue();
        let sessions = Arc::new(ScriptedSessions::new("demo", true, &[""]).with_active(None));
        let (bridge, _tx) = bridge_with(&server, sessions.clone(), queue);

        bridge.handle_command("/switch demo").await;

        assert_eq!(sessions.active().as_deref(), Some("demo"));
        let calls = calls(&server).await;
        assert!(calls[0].1["text"].as_str().unwrap().contains("Active project"));
    }

    #[tokio::test]
    async fn test_status_without_active_project() {
        let server = chat_server().await;
        let (_dir, queue) = test_queue();
        let sessions = Arc::new(ScriptedSessions::new("demo", true, &[""]).with_active(None));
        let (bridge, _tx) = bridge_with(&server, sessions, queue);

        bridge.handle_command("/status").await;

        let calls = calls(&server).await;
        assert!(calls[0].1["text"].as_str().unwrap().contains("No active project"));
    }

    #[tokio::test]
    async fn test_stop_reports_even_without_session() {
        let server = chat_server().await;
        let (_dir, queue) = test_queue();
        let sessions = Arc::new(ScriptedSessions::new("demo", false, &[""]));
        let (bridge, _tx) = bridge_with(&server, sessions, queue);

        bridge.handle_command("/stop").await;

        let calls = calls(&server).await;
        assert!(calls[0].1["text"].as_str().unwrap().contains("Session stopped"));
    }

    #[tokio::test]
    async fn test_output_tails_the_pane() {
        let server = chat_server().await;
        let (_dir, queue) = test_queue();
        let long = format!("{}END", "x".repeat(OUTPUT_TAIL_CHARS + 100));
        let sessions = Arc::new(ScriptedSessions::new("demo", true, &[&long]));
        let (bridge, _tx) = bridge_with(&server, sessions, queue);

        bridge.handle_command("/output").await;

        let calls = calls(&server).await;
        let text = calls[0].1["text"].as_str().unwrap();
        assert!(text.contains("END"));
        // Tail-bounded before the transport cap applies
        assert!(text.chars().count() <= OUTPUT_TAIL_CHARS + 50);
    }

    #[tokio::test]
    async fn test_output_empty_pane() {
        let server = chat_server().await;
        let (_dir, queue) = test_queue();
        let sessions = Arc::new(ScriptedSessions::new("demo", true, &["   \n"]));
        let (bridge, _tx) = bridge_with(&server, sessions, queue);

        bridge.handle_command("/output").await;

        let calls = calls(&server).await;
        assert!(calls[0].1["text"].as_str().unwrap().contains("no output"));
    }

    #[tokio::test]
    async fn test_unknown_command_gets_help_hint() {
        let server = chat_server().await;
        let (_dir, queue) = test_queue();
        let sessions = Arc::new(ScriptedSessions::new("demo", true, &[""]));
        let (bridge, _tx) = bridge_with(&server, sessions, queue);

        bridge.handle_command("/frobnicate now").await;

        let calls = calls(&server).await;
        let text = calls[0].1["text"].as_str().unwrap();
        assert!(text.contains("/frobnicate"));
        assert!(text.contains("/help"));
    }
}
