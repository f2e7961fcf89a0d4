//! The bridge: long-poll loop, update dispatch, and approval resolution.
//!
//! One `Bridge` per process. It owns the update offset, the queue handle
//! and the per-project streamer registry; the approval watcher runs as a
//! sibling task sharing the same shutdown signal. Everything that can fail
//! mid-loop is logged and absorbed so the loop itself only ends on
//! shutdown.

pub mod commands;
pub mod streamer;

use crate::approval::{ApprovalQueue, ApprovalWatcher};
use crate::session::SessionManager;
use crate::telegram::{CallbackQuery, Message, TelegramClient, Update};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub use streamer::{OutputStreamer, StreamerConfig, StreamerRegistry};

/// Pause after a failed `getUpdates` before trying again.
const FETCH_BACKOFF: Duration = Duration::from_secs(1);

pub struct Bridge {
    telegram: TelegramClient,
    sessions: Arc<dyn SessionManager>,
    queue: ApprovalQueue,
    streamers: StreamerRegistry,
    streamer_config: StreamerConfig,
    offset: i64,
    shutdown: watch::Receiver<bool>,
}

impl Bridge {
    pub fn new(
        telegram: TelegramClient,
        sessions: Arc<dyn SessionManager>,
        queue: ApprovalQueue,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            telegram,
            sessions,
            queue,
            streamers: StreamerRegistry::new(),
            streamer_config: StreamerConfig::default(),
            offset: 0,
            shutdown,
        }
    }

    /// Override streamer timings. Tests run with millisecond values.
    pub fn with_streamer_config(mut self, config: StreamerConfig) -> Self {
        self.streamer_config = config;
        self
    }

    /// Run until the shutdown signal flips, then join the watcher and any
    /// streamers still live before the disconnect notice goes out.
    pub async fn run(&mut self) {
        self.telegram
            .send("🟢 *Bridge connected*\nSend /help for commands.")
            .await;

        let watcher = ApprovalWatcher::new(self.queue.clone(), self.telegram.clone());
        let watcher_task = tokio::spawn(watcher.run(self.shutdown.clone()));

        let mut shutdown = self.shutdown.clone();
        loop {
            let fetched = tokio::select! {
                _ = shutdown.changed() => break,
                fetched = self.poll_once() => fetched,
            };
            if !fetched {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(FETCH_BACKOFF) => {}
                }
            }
        }

        let _ = watcher_task.await;
        self.streamers.drain().await;
        self.telegram.send("🔴 Bridge disconnected.").await;
        tracing::info!("bridge stopped");
    }

    /// One fetch-and-dispatch pass. `false` when the fetch failed and the
    /// caller should back off.
    pub async fn poll_once(&mut self) -> bool {
        match self.telegram.get_updates(self.offset).await {
            Ok(updates) => {
                // Advance past the whole batch before handling it, so a
                // slow or failing handler cannot cause redelivery.
                if let Some(last) = updates.last() {
                    self.offset = last.update_id + 1;
                }
                for update in updates {
                    self.dispatch(update).await;
                }
                true
            }
            Err(err) => {
                tracing::warn!("update fetch failed: {err}");
                false
            }
        }
    }

    /// Offset the next fetch will use.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    async fn dispatch(&self, update: Update) {
        if let Some(message) = update.message {
            self.handle_message(message).await;
        } else if let Some(callback) = update.callback_query {
            self.handle_callback(callback).await;
        }
    }

    async fn handle_message(&self, message: Message) {
        if message.chat.id != self.telegram.chat_id() {
            tracing::warn!(chat = message.chat.id, "ignoring message from foreign chat");
            return;
        }
        let text = message.text.as_deref().unwrap_or("").trim();
        if text.is_empty() {
            return;
        }
        if text.starts_with('/') {
            self.handle_command(text).await;
        } else {
            self.forward_prompt(text).await;
        }
    }

    async fn handle_callback(&self, callback: CallbackQuery) {
        let data = callback.data.as_deref().unwrap_or("");
        let message_id = callback.message.as_ref().map(|m| m.message_id);

        if let Some(id) = data.strip_prefix("approve:") {
            self.resolve_approval(id, true, message_id, &callback.id)
                .await;
        } else if let Some(id) = data.strip_prefix("reject:") {
            self.resolve_approval(id, false, message_id, &callback.id)
                .await;
        } else if let Some(name) = data.strip_prefix("switch:") {
            self.switch_project(name, message_id, &callback.id).await;
        } else {
            tracing::debug!(data, "unknown callback data");
        }
    }

    /// Record a decision for a pending request and retire its prompt.
    async fn resolve_approval(
        &self,
        id: &str,
        approved: bool,
        message_id: Option<i64>,
        callback_id: &str,
    ) {
        if self.queue.has_request(id) {
            if let Err(err) = self.queue.write_response(id, approved) {
                tracing::error!("could not record decision for {id}: {err:#}");
            }
        } else {
            // The requester already gave up. Writing now would only leave
            // an orphan response file behind.
            tracing::debug!(id, "decision for a request no longer pending");
        }

        let label = if approved { "✅ Approved" } else { "❌ Rejected" };
        self.telegram.answer_callback(callback_id, label).await;
        if let Some(message_id) = message_id {
            let short = crate::telegram::truncate_chars(id, 8);
            self.telegram
                .edit(message_id, &format!("{label} - request `{short}`"))
                .await;
        }
    }

    async fn switch_project(&self, name: &str, message_id: Option<i64>, callback_id: &str) {
        if self.sessions.set_active(name) {
            self.telegram.answer_callback(callback_id, "Switched").await;
            if let Some(message_id) = message_id {
                self.telegram
                    .edit(message_id, &format!("▶️ Active project: *{name}*"))
                    .await;
            }
        } else {
            self.telegram
                .answer_callback(callback_id, "Unknown project")
                .await;
        }
    }

    /// Forward non-command text into the active session and start
    /// streaming its output back.
    async fn forward_prompt(&self, text: &str) {
        let Some(active) = self.sessions.active() else {
            self.telegram
                .send("⚠️ No active project. Pick one with /switch.")
                .await;
            return;
        };
        if !self.sessions.is_running(&active).await {
            self.telegram
                .send(&format!(
                    "⚠️ No session running in *{active}*. Start one with /new or /resume."
                ))
                .await;
            return;
        }

        self.sessions.send_input(&active, text).await;
        self.telegram.send(&format!("📤 Sent to *{active}*")).await;
        self.spawn_streamer(&active).await;
    }

    async fn spawn_streamer(&self, project: &str) {
        let streamer = OutputStreamer::new(
            project,
            Arc::clone(&self.sessions),
            self.telegram.clone(),
            self.streamer_config.clone(),
        );
        self.streamers
            .spawn_if_absent(project, streamer, self.shutdown.clone())
            .await;
    }
}
