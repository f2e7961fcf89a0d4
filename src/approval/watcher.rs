//! Bridge-side watcher that announces pending approval requests.
//!
//! Scans the queue directory on a short cadence and posts each request to
//! the chat exactly once, with approve/reject buttons whose callback data
//! the dispatch loop understands. The announced set lives on the watcher
//! itself and is pruned against the directory every scan, so its memory
//! tracks the files actually present.

use crate::approval::queue::ApprovalQueue;
use crate::approval::types::ApprovalRequest;
use crate::telegram::{InlineButton, InlineKeyboard, TelegramClient};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::watch;

/// Scan cadence. Announcement latency is at most this plus one send.
const SCAN_INTERVAL: Duration = Duration::from_millis(500);

pub struct ApprovalWatcher {
    queue: ApprovalQueue,
    telegram: TelegramClient,
    interval: Duration,
    announced: HashSet<String>,
}

impl ApprovalWatcher {
    pub fn new(queue: ApprovalQueue, telegram: TelegramClient) -> Self {
        Self {
            queue,
            telegram,
            interval: SCAN_INTERVAL,
            announced: HashSet::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Scan until the shutdown signal flips.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::debug!(dir = %self.queue.dir().display(), "approval watcher started");
        while !*shutdown.borrow() {
            self.scan().await;
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::debug!("approval watcher stopped");
    }

    /// One pass: prune the announced set, announce anything new.
    pub async fn scan(&mut self) {
        let pending = self.queue.pending();

        // A consumed or withdrawn request frees its slot in the set.
        let live: HashSet<&str> = pending.iter().map(|r| r.id.as_str()).collect();
        self.announced.retain(|id| live.contains(id.as_str()));

        for request in pending {
            // Inserted before the send: a failed announcement is dropped,
            // not retried on the next scan.
            if self.announced.insert(request.id.clone()) {
                self.announce(&request).await;
            }
        }
    }

    /// Requests currently remembered as announced.
    pub fn announced_count(&self) -> usize {
        self.announced.len()
    }

    async fn announce(&self, request: &ApprovalRequest) {
        tracing::info!(id = %request.id, tool = %request.tool, project = %request.project,
            "announcing approval request");
        let text = format!(
            "⚠️ *Approval required*\n\n*Project:* `{}`\n*Tool:* `{}`\n\n```\n{}\n```",
            request.project, request.tool, request.detail
        );
        let keyboard = InlineKeyboard::row(vec![
            InlineButton::new("✅ Approve", format!("approve:{}", request.id)),
            InlineButton::new("❌ Reject", format!("reject:{}", request.id)),
        ]);
        self.telegram.send_with_keyboard(&text, keyboard).await;
    }
}
