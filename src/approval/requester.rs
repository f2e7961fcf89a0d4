//! Hook-side approval wait.
//!
//! The hook files a request into the queue, then blocks its tool call by
//! polling for the response file. No answer by the deadline means denial:
//! the assistant only proceeds on an explicit yes.

use crate::approval::queue::ApprovalQueue;
use crate::approval::types::ApprovalRequest;
use crate::telegram::TelegramClient;
use std::time::Duration;

/// How often the requester re-checks for a response file.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How long an unanswered request waits before it is denied.
const APPROVAL_DEADLINE: Duration = Duration::from_secs(120);

pub struct ApprovalRequester {
    queue: ApprovalQueue,
    telegram: TelegramClient,
    poll_interval: Duration,
    deadline: Duration,
}

impl ApprovalRequester {
    pub fn new(queue: ApprovalQueue, telegram: TelegramClient) -> Self {
        Self {
            queue,
            telegram,
            poll_interval: POLL_INTERVAL,
            deadline: APPROVAL_DEADLINE,
        }
    }

    /// Override the polling cadence. Tests run with millisecond values.
    pub fn with_timing(mut self, poll_interval: Duration, deadline: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.deadline = deadline;
        self
    }

    /// File a request and wait for the remote decision. Fail-closed: every
    /// path that does not produce an explicit approval returns `false`.
    pub async fn request_approval(&self, tool: &str, detail: &str, project: &str) -> bool {
        let request = ApprovalRequest::new(tool, detail, project);
        if let Err(err) = self.queue.submit(&request) {
            tracing::error!("could not file approval request: {err:#}");
            return false;
        }
        tracing::info!(id = %request.id, tool, project, "approval requested");

        let deadline = tokio::time::Instant::now() + self.deadline;
        loop {
            if let Some(response) = self.queue.take_response(&request.id) {
                self.queue.remove_request(&request.id);
                tracing::info!(id = %request.id, approved = response.approved, "approval resolved");
                return response.approved;
            }
            if tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        // Deadline passed. Withdraw the request, then drain a response that
        // raced in during the final poll gap so neither side leaks a file.
        self.queue.remove_request(&request.id);
        let _ = self.queue.take_response(&request.id);
        tracing::warn!(id = %request.id, tool, "approval timed out, denying");
        self.telegram
            .send(&format!(
                "⏰ *Timeout* - operation cancelled\nProject: `{project}` | Tool: `{tool}`"
            ))
            .await;
        false
    }
}
