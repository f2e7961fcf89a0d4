//! Durable file mailbox shared by the hook process and the bridge.
//!
//! Layout inside the queue directory:
//! - `request_<id>.json`:  filed by the hook, scanned by the bridge
//! - `response_<id>.json`: filed by the bridge, consumed by the hook
//!
//! Every write goes through a temp sibling plus an atomic rename, so a scan
//! never observes a half-written record under a scanned name. File presence
//! is the whole protocol: no locks, no channel between the processes.

use crate::approval::types::{ApprovalRequest, ApprovalResponse};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ApprovalQueue {
    dir: PathBuf,
}

impl ApprovalQueue {
    /// Open a queue directory, creating it if needed. Construction is the
    /// only fallible part of the reading side.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create approval dir: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn request_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("request_{id}.json"))
    }

    fn response_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("response_{id}.json"))
    }

    /// File a request.
    pub fn submit(&self, request: &ApprovalRequest) -> Result<()> {
        let json = serde_json::to_string_pretty(request)?;
        write_atomic(&self.request_path(&request.id), json.as_bytes())
    }

    /// All parseable pending requests, oldest first. Malformed files are
    /// logged and skipped; they never abort a scan.
    pub fn pending(&self) -> Vec<ApprovalRequest> {
        let pattern = format!("{}/request_*.json", self.dir.display());
        let paths = match glob::glob(&pattern) {
            Ok(paths) => paths,
            Err(err) => {
                tracing::warn!("bad queue pattern {pattern}: {err}");
                return Vec::new();
            }
        };

        let mut requests = Vec::new();
        for path in paths.flatten() {
            match read_request(&path) {
                Ok(request) => requests.push(request),
                Err(err) => {
                    tracing::warn!("skipping malformed request {}: {err:#}", path.display());
                }
            }
        }
        requests.sort_by_key(|r| r.created_at);
        requests
    }

    /// True while the request file exists, i.e. the hook is still waiting.
    pub fn has_request(&self, id: &str) -> bool {
        self.request_path(id).exists()
    }

    /// Record a decision. Overwriting an earlier decision is allowed: last
    /// write wins, and the requester reads at most once.
    pub fn write_response(&self, id: &str, approved: bool) -> Result<()> {
        let json = serde_json::to_string(&ApprovalResponse { approved })?;
        write_atomic(&self.response_path(id), json.as_bytes())
    }

    /// Consume the response for `id` if one has landed. A malformed
    /// response file is deleted and treated as absent, so polling goes on.
    pub fn take_response(&self, id: &str) -> Option<ApprovalResponse> {
        let path = self.response_path(id);
        let content = std::fs::read_to_string(&path).ok()?;
        let parsed = serde_json::from_str::<ApprovalResponse>(&content);
        let _ = std::fs::remove_file(&path);
        match parsed {
            Ok(response) => Some(response),
            Err(err) => {
                tracing::warn!("discarding malformed response {}: {err}", path.display());
                None
            }
        }
    }

    /// Withdraw a request. Best-effort: a file already gone is fine.
    pub fn remove_request(&self, id: &str) {
        let _ = std::fs::remove_file(self.request_path(id));
    }
}

fn read_request(path: &Path) -> Result<ApprovalRequest> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Write via a temp sibling plus rename. The `.json.tmp` suffix keeps the
/// file invisible to the `request_*.json` scan until the rename lands.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", tmp.display()))?;
    Ok(())
}
