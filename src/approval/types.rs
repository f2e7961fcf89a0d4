//! Records exchanged through the shared approval mailbox.
//!
//! The hook process writes requests and reads responses; the bridge does
//! the reverse. Both sides ship in the same binary today, but the response
//! wire shape is pinned to `{"approved":<bool>}` so either side can be
//! swapped out independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest detail string stored in a request. Anything past this is noise
/// in a phone-sized prompt.
pub const DETAIL_LIMIT: usize = 800;

/// A tool call waiting for a remote decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Random id; also keys the request/response filenames.
    pub id: String,
    /// Project the tool call belongs to.
    pub project: String,
    /// Tool name as reported by the assistant ("Bash", "Write", ...).
    pub tool: String,
    /// What the tool is about to do, in human terms.
    pub detail: String,
    /// When the request was filed.
    pub created_at: DateTime<Utc>,
}

impl ApprovalRequest {
    pub fn new(tool: &str, detail: &str, project: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project: project.to_string(),
            tool: tool.to_string(),
            detail: crate::telegram::truncate_chars(detail, DETAIL_LIMIT).to_string(),
            created_at: Utc::now(),
        }
    }
}

/// The remote decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub approved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_wire_shape_is_pinned() {
        assert_eq!(
            serde_json::to_string(&ApprovalResponse { approved: true }).unwrap(),
            r#"{"approved":true}"#
        );
        assert_eq!(
            serde_json::to_string(&ApprovalResponse { approved: false }).unwrap(),
            r#"{"approved":false}"#
        );
    }

    #[test]
    fn test_new_request_bounds_detail() {
        let request = ApprovalRequest::new("Bash", &"x".repeat(5000), "demo");
        assert_eq!(request.detail.chars().count(), DETAIL_LIMIT);
        assert_eq!(request.tool, "Bash");
        assert_eq!(request.project, "demo");
        assert_eq!(request.id.len(), 36);
    }

    #[test]
    fn test_request_roundtrip() {
        let request = ApprovalRequest::new("Write", "File: /tmp/a.txt", "demo");
        let json = serde_json::to_string(&request).unwrap();
        let back: ApprovalRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, request.id);
        assert_eq!(back.detail, "File: /tmp/a.txt");
        assert_eq!(back.created_at, request.created_at);
    }
}
