//! agentgram-hook — Claude Code lifecycle hook.
//!
//! Claude Code runs this binary on hook events and pipes the event
//! payload as JSON to stdin. The event name comes from the
//! CLAUDE_HOOK_TYPE environment variable, or the first argument when
//! invoked by hand:
//!   - PreToolUse:   gated tools wait for a Telegram approval; a
//!     denial prints a block record on stdout.
//!   - Notification: relayed to the operator chat.
//!   - Stop:         completion notice for the project.
//!
//! Exit code is 0 in every case except a missing or unreadable
//! config, which exits 1 so the setup problem surfaces in the session.
//!
//! Stdin format (from Claude Code):
//! {
//!   "cwd": "/project/path",
//!   "tool_name": "Bash",
//!   "tool_input": { "command": "cargo test" }
//! }

use agentgram::approval::{ApprovalQueue, ApprovalRequester};
use agentgram::config::Config;
use agentgram::telegram::{truncate_chars, TelegramClient};
use std::io::Read;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

/// Telegram send timeout. The hook runs inside a tool-call round trip,
/// so it gives up on the network much sooner than the bridge does.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// How much file content to quote in a Write/Edit approval message.
const FILE_PREVIEW_CHARS: usize = 400;

/// How much raw tool input to quote for tools without a special case.
const INPUT_PREVIEW_CHARS: usize = 500;

/// Event payload from Claude Code's hook system. Every field is
/// optional: Notification and Stop events carry none of the tool
/// fields, and a malformed payload degrades to all-empty.
#[derive(serde::Deserialize, Debug, Default)]
struct HookInput {
    cwd: Option<String>,
    tool_name: Option<String>,
    #[serde(default)]
    tool_input: serde_json::Value,
    message: Option<String>,
    stop_reason: Option<String>,
}

/// Record printed on stdout to make Claude Code block the tool call.
#[derive(serde::Serialize)]
struct BlockOutput {
    action: &'static str,
    message: String,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let event = hook_event();

    let mut raw = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
        eprintln!("[agentgram] Failed to read stdin: {}", e);
        raw.clear();
    }
    // A payload we cannot parse is treated as empty rather than fatal.
    let input: HookInput = serde_json::from_str(&raw).unwrap_or_default();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            // The one fatal path: without a config there is no chat to ask.
            eprintln!("[agentgram] Config error: {:#}", e);
            process::exit(1);
        }
    };

    let cwd = input
        .cwd
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let project = config.project_for_cwd(&cwd);

    match event.as_str() {
        "PreToolUse" => pre_tool_use(&config, &project, &input).await,
        "Notification" => notification(&config, &project, &input).await,
        "Stop" => stop(&config, &project, &input).await,
        // Unknown events pass through silently.
        _ => {}
    }
}

/// Event name from CLAUDE_HOOK_TYPE, falling back to the first command
/// line argument (`agentgram-hook Stop` is the manual form).
fn hook_event() -> String {
    std::env::var("CLAUDE_HOOK_TYPE")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::args().nth(1))
        .unwrap_or_default()
}

/// Gate a tool call behind a Telegram approval.
///
/// Tools outside the configured approval list pass straight through.
/// Infrastructure trouble short of a missing config fails open: the
/// hook must not wedge a session the operator cannot see.
async fn pre_tool_use(config: &Config, project: &str, input: &HookInput) {
    let tool = input.tool_name.as_deref().unwrap_or("");
    if !config.is_gated(tool) {
        return;
    }

    let queue = match Config::approvals_dir().and_then(|dir| ApprovalQueue::open(dir)) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("[agentgram] Approval queue unavailable: {:#}", e);
            return;
        }
    };

    let telegram = TelegramClient::with_timeout(&config.telegram, SEND_TIMEOUT);
    let requester = ApprovalRequester::new(queue, telegram);
    let detail = tool_detail(tool, &input.tool_input);

    if !requester.request_approval(tool, &detail, project).await {
        let block = BlockOutput {
            action: "block",
            message: "❌ Rejected via Telegram".to_string(),
        };
        match serde_json::to_string(&block) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("[agentgram] Failed to encode block record: {}", e),
        }
    }
}

/// Relay a Notification event to the operator chat.
async fn notification(config: &Config, project: &str, input: &HookInput) {
    let message = input.message.as_deref().unwrap_or("").trim();
    if message.is_empty() {
        return;
    }
    let telegram = TelegramClient::with_timeout(&config.telegram, SEND_TIMEOUT);
    telegram
        .send(&format!("🔔 *{}*\n{}", project, message))
        .await;
}

/// Announce that a session finished its turn.
async fn stop(config: &Config, project: &str, input: &HookInput) {
    let reason = input.stop_reason.as_deref().unwrap_or("completed");
    let telegram = TelegramClient::with_timeout(&config.telegram, SEND_TIMEOUT);
    telegram
        .send(&format!("✅ *{}* finished\nReason: `{}`", project, reason))
        .await;
}

/// Human-readable summary of a tool call for the approval message.
fn tool_detail(tool: &str, tool_input: &serde_json::Value) -> String {
    match tool {
        "Bash" => tool_input
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),

        "Write" | "Edit" | "MultiEdit" => {
            let path = tool_input
                .get("file_path")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            let content = tool_input
                .get("new_string")
                .or_else(|| tool_input.get("content"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            if content.is_empty() {
                format!("File: {}", path)
            } else {
                format!(
                    "File: {}\n{}",
                    path,
                    truncate_chars(content, FILE_PREVIEW_CHARS)
                )
            }
        }

        _ => {
            let pretty = serde_json::to_string_pretty(tool_input).unwrap_or_default();
            truncate_chars(&pretty, INPUT_PREVIEW_CHARS).to_string()
        }
    }
}

/// Library warnings go to stderr; RUST_LOG overrides the level.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agentgram=warn".parse().unwrap()),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}
