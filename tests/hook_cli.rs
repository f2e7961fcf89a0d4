//! agentgram-hook binary behavior, driven through assert_cmd.
//!
//! The blocking PreToolUse path waits minutes for an operator, so these
//! tests stick to the paths that return promptly: config errors,
//! ungated tools, unknown events, and notices sent toward an
//! unroutable Telegram endpoint.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const HOME_ENV: &str = "AGENTGRAM_HOME";

fn hook() -> Command {
    Command::cargo_bin("agentgram-hook").unwrap()
}

/// Drop a valid config into the fake data dir. The api_url points at a
/// closed port so nothing ever reaches Telegram.
fn write_config(home: &TempDir) {
    let config = serde_json::json!({
        "telegram": {
            "token": "TEST",
            "chat_id": 1,
            "api_url": "http://127.0.0.1:9"
        },
        "projects": [{"name": "demo", "path": home.path().join("demo")}],
        "approval_tools": ["Bash"],
        "session": {"command": "claude"}
    });
    std::fs::write(
        home.path().join("config.json"),
        serde_json::to_string_pretty(&config).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_missing_config_is_fatal() {
    let home = TempDir::new().unwrap();
    hook()
        .env(HOME_ENV, home.path())
        .env("CLAUDE_HOOK_TYPE", "PreToolUse")
        .write_stdin(r#"{"tool_name":"Bash","tool_input":{"command":"ls"}}"#)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Config error"));
}

#[test]
fn test_ungated_tool_passes_through() {
    let home = TempDir::new().unwrap();
    write_config(&home);
    hook()
        .env(HOME_ENV, home.path())
        .env("CLAUDE_HOOK_TYPE", "PreToolUse")
        .write_stdin(r#"{"tool_name":"Read","tool_input":{"file_path":"/etc/hosts"}}"#)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_unknown_event_is_ignored() {
    let home = TempDir::new().unwrap();
    write_config(&home);
    hook()
        .env(HOME_ENV, home.path())
        .env("CLAUDE_HOOK_TYPE", "SessionStart")
        .write_stdin("{}")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_event_name_falls_back_to_argv() {
    let home = TempDir::new().unwrap();
    write_config(&home);
    // No CLAUDE_HOOK_TYPE set; the argument selects the event. The Stop
    // notice goes to the dead endpoint, which must not become a failure.
    hook()
        .env(HOME_ENV, home.path())
        .env_remove("CLAUDE_HOOK_TYPE")
        .arg("Stop")
        .write_stdin(r#"{"stop_reason":"done"}"#)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_notification_with_unreachable_telegram_still_exits_zero() {
    let home = TempDir::new().unwrap();
    write_config(&home);
    hook()
        .env(HOME_ENV, home.path())
        .env("CLAUDE_HOOK_TYPE", "Notification")
        .write_stdin(r#"{"message":"Claude needs your attention"}"#)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_garbage_stdin_does_not_crash() {
    let home = TempDir::new().unwrap();
    write_config(&home);
    hook()
        .env(HOME_ENV, home.path())
        .env("CLAUDE_HOOK_TYPE", "Notification")
        .write_stdin("not json at all")
        .assert()
        .success();
}
