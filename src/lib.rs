//! Agentgram — Telegram bridge for Claude Code sessions.
//!
//! This library exposes the core components of Agentgram for integration
//! testing and programmatic use. The bridge entrypoint is in `main.rs`, the
//! Claude Code hook entrypoint in `hook/main.rs`.

// Suppress warnings for items whose only users are the binaries and
// integration tests (separate compilation units).
#![allow(dead_code)]

pub mod approval;
pub mod bridge;
pub mod config;
pub mod session;
pub mod telegram;
