//! Live output streaming from an assistant session to the chat.
//!
//! After a prompt is forwarded, one streamer task per project samples the
//! session's visible output and mirrors growth to the chat, editing its
//! previous chunk message in place while the chunk stays small. A run of
//! quiet ticks ends the stream; the next prompt starts a fresh one.

use crate::session::SessionManager;
use crate::telegram::{tail_chars, TelegramClient};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Tunables for one streamer task.
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    /// Delay before the first sample, giving the assistant time to start.
    pub grace: Duration,
    /// Time between samples.
    pub tick: Duration,
    /// Quiet ticks in a row before the stream ends.
    pub idle_limit: u32,
    /// Suffixes at or below this many chars do not count as progress.
    pub min_chunk: usize,
    /// Chunk tail bound; also the cutoff between editing and re-sending.
    pub chunk_chars: usize,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(3),
            tick: Duration::from_secs(3),
            idle_limit: 10,
            min_chunk: 10,
            chunk_chars: 2000,
        }
    }
}

/// Progress of one streaming task.
#[derive(Debug, Default)]
struct StreamCursor {
    /// Full capture at the last emission; new content is whatever a later
    /// capture holds past this length.
    last_output: String,
    /// Chat message currently being edited with fresh chunks.
    last_message_id: Option<i64>,
    /// Consecutive ticks without meaningful growth.
    idle_count: u32,
}

pub struct OutputStreamer {
    project: String,
    sessions: Arc<dyn SessionManager>,
    telegram: TelegramClient,
    config: StreamerConfig,
    cursor: StreamCursor,
}

impl OutputStreamer {
    pub fn new(
        project: &str,
        sessions: Arc<dyn SessionManager>,
        telegram: TelegramClient,
        config: StreamerConfig,
    ) -> Self {
        Self {
            project: project.to_string(),
            sessions,
            telegram,
            config,
            cursor: StreamCursor::default(),
        }
    }

    /// Sample until the session goes quiet or the bridge shuts down. The
    /// shutdown check sits between ticks, so a chunk in flight is never
    /// cancelled halfway.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) {
        tracing::debug!(project = %self.project, "streamer started");
        tokio::time::sleep(self.config.grace).await;

        while !*shutdown.borrow() {
            let output = self.sessions.capture_output(&self.project).await;
            if self.advance(output).await {
                self.cursor.idle_count = 0;
            } else {
                self.cursor.idle_count += 1;
                if self.cursor.idle_count >= self.config.idle_limit {
                    break;
                }
            }
            tokio::time::sleep(self.config.tick).await;
        }
        tracing::debug!(project = %self.project, "streamer finished");
    }

    /// Push one capture through the cursor. True when a chunk went out.
    async fn advance(&mut self, output: String) -> bool {
        if output.is_empty() || output == self.cursor.last_output {
            return false;
        }
        // Suffix past the old length. Shrunk or rewritten output lands on
        // a non-boundary and yields nothing instead of a bogus slice.
        let new_content = output
            .get(self.cursor.last_output.len()..)
            .unwrap_or("")
            .trim()
            .to_string();
        if new_content.chars().count() <= self.config.min_chunk {
            return false;
        }

        let chunk = format!(
            "📺 `{}`:\n```\n{}\n```",
            self.project,
            tail_chars(&new_content, self.config.chunk_chars)
        );

        let mut delivered = false;
        if let Some(message_id) = self.cursor.last_message_id {
            if new_content.chars().count() < self.config.chunk_chars {
                delivered = self.telegram.edit(message_id, &chunk).await;
            }
        }
        if !delivered {
            if let Some(message_id) = self.telegram.send(&chunk).await {
                self.cursor.last_message_id = Some(message_id);
            }
        }

        self.cursor.last_output = output;
        true
    }
}

/// At most one live streamer per project. Map membership is the liveness
/// test: each task removes its own entry as its last act, so no task
/// state is ever probed.
#[derive(Clone, Default)]
pub struct StreamerRegistry {
    tasks: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl StreamerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `streamer` unless the project already has a live task.
    /// Returns whether a task was started.
    pub async fn spawn_if_absent(
        &self,
        project: &str,
        streamer: OutputStreamer,
        shutdown: watch::Receiver<bool>,
    ) -> bool {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(project) {
            tracing::debug!(project, "streamer already live");
            return false;
        }

        let registry = Arc::clone(&self.tasks);
        let name = project.to_string();
        let cleanup_name = name.clone();
        let handle = tokio::spawn(async move {
            streamer.run(shutdown).await;
            registry.lock().await.remove(&cleanup_name);
        });
        tasks.insert(name, handle);
        true
    }

    /// Whether a project currently has a live streamer.
    pub async fn is_streaming(&self, project: &str) -> bool {
        self.tasks.lock().await.contains_key(project)
    }

    pub async fn live_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Wait for every live task to finish. Meant for shutdown, once the
    /// watch flag has flipped: each task sees the flag between ticks, so
    /// the wait is bounded by one tick plus any send in flight.
    pub async fn drain(&self) {
        let handles: Vec<_> = self.tasks.lock().await.drain().collect();
        for (project, handle) in handles {
            if let Err(err) = handle.await {
                tracing::warn!(project = %project, "streamer task failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramConfig;
    use crate::session::testing::ScriptedSessions;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config(idle_limit: u32, min_chunk: usize) -> StreamerConfig {
        StreamerConfig {
            grace: Duration::from_millis(1),
            tick: Duration::from_millis(5),
            idle_limit,
            min_chunk,
            chunk_chars: 2000,
        }
    }

    fn client_for(server: &MockServer) -> TelegramClient {
        TelegramClient::new(&TelegramConfig {
            token: "T".to_string(),
            chat_id: 1,
            api_url: Some(server.uri()),
        })
    }

    async fn chat_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/sendMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "result": {"message_id": 10}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botT/editMessageText"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": true})),
            )
            .mount(&server)
            .await;
        server
    }

    async fn bodies(server: &MockServer) -> Vec<(String, Value)> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| {
                (
                    r.url.path().to_string(),
                    serde_json::from_slice(&r.body).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_default_tunables() {
        let config = StreamerConfig::default();
        assert_eq!(config.grace, Duration::from_secs(3));
        assert_eq!(config.tick, Duration::from_secs(3));
        assert_eq!(config.idle_limit, 10);
        assert_eq!(config.min_chunk, 10);
        assert_eq!(config.chunk_chars, 2000);
    }

    #[tokio::test]
    async fn test_growth_sends_then_edits_suffix_only() {
        let server = chat_server().await;
        let sessions = Arc::new(ScriptedSessions::new(
            "demo",
            true,
            &["alpha", "alphabeta"],
        ));
        let streamer = OutputStreamer::new(
            "demo",
            sessions.clone(),
            client_for(&server),
            fast_config(3, 0),
        );

        let (_tx, rx) = watch::channel(false);
        streamer.run(rx).await;

        let calls = bodies(&server).await;
        assert_eq!(calls.len(), 2);

        // First capture goes out as a fresh message
        assert!(calls[0].0.ends_with("sendMessage"));
        let first = calls[0].1["text"].as_str().unwrap();
        assert!(first.contains("📺 `demo`"));
        assert!(first.contains("alpha"));

        // Growth is edited in place and carries only the suffix
        assert!(calls[1].0.ends_with("editMessageText"));
        assert_eq!(calls[1].1["message_id"], 10);
        let second = calls[1].1["text"].as_str().unwrap();
        assert!(second.contains("beta"));
        assert!(!second.contains("alphabeta"));

        // Quiet captures after the last emission, then exactly idle_limit
        // more to terminate
        assert_eq!(sessions.captures(), 2 + 3);
    }

    #[tokio::test]
    async fn test_small_growth_never_emits() {
        let server = chat_server().await;
        let sessions = Arc::new(ScriptedSessions::new("demo", true, &["hi"]));
        let streamer = OutputStreamer::new(
            "demo",
            sessions.clone(),
            client_for(&server),
            fast_config(4, 10),
        );

        let (_tx, rx) = watch::channel(false);
        streamer.run(rx).await;

        assert!(server.received_requests().await.unwrap().is_empty());
        // Terminates after exactly idle_limit quiet ticks, not before
        assert_eq!(sessions.captures(), 4);
    }

    #[tokio::test]
    async fn test_shrunk_output_is_idle_not_panic() {
        let server = chat_server().await;
        let sessions = Arc::new(ScriptedSessions::new(
            "demo",
            true,
            &["a longer first capture", "tiny"],
        ));
        let streamer = OutputStreamer::new(
            "demo",
            sessions.clone(),
            client_for(&server),
            fast_config(2, 0),
        );

        let (_tx, rx) = watch::channel(false);
        streamer.run(rx).await;

        // Only the first capture was emitted; the shrunk one counted idle
        let calls = bodies(&server).await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1["text"].as_str().unwrap().contains("first capture"));
    }

    #[tokio::test]
    async fn test_multibyte_boundary_is_safe() {
        let server = chat_server().await;
        // Second capture is shorter in a way that lands mid-scalar
        let sessions = Arc::new(ScriptedSessions::new("demo", true, &["ab", "📺"]));
        let streamer = OutputStreamer::new(
            "demo",
            sessions.clone(),
            client_for(&server),
            fast_config(2, 0),
        );

        let (_tx, rx) = watch::channel(false);
        streamer.run(rx).await;
        assert_eq!(bodies(&server).await.len(), 1);
    }

    #[tokio::test]
    async fn test_registry_refuses_second_streamer() {
        let server = chat_server().await;
        let sessions = Arc::new(ScriptedSessions::new("demo", true, &[""]));
        let registry = StreamerRegistry::new();
        let (tx, rx) = watch::channel(false);

        let slow = StreamerConfig {
            grace: Duration::from_millis(5),
            tick: Duration::from_millis(10),
            idle_limit: 1000,
            min_chunk: 10,
            chunk_chars: 2000,
        };
        let first = OutputStreamer::new("demo", sessions.clone(), client_for(&server), slow.clone());
        let second = OutputStreamer::new("demo", sessions.clone(), client_for(&server), slow);

        assert!(registry.spawn_if_absent("demo", first, rx.clone()).await);
        assert!(!registry.spawn_if_absent("demo", second, rx.clone()).await);
        assert_eq!(registry.live_count().await, 1);

        // Shutdown releases the slot...
        tx.send(true).unwrap();
        for _ in 0..200 {
            if !registry.is_streaming("demo").await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!registry.is_streaming("demo").await);

        // ...and a later prompt can stream again
        let (_tx2, rx2) = watch::channel(false);
        let third = OutputStreamer::new(
            "demo",
            sessions.clone(),
            client_for(&server),
            fast_config(1, 0),
        );
        assert!(registry.spawn_if_absent("demo", third, rx2).await);
    }

    #[tokio::test]
    async fn test_drain_waits_for_inflight_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/sendMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"ok": true, "result": {"message_id": 10}}))
                    .set_delay(Duration::from_millis(150)),
            )
            .mount(&server)
            .await;

        let sessions = Arc::new(ScriptedSessions::new(
            "demo",
            true,
            &["a chunk worth delivering"],
        ));
        let streamer = OutputStreamer::new(
            "demo",
            sessions.clone(),
            client_for(&server),
            StreamerConfig {
                grace: Duration::from_millis(1),
                tick: Duration::from_millis(5),
                idle_limit: 1000,
                min_chunk: 0,
                chunk_chars: 2000,
            },
        );

        let registry = StreamerRegistry::new();
        let (tx, rx) = watch::channel(false);
        assert!(registry.spawn_if_absent("demo", streamer, rx).await);

        // Flip the flag while the first chunk is still inside the HTTP
        // call, then wait out the task
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        registry.drain().await;

        // The chunk went out whole and the task is gone
        let calls = bodies(&server).await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1["text"]
            .as_str()
            .unwrap()
            .contains("a chunk worth delivering"));
        assert_eq!(registry.live_count().await, 0);
    }
}
