//! Stream session
//!
//! One in-flight request for one (config, model) pair. A session emits zero
//! or more fragment events followed by exactly one terminal event, then
//! stops.

use super::router::SessionTarget;
use super::usage::normalize_usage;
use crate::models::openai::WireUsage;
use crate::models::{ChatPrompt, SessionDuration, SessionKey, StreamEvent};
use crate::providers::{build_provider, Provider, ProviderEvent};
use crate::utils::error::StreamError;
use futures::StreamExt;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Streaming,
    Finished,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Failed)
    }
}

/// How a session ended, as seen by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Finished event delivered
    Finished,
    /// Failed event delivered
    Failed,
    /// Receiver went away; the session stopped without a terminal event
    Detached,
}

/// Result of draining the provider stream
enum Drained {
    Finished(Option<WireUsage>),
    SinkClosed,
}

pub struct StreamSession {
    key: SessionKey,
    target: SessionTarget,
    prompt: Arc<ChatPrompt>,
    client: Client,
    timeout: Option<Duration>,
    state: SessionState,
    started: Option<Instant>,
    first_token: Option<Duration>,
}

impl StreamSession {
    pub fn new(target: SessionTarget, prompt: Arc<ChatPrompt>, client: Client, timeout: Option<Duration>) -> Self {
        Self {
            key: target.key.clone(),
            target,
            prompt,
            client,
            timeout,
            state: SessionState::Pending,
            started: None,
            first_token: None,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run to completion, delivering events to `sink`
    ///
    /// Cancellation and the optional timeout both end the session with a
    /// Failed event. Dropping the provider stream closes its connection.
    pub async fn run(mut self, sink: &mpsc::Sender<StreamEvent>, cancel: &CancellationToken) -> SessionOutcome {
        self.started = Some(Instant::now());

        let provider = match build_provider(&self.target.config, self.client.clone()) {
            Ok(provider) => provider,
            Err(err) => return self.fail(sink, err).await,
        };

        let timeout = self.timeout;
        let result = {
            let drive = self.drive(provider, sink);
            let bounded = async move {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, drive)
                        .await
                        .unwrap_or(Err(StreamError::Timeout(limit.as_secs()))),
                    None => drive.await,
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(StreamError::Cancelled),
                result = bounded => result,
            }
        };

        match result {
            Ok(Drained::Finished(usage)) => self.finish(sink, usage).await,
            Ok(Drained::SinkClosed) => {
                debug!("Session {} stopped, receiver closed", self.key);
                SessionOutcome::Detached
            }
            Err(err) => self.fail(sink, err).await,
        }
    }

    /// Fail a session that never got to run
    pub async fn reject(mut self, sink: &mpsc::Sender<StreamEvent>, err: StreamError) -> SessionOutcome {
        self.fail(sink, err).await
    }

    async fn drive(&mut self, provider: Arc<dyn Provider>, sink: &mpsc::Sender<StreamEvent>) -> Result<Drained, StreamError> {
        let model = provider.upstream_model(&self.target.model).to_string();
        let mut stream = provider.chat_stream(&model, &self.prompt).await?;

        self.state = SessionState::Streaming;
        debug!("Session {} streaming from {}", self.key, provider.name());

        while let Some(event) = stream.next().await {
            match event? {
                ProviderEvent::Fragment(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    if self.first_token.is_none() {
                        self.first_token = Some(self.elapsed());
                    }
                    if sink.send(StreamEvent::fragment(&self.key, text)).await.is_err() {
                        return Ok(Drained::SinkClosed);
                    }
                }
                ProviderEvent::Finished(usage) => return Ok(Drained::Finished(usage)),
            }
        }

        // Adapters always end with Finished or an error
        Ok(Drained::Finished(None))
    }

    async fn finish(&mut self, sink: &mpsc::Sender<StreamEvent>, usage: Option<WireUsage>) -> SessionOutcome {
        self.state = SessionState::Finished;

        let duration = SessionDuration {
            total: self.elapsed().as_secs_f64(),
            first_token: self.first_token.map(|d| d.as_secs_f64()),
        };
        let usage = usage.and_then(normalize_usage);

        info!(
            "Session {} finished in {:.3}s (tokens: {:?})",
            self.key,
            duration.total,
            usage.and_then(|u| u.total_tokens)
        );

        if sink.send(StreamEvent::finished(&self.key, usage, duration)).await.is_err() {
            return SessionOutcome::Detached;
        }
        SessionOutcome::Finished
    }

    async fn fail(&mut self, sink: &mpsc::Sender<StreamEvent>, err: StreamError) -> SessionOutcome {
        self.state = SessionState::Failed;
        warn!("Session {} failed: {}", self.key, err);

        if sink.send(StreamEvent::failed(&self.key, err.user_message())).await.is_err() {
            return SessionOutcome::Detached;
        }
        SessionOutcome::Failed
    }

    fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::models::SelectionSet;
    use crate::providers::build_http_client;
    use crate::services::router::resolve_targets;
    use httpmock::prelude::*;

    fn target(base_url: &str, api_key: &str) -> SessionTarget {
        let configs = AppConfig::from_json(&format!(
            r#"{{"providers": [{{"id": "a", "provider": "openai", "baseUrl": "{}", "apiKey": "{}",
                "models": [{{"id": "m", "name": "gpt-4o"}}]}}]}}"#,
            base_url, api_key
        ))
        .unwrap()
        .providers;
        resolve_targets(&configs, &SelectionSet::all(&configs)).remove(0)
    }

    fn session(target: SessionTarget, timeout: Option<Duration>) -> StreamSession {
        StreamSession::new(
            target,
            Arc::new(ChatPrompt::new("sys", "hi")),
            build_http_client(Duration::from_secs(5)).unwrap(),
            timeout,
        )
    }

    async fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_once() {
        let (tx, rx) = mpsc::channel(8);
        let outcome = session(target("https://api.openai.com/v1", ""), None)
            .run(&tx, &CancellationToken::new())
            .await;
        drop(tx);

        assert_eq!(outcome, SessionOutcome::Failed);
        let events = drain(rx).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].error.as_deref().unwrap().contains("API key"));
    }

    #[tokio::test]
    async fn test_finish_without_fragments_has_no_first_token() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body("data: [DONE]\n\n");
        });

        let (tx, rx) = mpsc::channel(8);
        let outcome = session(target(&server.base_url(), "k"), None)
            .run(&tx, &CancellationToken::new())
            .await;
        drop(tx);

        assert_eq!(outcome, SessionOutcome::Finished);
        let events = drain(rx).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].finished);
        assert!(events[0].usage.is_none());
        assert!(events[0].duration.unwrap().first_token.is_none());
    }

    #[tokio::test]
    async fn test_timeout_fails_session() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200)
                .delay(Duration::from_secs(3))
                .body("data: [DONE]\n\n");
        });

        let (tx, rx) = mpsc::channel(8);
        let outcome = session(target(&server.base_url(), "k"), Some(Duration::from_secs(1)))
            .run(&tx, &CancellationToken::new())
            .await;
        drop(tx);

        assert_eq!(outcome, SessionOutcome::Failed);
        let events = drain(rx).await;
        assert_eq!(events[0].error.as_deref(), Some("Session timed out after 1s"));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (tx, rx) = mpsc::channel(8);
        let outcome = session(target("http://127.0.0.1:1", "k"), None).run(&tx, &cancel).await;
        drop(tx);

        assert_eq!(outcome, SessionOutcome::Failed);
        assert_eq!(drain(rx).await[0].error.as_deref(), Some("Request cancelled"));
    }

    #[tokio::test]
    async fn test_closed_sink_detaches() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let outcome = session(target("", "k"), None).run(&tx, &CancellationToken::new()).await;
        assert_eq!(outcome, SessionOutcome::Detached);
    }

    #[test]
    fn test_new_session_is_pending() {
        let s = session(target("https://x", "k"), None);
        assert_eq!(s.state(), SessionState::Pending);
        assert!(!s.state().is_terminal());
        assert_eq!(s.key().to_string(), "a|m");
    }
}
