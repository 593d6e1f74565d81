//! Fan-out orchestrator
//!
//! Runs one supervised task per selected (config, model) pair and
//! multiplexes their events into a single bounded channel. Sessions share
//! nothing but the sink and a semaphore bounding how many stream at once.

use super::router::resolve_targets;
use super::session::{SessionOutcome, StreamSession};
use crate::config::{PlaygroundConfig, ProviderConfig};
use crate::models::{ChatPrompt, SelectionSet, SessionKey, StreamEvent};
use crate::providers::build_http_client;
use crate::utils::error::{StreamError, GENERIC_ERROR_MESSAGE};
use crate::utils::logging::create_prompt_log_summary;
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-dispatch tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    /// Sessions started
    pub sessions: usize,
    pub finished: usize,
    pub failed: usize,
    /// Sessions that stopped because the receiver went away
    pub detached: usize,
}

impl DispatchSummary {
    fn record(&mut self, outcome: SessionOutcome) {
        match outcome {
            SessionOutcome::Finished => self.finished += 1,
            SessionOutcome::Failed => self.failed += 1,
            SessionOutcome::Detached => self.detached += 1,
        }
    }
}

/// Fans one prompt out to every selected model
#[derive(Clone)]
pub struct Orchestrator {
    client: Client,
    permits: Arc<Semaphore>,
    session_timeout: Option<Duration>,
    channel_capacity: usize,
}

impl Orchestrator {
    pub fn new(config: &PlaygroundConfig) -> Result<Self, StreamError> {
        Ok(Self::with_client(config, build_http_client(CONNECT_TIMEOUT)?))
    }

    pub fn with_client(config: &PlaygroundConfig, client: Client) -> Self {
        let session_timeout =
            (config.session_timeout_secs > 0).then(|| Duration::from_secs(config.session_timeout_secs));

        Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_concurrent_sessions.max(1))),
            session_timeout,
            channel_capacity: config.channel_capacity.max(1),
        }
    }

    /// Run every selected session to completion
    ///
    /// Returns once each session is terminal. Events go to `sink` as they
    /// happen; a session's events keep their order, sessions interleave
    /// freely. If this future is dropped early the sessions are cancelled.
    pub async fn dispatch(
        &self,
        configs: &[ProviderConfig],
        selection: &SelectionSet,
        prompt: ChatPrompt,
        sink: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> DispatchSummary {
        let targets = resolve_targets(configs, selection);
        let mut summary = DispatchSummary {
            sessions: targets.len(),
            ..Default::default()
        };

        info!("Dispatching prompt to {} sessions", targets.len());
        debug!("Prompt: {}", create_prompt_log_summary(&prompt));

        let scope = cancel.child_token();
        let guard = scope.clone().drop_guard();
        let prompt = Arc::new(prompt);

        let tasks = targets.into_iter().map(|target| {
            let key = target.key.clone();
            let session = StreamSession::new(target, prompt.clone(), self.client.clone(), self.session_timeout);
            let permits = self.permits.clone();
            let task_sink = sink.clone();
            let task_cancel = scope.clone();

            let handle = tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => None,
                    permit = permits.acquire_owned() => permit.ok(),
                };

                match permit {
                    Some(_permit) => session.run(&task_sink, &task_cancel).await,
                    None => session.reject(&task_sink, StreamError::Cancelled).await,
                }
            });

            supervise(key, handle, sink.clone())
        });

        for outcome in join_all(tasks).await {
            summary.record(outcome);
        }
        guard.disarm();

        info!(
            "Dispatch complete: {} finished, {} failed, {} detached",
            summary.finished, summary.failed, summary.detached
        );
        summary
    }

    /// Start a dispatch in the background
    pub fn spawn_dispatch(&self, configs: Vec<ProviderConfig>, selection: SelectionSet, prompt: ChatPrompt) -> DispatchHandle {
        let (sink, events) = mpsc::channel(self.channel_capacity);
        let cancel = CancellationToken::new();
        let orchestrator = self.clone();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            orchestrator
                .dispatch(&configs, &selection, prompt, sink, token)
                .await
        });

        DispatchHandle {
            events,
            guard: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }
}

/// Await a session task, turning a panic into that session's Failed event
pub(crate) async fn supervise(
    key: SessionKey,
    handle: JoinHandle<SessionOutcome>,
    sink: mpsc::Sender<StreamEvent>,
) -> SessionOutcome {
    match handle.await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Session {} task aborted: {}", key, err);
            if sink.send(StreamEvent::failed(&key, GENERIC_ERROR_MESSAGE)).await.is_err() {
                return SessionOutcome::Detached;
            }
            SessionOutcome::Failed
        }
    }
}

/// A running dispatch
///
/// Dropping the handle cancels every session still running.
pub struct DispatchHandle {
    events: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    guard: DropGuard,
    task: JoinHandle<DispatchSummary>,
}

impl DispatchHandle {
    /// Next event, `None` once every session is done
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Abort every live session; each reports "Request cancelled"
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Split into the event receiver, the token and the dispatch task
    ///
    /// The caller takes over cancellation: dropping the parts no longer
    /// cancels anything.
    pub fn into_parts(self) -> (mpsc::Receiver<StreamEvent>, CancellationToken, JoinHandle<DispatchSummary>) {
        let Self {
            events,
            cancel,
            guard,
            task,
        } = self;
        guard.disarm();
        (events, cancel, task)
    }

    /// Drain every event, then wait for the summary
    pub async fn collect(self) -> Result<(Vec<StreamEvent>, DispatchSummary), JoinError> {
        let Self {
            mut events,
            guard,
            task,
            ..
        } = self;

        let mut collected = Vec::new();
        while let Some(event) = events.recv().await {
            collected.push(event);
        }
        let summary = task.await?;
        guard.disarm();
        Ok((collected, summary))
    }
}

/// Keeps at most one send alive
///
/// Starting a new send cancels the previous one without waiting for it to
/// wind down.
#[derive(Default)]
pub struct SendController {
    current: Option<CancellationToken>,
}

impl SendController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(
        &mut self,
        orchestrator: &Orchestrator,
        configs: Vec<ProviderConfig>,
        selection: SelectionSet,
        prompt: ChatPrompt,
    ) -> DispatchHandle {
        if self.cancel() {
            debug!("Cancelled previous send");
        }

        let handle = orchestrator.spawn_dispatch(configs, selection, prompt);
        self.current = Some(handle.cancel_token());
        handle
    }

    /// Cancel the live send, if any
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}
