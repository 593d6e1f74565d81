//! Dispatch handler
//!
//! Streams every session's events to the client as Server-Sent Events,
//! pricing each `finished` event. Closing the connection cancels the
//! dispatch.

use crate::handlers::AppState;
use crate::models::{ChatPrompt, SelectionSet, StreamEvent};
use crate::services::{DispatchSummary, ResponseBoard};
use crate::utils::error::{AppError, AppResult};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive},
    response::{IntoResponse, Response, Sse},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

/// Body of `POST /v1/dispatch`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    /// Falls back to the configured default when absent or blank
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    /// Every configured model when absent
    #[serde(default)]
    pub selection: Option<SelectionSet>,
    /// Report cost for this many calls as well, clamped to 1..=999999
    #[serde(default)]
    pub multiplier: Option<u32>,
}

/// SSE payload: the stream event plus its cost once finished
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedEvent<'a> {
    #[serde(flatten)]
    pub event: &'a StreamEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaled_cost: Option<&'a str>,
}

/// SSE event name for a stream event
pub fn event_name(event: &StreamEvent) -> &'static str {
    if event.is_error() {
        "error"
    } else if event.finished {
        "finished"
    } else {
        "fragment"
    }
}

/// Handle dispatch requests
///
/// POST /v1/dispatch
pub async fn handle_dispatch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DispatchRequest>,
) -> AppResult<Response> {
    if request.user_prompt.trim().is_empty() {
        return Err(AppError::Validation("userPrompt cannot be empty".to_string()));
    }

    let system = request
        .system_prompt
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| state.config.playground.default_system_prompt.clone());
    let prompt = ChatPrompt::new(system, request.user_prompt);

    let configs = state.config.providers.clone();
    let selection = request.selection.unwrap_or_else(|| SelectionSet::all(&configs));
    let mut board = ResponseBoard::new(&configs, request.multiplier.unwrap_or(1));

    let handle = state.orchestrator.spawn_dispatch(configs, selection, prompt);
    let (mut events, cancel, task) = handle.into_parts();
    let (tx, rx) = mpsc::channel::<Result<Event, axum::Error>>(state.config.playground.channel_capacity);

    tokio::spawn(async move {
        // Cancels every session if this task ends early
        let guard = cancel.drop_guard();

        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    debug!("Client disconnected, cancelling dispatch");
                    return;
                }
                next = events.recv() => next,
            };

            let Some(event) = next else {
                break;
            };

            board.apply(&event);
            let entry = board
                .entry(&event.config_id, &event.model_id)
                .filter(|_| event.finished);
            let priced = PricedEvent {
                event: &event,
                cost: entry.and_then(|e| e.cost.as_deref()),
                scaled_cost: entry.and_then(|e| e.scaled_cost.as_deref()),
            };

            let sse = Event::default().event(event_name(&event)).json_data(&priced);
            if tx.send(sse).await.is_err() {
                debug!("Client disconnected, cancelling dispatch");
                return;
            }
        }

        guard.disarm();

        let summary = match task.await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Dispatch task failed: {}", e);
                DispatchSummary::default()
            }
        };
        info!("Dispatch stream closed after {} sessions", summary.sessions);

        let done = Event::default().event("done").json_data(&summary);
        let _ = tx.send(done).await;
    });

    let sse = Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    );

    debug!("Starting streaming response transmission");
    Ok(sse.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionDuration, SessionKey};

    #[test]
    fn test_event_names() {
        let key = SessionKey::new("a", "m");
        assert_eq!(event_name(&StreamEvent::fragment(&key, "x")), "fragment");
        assert_eq!(event_name(&StreamEvent::failed(&key, "boom")), "error");
        assert_eq!(
            event_name(&StreamEvent::finished(
                &key,
                None,
                SessionDuration {
                    total: 1.0,
                    first_token: None
                }
            )),
            "finished"
        );
    }

    #[test]
    fn test_request_defaults() {
        let request: DispatchRequest = serde_json::from_str(r#"{"userPrompt": "hi"}"#).unwrap();
        assert!(request.system_prompt.is_none());
        assert!(request.selection.is_none());
        assert!(request.multiplier.is_none());
    }

    #[test]
    fn test_priced_event_flattens() {
        let event = StreamEvent::finished(
            &SessionKey::new("a", "m"),
            None,
            SessionDuration {
                total: 0.5,
                first_token: Some(0.1),
            },
        );
        let priced = PricedEvent {
            event: &event,
            cost: Some("0.000014"),
            scaled_cost: None,
        };

        let json = serde_json::to_value(&priced).unwrap();
        assert_eq!(json["configId"], "a");
        assert_eq!(json["finished"], true);
        assert_eq!(json["cost"], "0.000014");
        assert!(json.get("scaledCost").is_none());
    }
}
