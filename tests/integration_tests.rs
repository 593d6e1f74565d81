//! Integration tests
//!
//! Exercise the HTTP surface end to end through the axum router

use aiplayground::config::{AppConfig, Settings};
use aiplayground::handlers::create_router;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use httpmock::prelude::*;
use serde_json::Value;
use tower::ServiceExt;

fn app_config(base_url: &str) -> AppConfig {
    AppConfig::from_json(&format!(
        r#"{{
            "playground": {{"maxConcurrentSessions": 4, "sessionTimeoutSecs": 10}},
            "providers": [
                {{"id": "openai", "provider": "openai", "name": "OpenAI", "baseUrl": "{}", "apiKey": "sk-very-secret",
                  "models": [{{"id": "m1", "name": "gpt-4o-mini", "inputTokenPrice": 0.15, "outputTokenPrice": 0.6}}]}},
                {{"id": "empty", "provider": "groq", "name": "Groq", "baseUrl": "", "apiKey": "",
                  "models": [{{"id": "m1", "name": "llama3"}}]}}
            ]
        }}"#,
        base_url
    ))
    .unwrap()
}

fn app(base_url: &str) -> axum::Router {
    create_router(Settings::default(), app_config(base_url)).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Parse an SSE body into (event name, data) pairs
fn parse_sse(body: &str) -> Vec<(String, Value)> {
    let mut events = Vec::new();
    for block in body.split("\n\n") {
        let mut name = String::from("message");
        let mut data = None;
        for line in block.lines() {
            if let Some(value) = line.strip_prefix("event:") {
                name = value.trim().to_string();
            } else if let Some(value) = line.strip_prefix("data:") {
                data = serde_json::from_str(value.trim()).ok();
            }
        }
        if let Some(data) = data {
            events.push((name, data));
        }
    }
    events
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = app("https://api.openai.com/v1");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["details"]["providers"], 2);

    let response = app
        .oneshot(Request::builder().uri("/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_provider_listing_hides_keys() {
    let response = app("https://api.openai.com/v1")
        .oneshot(Request::builder().uri("/v1/providers").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_string(response).await;
    assert!(!body.contains("sk-very-secret"));

    let providers: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(providers[0]["hasApiKey"], true);
    assert_eq!(providers[1]["hasApiKey"], false);
    assert_eq!(providers[0]["models"][0]["inputTokenPrice"], 0.15);
}

#[tokio::test]
async fn test_dispatch_rejects_blank_prompt() {
    let response = app("https://api.openai.com/v1")
        .oneshot(json_request("POST", "/v1/dispatch", serde_json::json!({"userPrompt": "   "})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["type"], "error");
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_dispatch_streams_every_session() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-very-secret")
            .body_contains("\"role\":\"system\"")
            .body_contains("Be terse.");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(concat!(
                "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"}}]}\n\n",
                "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":8,\"completion_tokens\":1,\"total_tokens\":9}}\n\n",
                "data: [DONE]\n\n"
            ));
    });

    let response = app(&server.url("/v1"))
        .oneshot(json_request(
            "POST",
            "/v1/dispatch",
            serde_json::json!({"systemPrompt": "Be terse.", "userPrompt": "Hello"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = parse_sse(&body_string(response).await);
    mock.assert();

    let names: Vec<&str> = events.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names.iter().filter(|n| **n == "fragment").count(), 1);
    assert_eq!(names.iter().filter(|n| **n == "finished").count(), 1);
    assert_eq!(names.iter().filter(|n| **n == "error").count(), 1);
    assert_eq!(names.last(), Some(&"done"));

    let finished = &events.iter().find(|(n, _)| n == "finished").unwrap().1;
    assert_eq!(finished["configId"], "openai");
    assert_eq!(finished["usage"]["totalTokens"], 9);

    let failed = &events.iter().find(|(n, _)| n == "error").unwrap().1;
    assert_eq!(failed["configId"], "empty");
    assert!(failed.get("usage").is_none());

    let done = &events.last().unwrap().1;
    assert_eq!(done["sessions"], 2);
    assert_eq!(done["finished"], 1);
    assert_eq!(done["failed"], 1);
}

#[tokio::test]
async fn test_dispatch_reports_cost() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(concat!(
                "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"}}]}\n\n",
                "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":1000,\"completion_tokens\":500,\"total_tokens\":1500}}\n\n",
                "data: [DONE]\n\n"
            ));
    });

    let response = app(&server.url("/v1"))
        .oneshot(json_request(
            "POST",
            "/v1/dispatch",
            serde_json::json!({"userPrompt": "Hello", "selection": {"openai": {"m1": true}}, "multiplier": 1000}),
        ))
        .await
        .unwrap();

    let events = parse_sse(&body_string(response).await);
    let fragment = &events.iter().find(|(n, _)| n == "fragment").unwrap().1;
    assert!(fragment.get("cost").is_none());

    let finished = &events.iter().find(|(n, _)| n == "finished").unwrap().1;
    assert_eq!(finished["cost"], "0.000450");
    assert_eq!(finished["scaledCost"], "0.450000");
}

#[tokio::test]
async fn test_dispatch_without_multiplier_has_no_scaled_cost() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).body(concat!(
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":1000,\"completion_tokens\":500,\"total_tokens\":1500}}\n\n",
            "data: [DONE]\n\n"
        ));
    });

    let response = app(&server.url("/v1"))
        .oneshot(json_request(
            "POST",
            "/v1/dispatch",
            serde_json::json!({"userPrompt": "Hello", "selection": {"openai": {"m1": true}}}),
        ))
        .await
        .unwrap();

    let events = parse_sse(&body_string(response).await);
    let finished = &events.iter().find(|(n, _)| n == "finished").unwrap().1;
    assert_eq!(finished["cost"], "0.000450");
    assert!(finished.get("scaledCost").is_none());
}

#[tokio::test]
async fn test_dispatch_with_explicit_selection() {
    let response = app("https://api.openai.com/v1")
        .oneshot(json_request(
            "POST",
            "/v1/dispatch",
            serde_json::json!({"userPrompt": "Hello", "selection": {"empty": {"m1": true}, "openai": {"m1": false}}}),
        ))
        .await
        .unwrap();

    let events = parse_sse(&body_string(response).await);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].0, "error");
    assert_eq!(events[1].1["sessions"], 1);
}

#[tokio::test]
async fn test_connectivity_endpoint() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(200).json_body(serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello!"}}]
        }));
    });
    let app = app(&server.url("/v1"));

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/providers/openai/test",
            serde_json::json!({"modelName": "gpt-4o-mini"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["success"], true);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/providers/empty/test",
            serde_json::json!({"modelName": "llama3"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"]["message"], "Missing required configuration");

    let response = app
        .oneshot(json_request(
            "POST",
            "/v1/providers/nope/test",
            serde_json::json!({"modelName": "x"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_body_limit() {
    let mut settings = Settings::default();
    settings.request.max_request_size = 64;
    let app = create_router(settings, app_config("https://api.openai.com/v1")).unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/v1/dispatch",
            serde_json::json!({"userPrompt": "x".repeat(1024)}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
