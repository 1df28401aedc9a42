//! Generation endpoint integration tests
//!
//! Tests for `POST /api/generate`:
//! - Pass-through and extraction relaying
//! - Outbound request shape and provider resolution
//! - Validation, unknown models and upstream failures

use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{
    constants, directory, extract_server, generate_body, passthrough_server, provider, server_with,
};
use crate::mocks::{sse_body, MockUpstream};

// =========================================================================
// Relaying
// =========================================================================

#[tokio::test]
async fn test_passthrough_relays_upstream_bytes_verbatim() {
    let upstream = MockUpstream::start().await;
    let body = sse_body(&["Hello", " world"]);
    upstream.mock_stream(body.clone()).await;

    let server = passthrough_server(directory(vec![provider(
        &upstream.chat_url(),
        Some(constants::TEST_API_KEY),
        &[("fast", "alpha-fast-001")],
    )]));

    let response = server.post("/api/generate").json(&generate_body("fast")).await;

    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "text/event-stream");
    assert_eq!(response.header("cache-control"), "no-cache");
    assert_eq!(response.header("x-accel-buffering"), "no");
    assert_eq!(response.text(), body);
}

#[tokio::test]
async fn test_extract_relays_only_delta_text() {
    let upstream = MockUpstream::start().await;
    upstream.mock_stream(sse_body(&["Hello", ",", " world"])).await;

    let server = extract_server(directory(vec![provider(
        &upstream.chat_url(),
        Some(constants::TEST_API_KEY),
        &[("fast", "alpha-fast-001")],
    )]));

    let response = server.post("/api/generate").json(&generate_body("fast")).await;

    response.assert_status_ok();
    assert_eq!(response.header("content-type"), "text/plain; charset=utf-8");
    assert_eq!(response.header("cache-control"), "no-cache");
    assert_eq!(response.header("x-accel-buffering"), "no");
    assert_eq!(response.text(), "Hello, world");
}

#[tokio::test]
async fn test_extract_skips_malformed_lines_without_aborting() {
    let upstream = MockUpstream::start().await;
    let body = concat!(
        ": keep-alive\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"one\"}}]}\n\n",
        "data: {broken json\n\n",
        "event: ping\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" two\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    upstream.mock_stream(body.to_string()).await;

    let server = extract_server(directory(vec![provider(
        &upstream.chat_url(),
        None,
        &[("local", "llama3")],
    )]));

    let response = server.post("/api/generate").json(&generate_body("local")).await;

    response.assert_status_ok();
    assert_eq!(response.text(), "one two");
}

// =========================================================================
// Outbound request
// =========================================================================

#[tokio::test]
async fn test_outbound_request_shape() {
    let upstream = MockUpstream::start().await;
    upstream
        .mock_stream_with_key(constants::TEST_API_KEY, sse_body(&["ok"]))
        .await;

    let server = passthrough_server(directory(vec![provider(
        &upstream.chat_url(),
        Some(constants::TEST_API_KEY),
        &[("fast", "alpha-fast-001")],
    )]));

    let request = json!({
        "modelName": "fast",
        "messages": [
            { "role": "user", "content": "Hi", "name": "alice", "extra": { "nested": [1, 2] } }
        ]
    });
    server.post("/api/generate").json(&request).await.assert_status_ok();

    let bodies = upstream.received_bodies().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0],
        json!({
            "model": "alpha-fast-001",
            "messages": [
                { "role": "user", "content": "Hi", "name": "alice", "extra": { "nested": [1, 2] } }
            ],
            "stream": true
        })
    );
}

#[tokio::test]
async fn test_provider_without_api_key_is_still_called() {
    let upstream = MockUpstream::start().await;
    upstream.mock_stream(sse_body(&["local answer"])).await;

    let server = extract_server(directory(vec![provider(
        &upstream.chat_url(),
        None,
        &[("local", "llama3")],
    )]));

    let response = server.post("/api/generate").json(&generate_body("local")).await;

    response.assert_status_ok();
    assert_eq!(response.text(), "local answer");
    assert_eq!(upstream.received_bodies().await[0]["model"], "llama3");
}

#[tokio::test]
async fn test_first_loaded_provider_wins_for_duplicate_names() {
    let first = MockUpstream::start().await;
    first.mock_stream(sse_body(&["from first"])).await;
    let second = MockUpstream::start().await;
    second.expect_no_requests().await;

    let server = extract_server(directory(vec![
        provider(&first.chat_url(), Some("first-key"), &[("shared", "first-model")]),
        provider(&second.chat_url(), Some("second-key"), &[("shared", "second-model")]),
    ]));

    for _ in 0..3 {
        let response = server.post("/api/generate").json(&generate_body("shared")).await;
        response.assert_status_ok();
        assert_eq!(response.text(), "from first");
    }

    let bodies = first.received_bodies().await;
    assert_eq!(bodies.len(), 3);
    assert!(bodies.iter().all(|b| b["model"] == "first-model"));
}

// =========================================================================
// Validation and lookup
// =========================================================================

#[tokio::test]
async fn test_missing_model_name_never_reaches_upstream() {
    let upstream = MockUpstream::start().await;
    upstream.expect_no_requests().await;

    let server = passthrough_server(directory(vec![provider(
        &upstream.chat_url(),
        None,
        &[("fast", "alpha-fast-001")],
    )]));

    for body in [
        json!({ "messages": [{ "role": "user", "content": "Hi" }] }),
        json!({ "modelName": "", "messages": [{ "role": "user", "content": "Hi" }] }),
        json!({ "modelName": null, "messages": [] }),
    ] {
        let response = server.post("/api/generate").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: Value = response.json();
        assert_eq!(error["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(error["error"]["details"]["field"], "modelName");
    }

    assert!(upstream.received_bodies().await.is_empty());
}

#[tokio::test]
async fn test_missing_messages_is_bad_request() {
    let upstream = MockUpstream::start().await;
    upstream.expect_no_requests().await;

    let server = passthrough_server(directory(vec![provider(
        &upstream.chat_url(),
        None,
        &[("fast", "alpha-fast-001")],
    )]));

    let response = server
        .post("/api/generate")
        .json(&json!({ "modelName": "fast" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let error: Value = response.json();
    assert_eq!(error["error"]["details"]["field"], "messages");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let server = passthrough_server(directory(vec![]));

    let response = server.post("/api/generate").text("{ nope").await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let upstream = MockUpstream::start().await;
    upstream.expect_no_requests().await;

    let server = passthrough_server(directory(vec![provider(
        &upstream.chat_url(),
        None,
        &[("fast", "alpha-fast-001")],
    )]));

    let response = server.post("/api/generate").json(&generate_body("gpt-9")).await;

    response.assert_status(StatusCode::NOT_FOUND);
    let error: Value = response.json();
    assert_eq!(
        error["error"]["message"],
        "Model 'gpt-9' not found in provider.json"
    );
}

// =========================================================================
// Upstream failures
// =========================================================================

#[tokio::test]
async fn test_upstream_json_rejection_is_bad_gateway() {
    let upstream = MockUpstream::start().await;
    upstream.mock_json_error(503, json!({ "error": "overloaded" })).await;

    let server = passthrough_server(directory(vec![provider(
        &upstream.chat_url(),
        Some(constants::TEST_API_KEY),
        &[("fast", "alpha-fast-001")],
    )]));

    let response = server.post("/api/generate").json(&generate_body("fast")).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let error: Value = response.json();
    assert_eq!(error["error"]["code"], "UPSTREAM_REJECTED");
    assert_eq!(error["error"]["details"]["upstream_status"], 503);
    assert_eq!(error["error"]["details"]["upstream_url"], upstream.chat_url());
    assert_eq!(
        error["error"]["details"]["upstream_error"],
        json!({ "error": "overloaded" })
    );
}

#[tokio::test]
async fn test_upstream_text_rejection_is_bad_gateway() {
    let upstream = MockUpstream::start().await;
    upstream.mock_text_error(401, "invalid api key").await;

    let server = extract_server(directory(vec![provider(
        &upstream.chat_url(),
        Some("wrong-key"),
        &[("fast", "alpha-fast-001")],
    )]));

    let response = server.post("/api/generate").json(&generate_body("fast")).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let error: Value = response.json();
    assert_eq!(error["error"]["details"]["upstream_status"], 401);
    assert_eq!(error["error"]["details"]["upstream_error"], "invalid api key");
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let server = passthrough_server(directory(vec![provider(
        constants::UNREACHABLE_URL,
        None,
        &[("fast", "alpha-fast-001")],
    )]));

    let response = server.post("/api/generate").json(&generate_body("fast")).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(response.header("content-type"), "application/json");
    let error: Value = response.json();
    assert_eq!(error["error"]["code"], "UPSTREAM_UNREACHABLE");
    assert_eq!(
        error["error"]["details"]["upstream_url"],
        constants::UNREACHABLE_URL
    );
    assert!(error["error"]["message"]
        .as_str()
        .unwrap()
        .contains(constants::UNREACHABLE_URL));
}

#[tokio::test]
async fn test_upstream_timeout_is_bad_gateway() {
    let upstream = MockUpstream::start().await;
    upstream
        .mock_slow_stream(Duration::from_secs(5), sse_body(&["late"]))
        .await;

    let server = server_with(
        &[
            ("RELAY_MODE", "extract"),
            ("RELAY_UPSTREAM_TIMEOUT_SECS", "1"),
        ],
        directory(vec![provider(
            &upstream.chat_url(),
            None,
            &[("slow", "slow-model")],
        )]),
    );

    let response = server.post("/api/generate").json(&generate_body("slow")).await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let error: Value = response.json();
    assert_eq!(error["error"]["code"], "UPSTREAM_UNREACHABLE");
}
