//! End-to-end streaming tests against an in-process mock of the upstream
//! model API.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde_json::json;

use atelier::api::AppState;
use atelier::config::AppConfig;
use atelier::generate::{GenerationClient, GenerationEvent, GenerationRequest};
use atelier::server::build_router;

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn sse_body(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        let event = json!({ "type": "response.output_text.delta", "delta": chunk });
        body.push_str(&format!("data: {event}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// Mock upstream that streams a well-formed component in three deltas.
fn happy_upstream() -> Router {
    Router::new().route(
        "/responses",
        post(|| async {
            let body = sse_body(&[
                "function App() {\n",
                "  return (\n    <div className=\"vads-l-grid-container\"><h1>Claims</h1></div>\n  );\n",
                "}",
            ]);
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }),
    )
}

/// Mock upstream whose body breaks mid-stream after delivering one delta.
fn interrupted_upstream() -> Router {
    Router::new().route(
        "/responses",
        post(|| async {
            let delta = json!({ "type": "response.output_text.delta", "delta": "<p>half a page</p>" });
            let chunks: Vec<Result<String, std::io::Error>> = vec![
                Ok(format!("data: {delta}\n\n")),
                Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                )),
            ];
            let body = axum::body::Body::from_stream(futures_util::stream::iter(chunks));
            ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
        }),
    )
}

/// Mock upstream that never answers within the test timeout.
fn stalled_upstream() -> Router {
    Router::new().route(
        "/responses",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            ([(header::CONTENT_TYPE, "text/event-stream")], String::new()).into_response()
        }),
    )
}

async fn spawn_app(upstream: Router, timeout: Duration) -> String {
    let api_base = spawn(upstream).await;
    let config = AppConfig {
        api_key: Some("sk-test".into()),
        api_base,
        generation_timeout: timeout,
        ..AppConfig::default()
    };
    spawn(build_router(Arc::new(AppState::new(config)))).await
}

#[tokio::test]
async fn stateless_generation_streams_to_exactly_one_terminal_event() {
    let app_url = spawn_app(happy_upstream(), Duration::from_secs(10)).await;

    let client = GenerationClient::new(&app_url);
    let events = client
        .run_to_completion(GenerationRequest::initial("a claims status page"))
        .await
        .unwrap();

    assert_eq!(events.first(), Some(&GenerationEvent::Started));
    let terminals: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminals.len(), 1);

    match events.last().unwrap() {
        GenerationEvent::Completed { code, explanation } => {
            assert!(code.contains("function App"));
            assert!(code.contains("export default App"));
            assert!(code.contains("<h1>Claims</h1>"));
            assert!(explanation.contains("created successfully"));
        }
        other => panic!("expected completed terminal, got {other:?}"),
    }
}

#[tokio::test]
async fn interrupted_stream_salvages_accumulated_content() {
    let app_url = spawn_app(interrupted_upstream(), Duration::from_secs(10)).await;

    let client = GenerationClient::new(&app_url);
    let events = client
        .run_to_completion(GenerationRequest::initial("a claims status page"))
        .await
        .unwrap();

    let terminals: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminals.len(), 1);

    match events.last().unwrap() {
        GenerationEvent::Completed { code, explanation } => {
            assert!(code.starts_with("function App()"));
            assert!(code.contains(r#"va-alert status="warning""#));
            assert!(code.contains("Partial Result"));
            assert!(code.contains("<p>half a page</p>"));
            assert!(explanation.contains("interrupted"));
        }
        other => panic!("expected salvaged completion, got {other:?}"),
    }
}

#[tokio::test]
async fn session_turn_updates_transcript_partition_and_preview() {
    let app_url = spawn_app(happy_upstream(), Duration::from_secs(10)).await;
    let http = reqwest::Client::new();

    let created: serde_json::Value = http
        .post(format!("{app_url}/api/sessions"))
        .json(&json!({"components": ["Alert"]}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    // Drive the turn; the response body ends after the terminal frame.
    let stream_text = http
        .post(format!("{app_url}/api/generate"))
        .json(&json!({"sessionId": id, "prompt": "a claims status page"}))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(stream_text.contains("response.start"));
    assert!(stream_text.contains("response.completed"));

    let transcript: serde_json::Value = http
        .get(format!("{app_url}/api/sessions/{id}/messages"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(transcript["turnState"], "succeeded");
    let messages = transcript["messages"].as_array().unwrap();
    let successes: Vec<_> = messages
        .iter()
        .filter(|m| m["status"] == "success")
        .collect();
    assert_eq!(successes.len(), 1);
    assert!(messages
        .iter()
        .all(|m| m["status"] != "loading" && m["status"] != "streaming"));

    let partition: serde_json::Value = http
        .get(format!("{app_url}/api/sessions/{id}/code"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(partition["js"].as_str().unwrap().contains("function App"));
    assert!(partition["html"].as_str().unwrap().contains("<h1>Claims</h1>"));

    let preview = http
        .get(format!("{app_url}/api/sessions/{id}/preview"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(preview.contains("<h1>Claims</h1>"));
    assert!(preview.contains("function App"));
}

#[tokio::test]
async fn follow_up_turn_reaches_the_model_with_prior_context() {
    let app_url = spawn_app(happy_upstream(), Duration::from_secs(10)).await;
    let http = reqwest::Client::new();

    let created: serde_json::Value = http
        .post(format!("{app_url}/api/sessions"))
        .json(&json!({"components": []}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    for prompt in ["a claims status page", "add a warning banner"] {
        let text = http
            .post(format!("{app_url}/api/generate"))
            .json(&json!({"sessionId": id, "prompt": prompt}))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(text.contains("response.completed"));
    }

    // The second turn is a follow-up: its progress label differs and the
    // success message comes from the follow-up rotation.
    let transcript: serde_json::Value = http
        .get(format!("{app_url}/api/sessions/{id}/messages"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = transcript["messages"].as_array().unwrap();
    let successes: Vec<_> = messages
        .iter()
        .filter(|m| m["status"] == "success")
        .collect();
    assert_eq!(successes.len(), 2);
    assert_eq!(transcript["turnState"], "succeeded");
}

#[tokio::test]
async fn stalled_upstream_times_out_into_a_failed_turn() {
    let app_url = spawn_app(stalled_upstream(), Duration::from_millis(200)).await;
    let http = reqwest::Client::new();

    let created: serde_json::Value = http
        .post(format!("{app_url}/api/sessions"))
        .json(&json!({"components": []}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let stream_text = http
        .post(format!("{app_url}/api/generate"))
        .json(&json!({"sessionId": id, "prompt": "a form"}))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(stream_text.contains("response.error"));
    assert!(stream_text.contains("Request timed out"));

    let transcript: serde_json::Value = http
        .get(format!("{app_url}/api/sessions/{id}/messages"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(transcript["turnState"], "failed");
    let messages = transcript["messages"].as_array().unwrap();
    let errors: Vec<_> = messages.iter().filter(|m| m["status"] == "error").collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]["content"]
        .as_str()
        .unwrap()
        .contains("Request timed out"));
    assert!(messages
        .iter()
        .all(|m| m["status"] != "loading" && m["status"] != "streaming"));

    // Failure is a resting state: the next submission is accepted.
    let resp = http
        .post(format!("{app_url}/api/generate"))
        .json(&json!({"sessionId": id, "prompt": "try again"}))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
}

#[tokio::test]
async fn upstream_http_error_becomes_a_failed_event() {
    let upstream = Router::new().route(
        "/responses",
        post(|| async {
            (
                axum::http::StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded",
            )
                .into_response()
        }),
    );
    let app_url = spawn_app(upstream, Duration::from_secs(5)).await;

    let client = GenerationClient::new(&app_url);
    let events = client
        .run_to_completion(GenerationRequest::initial("a form"))
        .await
        .unwrap();

    match events.last().unwrap() {
        GenerationEvent::Failed { message } => {
            assert!(message.contains("429"), "message: {message}");
        }
        other => panic!("expected failed terminal, got {other:?}"),
    }
}
