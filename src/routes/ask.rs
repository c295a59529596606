use std::convert::Infallible;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use futures::stream::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::AppState;
use crate::daemon::ChatMessage;
use crate::error::AppError;
use crate::relay;

/// Inbound `/ask` payload: the target model and the conversation so far.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Relay a conversation to the daemon and stream the reply back as plain
/// text, one body frame per fragment.
///
/// The body is decoded as JSON whatever its `Content-Type`, since browsers
/// posting a bare string send `text/plain`. A non-2xx answer from the daemon
/// becomes a 502 carrying its body instead of an empty 200 stream.
pub async fn ask(State(state): State<AppState>, payload: Bytes) -> Result<Response, AppError> {
    let req: ConversationRequest = serde_json::from_slice(&payload).map_err(|e| {
        debug!("bad /ask payload: {}", e);
        AppError::bad_request("Malformed request")
    })?;

    if req.model.is_empty() {
        return Err(AppError::bad_request("Model is required"));
    }

    let upstream = state.ollama.chat_stream(&req.model, &req.messages).await?;

    let status = upstream.status();
    if !status.is_success() {
        let body = upstream.text().await.unwrap_or_default();
        return Err(AppError::Upstream { status, body });
    }

    debug!(
        "relaying chat for model {} ({} messages)",
        req.model,
        req.messages.len()
    );

    let fragments = relay::fragments(upstream.bytes_stream()).map(Ok::<_, Infallible>);

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(fragments),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::{
        Json, Router,
        body::{Body, Bytes},
        extract::State,
        http::{Request, StatusCode},
        routing::post,
    };
    use tower::ServiceExt;

    use crate::test_support::{body_text, dead_daemon, spawn_daemon, test_app};

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<AtomicUsize>,
        last_body: Arc<Mutex<Option<serde_json::Value>>>,
    }

    fn chat_stub(recorder: Recorder, chunks: &'static [&'static str]) -> Router {
        Router::new()
            .route(
                "/api/chat",
                post(
                    move |State(rec): State<Recorder>, Json(body): Json<serde_json::Value>| {
                        async move {
                            rec.calls.fetch_add(1, Ordering::SeqCst);
                            *rec.last_body.lock().unwrap() = Some(body);
                            let parts = chunks.iter().copied().map(|c: &'static str| {
                                Ok::<_, std::convert::Infallible>(Bytes::from_static(c.as_bytes()))
                            });
                            Body::from_stream(futures::stream::iter(parts))
                        }
                    },
                ),
            )
            .with_state(recorder)
    }

    fn ask_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    const HELLO: &[&str] = &[
        "{\"message\":{\"role\":\"assistant\",\"content\":\"He\"}}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"llo\"}}\n",
    ];

    #[tokio::test]
    async fn test_streams_fragments_as_plain_text() {
        let recorder = Recorder::default();
        let client = spawn_daemon(chat_stub(recorder.clone(), HELLO)).await;
        let (app, _staging) = test_app(client);

        let res = app
            .oneshot(ask_request(
                r#"{"model":"llama3","messages":[{"role":"user","content":"hi"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "text/event-stream");
        assert_eq!(res.headers()["cache-control"], "no-cache");
        assert_eq!(body_text(res).await, "Hello");

        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
        let sent = recorder.last_body.lock().unwrap().clone().unwrap();
        assert_eq!(
            sent,
            serde_json::json!({
                "model": "llama3",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true
            })
        );
    }

    #[tokio::test]
    async fn test_json_body_accepted_without_json_content_type() {
        let recorder = Recorder::default();
        let client = spawn_daemon(chat_stub(recorder.clone(), HELLO)).await;
        let (app, _staging) = test_app(client);

        let req = Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", "text/plain;charset=UTF-8")
            .body(Body::from(
                r#"{"model":"m","messages":[{"role":"user","content":"hi"}]}"#,
            ))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "Hello");
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_partial_output_then_garbage_closes_cleanly() {
        const CHUNKS: &[&str] = &[
            "{\"message\":{\"content\":\"a\"}}\n",
            "{\"message\":{\"content\":\"b\"}}\n",
            "{\"message\":{\"content\":\"c\"}}\n",
            "{\"message\":{\"cont",
        ];
        let client = spawn_daemon(chat_stub(Recorder::default(), CHUNKS)).await;
        let (app, _staging) = test_app(client);

        let res = app
            .oneshot(ask_request(r#"{"model":"m","messages":[]}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_text(res).await, "abc");
    }

    #[tokio::test]
    async fn test_empty_model_never_reaches_daemon() {
        let recorder = Recorder::default();
        let client = spawn_daemon(chat_stub(recorder.clone(), HELLO)).await;
        let (app, _staging) = test_app(client);

        for body in [
            r#"{"model":"","messages":[{"role":"user","content":"hi"}]}"#,
            r#"{"messages":[]}"#,
        ] {
            let res = app.clone().oneshot(ask_request(body)).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_text(res).await, "Model is required");
        }
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_json_is_client_error() {
        let recorder = Recorder::default();
        let client = spawn_daemon(chat_stub(recorder.clone(), HELLO)).await;
        let (app, _staging) = test_app(client);

        let res = app.oneshot(ask_request("{not json")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(res).await, "Malformed request");
        assert_eq!(recorder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wrong_method_is_rejected() {
        let (app, _staging) = test_app(dead_daemon().await);
        let res = app
            .oneshot(Request::builder().uri("/ask").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unreachable_daemon_is_bad_gateway() {
        let (app, _staging) = test_app(dead_daemon().await);
        let res = app
            .oneshot(ask_request(r#"{"model":"m","messages":[]}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert!(body_text(res).await.starts_with("Ollama unreachable:"));
    }

    #[tokio::test]
    async fn test_daemon_error_status_is_surfaced() {
        let stub = Router::new().route(
            "/api/chat",
            post(|| async {
                (
                    StatusCode::NOT_FOUND,
                    r#"{"error":"model 'nope' not found"}"#,
                )
            }),
        );
        let (app, _staging) = test_app(spawn_daemon(stub).await);
        let res = app
            .oneshot(ask_request(r#"{"model":"nope","messages":[]}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert!(body_text(res).await.contains("model 'nope' not found"));
    }
}
