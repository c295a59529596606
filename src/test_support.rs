use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use tempfile::TempDir;

use crate::daemon::{ModelCreator, OllamaCli, OllamaClient};
use crate::{AppState, router};

/// Serve `app` on an ephemeral port and return a client pointed at it.
pub(crate) async fn spawn_daemon(app: Router) -> OllamaClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    OllamaClient::new(format!("http://{}", addr))
}

/// A client whose port has nothing listening.
pub(crate) async fn dead_daemon() -> OllamaClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    OllamaClient::new(format!("http://{}", addr))
}

pub(crate) fn test_app(ollama: OllamaClient) -> (Router, TempDir) {
    test_app_with(ollama, Arc::new(OllamaCli::new("/nonexistent/ollama")))
}

pub(crate) fn test_app_with(
    ollama: OllamaClient,
    creator: Arc<dyn ModelCreator>,
) -> (Router, TempDir) {
    let staging = tempfile::tempdir().unwrap();
    let state = AppState::new(ollama, creator, staging.path().to_path_buf());
    let app = router(state, &staging.path().join("static"));
    (app, staging)
}

pub(crate) async fn body_text(res: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub(crate) enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

pub(crate) fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    const BOUNDARY: &str = "relay-test-boundary";

    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}
