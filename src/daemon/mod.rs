//! Client side of the Ollama daemon: its HTTP API, the `create` command and
//! the supervised `serve` process.

pub mod cli;
pub mod supervisor;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use cli::{CreateOutcome, ModelCreator, OllamaCli};
pub use supervisor::{DaemonProcess, SupervisorError, shutdown_signal};

const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
}

/// One object of the `/api/chat` response stream.
#[derive(Debug, Default, Deserialize)]
pub struct ChatFrame {
    #[serde(default)]
    pub message: Option<FrameMessage>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FrameMessage {
    #[serde(default)]
    pub content: String,
}

impl ChatFrame {
    pub fn into_content(self) -> String {
        self.message.map(|m| m.content).unwrap_or_default()
    }
}

/// Thin wrapper over the daemon's HTTP API. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/tags`, the model list. Also serves as the liveness call.
    pub async fn tags(&self) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
    }

    /// Liveness check used at startup.
    pub async fn ping(&self) -> Result<(), reqwest::Error> {
        self.http
            .get(format!("{}/api/tags", self.base_url))
            .timeout(PING_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Issue a chat call with streaming forced on. No deadline is applied:
    /// generation can run for as long as the daemon keeps the stream open.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<reqwest::Response, reqwest::Error> {
        let body = ChatRequest {
            model,
            messages,
            stream: true,
        };
        self.http
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
    }
}
