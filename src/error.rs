use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors that end a single request. None of them touch the daemon process.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Failed to parse form: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Ollama unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("Ollama error ({status}): {body}")]
    Upstream { status: StatusCode, body: String },

    #[error("Ollama create error: {0}")]
    CreateFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Multipart(e) => e.status(),
            AppError::Unreachable(_) | AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::CreateFailed(_) | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("{}", self);
        } else {
            tracing::debug!("rejected request: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}
