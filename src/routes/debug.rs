use std::fmt::Write;

use axum::{extract::State, http::header, response::IntoResponse};
use chrono::Utc;

use crate::AppState;

/// Human-readable daemon status. Always answers 200; failures are spelled out
/// in the body.
pub async fn debug_report(State(state): State<AppState>) -> impl IntoResponse {
    let mut report = String::new();

    match state.ollama.tags().await {
        Err(e) => {
            let _ = writeln!(report, "❌ Ollama connection failed: {}", e);
        }
        Ok(resp) => {
            let status = resp.status().as_u16();
            let models = resp.text().await.unwrap_or_default();
            let _ = writeln!(report, "✅ Ollama running (status: {})", status);
            let _ = writeln!(report, "Checked at: {}", Utc::now().to_rfc3339());
            let _ = writeln!(report, "Models:\n{}", models);
        }
    }

    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], report)
}
