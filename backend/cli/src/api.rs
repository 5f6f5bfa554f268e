//! Read-only HTTP viewer for the latest recognition result.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};

use ocrdeck_core::Session;
use ocrdeck_recognition::SessionRecorder;

/// Shared state for viewer handlers.
pub struct ViewerState {
    pub output_dir: PathBuf,
    /// Seconds between page reloads.
    pub refresh_secs: u32,
}

/// Build the Axum router with the viewer routes.
pub fn build_router(state: Arc<ViewerState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/latest", get(latest))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ocrdeck",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// The latest session as stored on disk.
async fn latest(
    State(state): State<Arc<ViewerState>>,
) -> Result<Json<Session>, (StatusCode, Json<Value>)> {
    match SessionRecorder::load_latest(&state.output_dir).await {
        Ok(Some(session)) => Ok(Json(session)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no result yet" })),
        )),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read latest result");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    }
}

/// Self-refreshing page showing the latest JSON.
async fn index(State(state): State<Arc<ViewerState>>) -> Html<String> {
    let body = match SessionRecorder::load_latest(&state.output_dir).await {
        Ok(Some(session)) => session
            .to_json()
            .unwrap_or_else(|e| format!("Could not render result: {e}")),
        Ok(None) => "No data yet.".to_string(),
        Err(e) => format!("Could not read result: {e}"),
    };
    Html(render_page(&body, state.refresh_secs))
}

fn render_page(body: &str, refresh_secs: u32) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta http-equiv="refresh" content="{refresh}" />
  <title>OcrDeck latest result</title>
  <style>
    body {{ font-family: sans-serif; background: #0f172a; color: #e2e8f0; margin: 0; padding: 1.5rem; }}
    pre {{ background: #0b1221; border-radius: 8px; padding: 1rem; overflow-x: auto; color: #cbd5e1; }}
  </style>
</head>
<body>
  <h1>Latest result</h1>
  <p>Reloads every {refresh} s from <code>latest_result.json</code>.</p>
  <pre>{body}</pre>
</body>
</html>
"#,
        refresh = refresh_secs.max(1),
        body = escape_html(body),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use ocrdeck_core::{RecognitionResult, Rect, SourceId};

    fn state(name: &str) -> Arc<ViewerState> {
        let dir = std::env::temp_dir().join(format!("ocrdeck-viewer-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        Arc::new(ViewerState {
            output_dir: dir,
            refresh_secs: 1,
        })
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "ocrdeck");
    }

    #[tokio::test]
    async fn missing_result_is_not_found() {
        let state = state("missing");
        let (status, _) = latest(State(Arc::clone(&state))).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        let Html(page) = index(State(state)).await;
        assert!(page.contains("No data yet."));
    }

    #[tokio::test]
    async fn serves_saved_session() {
        let state = state("saved");
        let session = Session::new(
            Local::now(),
            SourceId::Monitor(1),
            (640, 480),
            vec![RecognitionResult {
                bbox: Rect::from_corners(0, 0, 10, 10).unwrap(),
                text: "<b>HELLO</b>".into(),
                confidence: 0.9,
            }],
        );
        SessionRecorder::new(&state.output_dir, false)
            .persist(&session)
            .await
            .unwrap();

        let Json(served) = latest(State(Arc::clone(&state))).await.unwrap();
        assert_eq!(served.boxes[0].text, "<b>HELLO</b>");

        let Html(page) = index(State(Arc::clone(&state))).await;
        assert!(page.contains("&lt;b&gt;HELLO&lt;/b&gt;"));
        assert!(!page.contains("<b>HELLO"));
        let _ = std::fs::remove_dir_all(&state.output_dir);
    }
}
