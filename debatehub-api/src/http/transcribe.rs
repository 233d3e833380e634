//! Speech-to-text endpoint

use axum::{
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use bytes::Bytes;
use debatehub_core::service::AudioSource;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::http::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub audio_url: String,
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Transcribe a JSON `{audio_url}` or a raw audio body
pub async fn transcribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<TranscribeResponse>> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));

    let source = if is_json {
        let request: TranscribeRequest = serde_json::from_slice(&body)?;
        if request.audio_url.trim().is_empty() {
            return Err(AppError::bad_request("audio_url is empty"));
        }
        AudioSource::Url(request.audio_url)
    } else {
        if body.is_empty() {
            return Err(AppError::bad_request("audio body is empty"));
        }
        AudioSource::Buffer(body)
    };

    let text = state.transcriber.transcribe(source).await?;
    info!(chars = text.len(), "Transcription completed");
    Ok(Json(TranscribeResponse { text }))
}

#[cfg(test)]
mod tests {
    use crate::http::{create_router, test_support};
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    async fn post(content_type: &str, body: &'static [u8]) -> (StatusCode, serde_json::Value) {
        let response = create_router(test_support::state())
            .oneshot(
                Request::post("/api/transcribe")
                    .header("content-type", content_type)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_transcribe_url() {
        let (status, value) = post("application/json", br#"{"audio_url":"https://cdn/a.wav"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["text"], "transcript of https://cdn/a.wav");
    }

    #[tokio::test]
    async fn test_transcribe_raw_body() {
        let (status, value) = post("audio/wav", b"RIFF....").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["text"], "8 bytes");
    }

    #[tokio::test]
    async fn test_transcribe_bad_input() {
        let (status, _) = post("application/json", b"{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = post("audio/wav", b"").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let (status, value) =
            post("application/json", br#"{"audio_url":"https://cdn/broken.wav"}"#).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(value["status"], 502);
    }
}
