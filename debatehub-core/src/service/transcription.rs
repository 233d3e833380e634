use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::{config::TranscriptionConfig, Error, Result};

/// Audio handed to the speech-to-text service
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Raw audio bytes, uploaded before transcription
    Buffer(Bytes),
    /// Publicly reachable audio URL
    Url(String),
}

/// Speech-to-text collaborator
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: AudioSource) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    id: String,
    status: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// AssemblyAI REST client: upload, submit, then poll until the transcript settles
#[derive(Clone)]
pub struct AssemblyAiTranscriber {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl std::fmt::Debug for AssemblyAiTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyAiTranscriber")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AssemblyAiTranscriber {
    #[must_use]
    pub fn new(config: &TranscriptionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    async fn upload(&self, audio: Bytes) -> Result<String> {
        let response: UploadResponse = self
            .client
            .post(format!("{}/v2/upload", self.base_url))
            .header("authorization", &self.api_key)
            .body(audio)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.upload_url)
    }

    async fn submit(&self, audio_url: &str) -> Result<TranscriptResponse> {
        Ok(self
            .client
            .post(format!("{}/v2/transcript", self.base_url))
            .header("authorization", &self.api_key)
            .json(&json!({ "audio_url": audio_url }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn fetch(&self, id: &str) -> Result<TranscriptResponse> {
        Ok(self
            .client
            .get(format!("{}/v2/transcript/{id}", self.base_url))
            .header("authorization", &self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn run(&self, audio: AudioSource) -> Result<String> {
        let audio_url = match audio {
            AudioSource::Buffer(bytes) => {
                if bytes.is_empty() {
                    return Err(Error::InvalidInput("audio buffer is empty".to_string()));
                }
                self.upload(bytes).await?
            }
            AudioSource::Url(url) => url,
        };

        let mut transcript = self.submit(&audio_url).await?;
        info!(transcript_id = %transcript.id, "Transcription submitted");

        loop {
            match transcript.status.as_str() {
                "completed" => return Ok(transcript.text.unwrap_or_default()),
                "error" => {
                    return Err(Error::TranscriptionFailed(
                        transcript
                            .error
                            .unwrap_or_else(|| "unknown transcription error".to_string()),
                    ))
                }
                status => {
                    debug!(transcript_id = %transcript.id, status, "Transcription pending");
                    tokio::time::sleep(self.poll_interval).await;
                    transcript = self.fetch(&transcript.id).await?;
                }
            }
        }
    }
}

#[async_trait]
impl SpeechToText for AssemblyAiTranscriber {
    async fn transcribe(&self, audio: AudioSource) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(Error::TranscriptionFailed(
                "transcription api key not configured".to_string(),
            ));
        }
        tokio::time::timeout(self.timeout, self.run(audio))
            .await
            .map_err(|_| {
                Error::TranscriptionFailed(format!("timed out after {:?}", self.timeout))
            })?
    }
}
