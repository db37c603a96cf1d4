use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TranscriptionConfig;
use crate::error::{TranscriptionError, TranscriptionResult};
use crate::providers::{
    ops, JobRequest, JobStatus, JobStatusReport, RemoteFileHandle, RemoteJobHandle, SpeechProvider,
};
use crate::transcript::Token;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct CreateTranscriptionBody {
    file_id: String,
    model: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    language_hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    enable_speaker_diarization: bool,
}

#[derive(Deserialize)]
struct FileUploadResponse {
    id: String,
}

#[derive(Deserialize)]
struct CreateTranscriptionResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionStatusResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    tokens: Vec<Token>,
}

/// Deadline-aware client for the Soniox asynchronous REST API.
pub struct SonioxClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    upload_timeout: Duration,
    request_timeout: Duration,
}

impl SonioxClient {
    pub fn new(config: &TranscriptionConfig) -> TranscriptionResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            upload_timeout: config.upload_timeout,
            request_timeout: config.request_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a non-2xx response into a typed rejection carrying the provider's
    /// status code and body.
    async fn check(
        operation: &'static str,
        response: reqwest::Response,
    ) -> TranscriptionResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(TranscriptionError::ProviderRequestFailed {
            operation,
            status,
            body,
        })
    }
}

#[async_trait]
impl SpeechProvider for SonioxClient {
    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> TranscriptionResult<RemoteFileHandle> {
        let size = bytes.len();
        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(content_type)?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(self.url("/v1/files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await?;
        let payload: FileUploadResponse = Self::check(ops::UPLOAD, response).await?.json().await?;

        debug!(file_id = %payload.id, bytes = size, "uploaded audio file");
        Ok(RemoteFileHandle {
            file_id: payload.id,
        })
    }

    async fn create_transcription(
        &self,
        file: &RemoteFileHandle,
        request: &JobRequest,
    ) -> TranscriptionResult<RemoteJobHandle> {
        let body = CreateTranscriptionBody {
            file_id: file.file_id.clone(),
            model: request.model.clone(),
            language_hints: request.language_hints.clone(),
            context: request.context.clone(),
            enable_speaker_diarization: request.diarization,
        };

        let response = self
            .http
            .post(self.url("/v1/transcriptions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let payload: CreateTranscriptionResponse =
            Self::check(ops::CREATE, response).await?.json().await?;

        debug!(
            transcription_id = %payload.id,
            model = %request.model,
            diarization = request.diarization,
            "created transcription job"
        );
        let status = payload
            .status
            .as_deref()
            .map(JobStatus::parse)
            .unwrap_or(JobStatus::Queued);
        Ok(RemoteJobHandle {
            transcription_id: payload.id,
            status,
        })
    }

    async fn get_job_status(&self, job: &RemoteJobHandle) -> TranscriptionResult<JobStatusReport> {
        let response = self
            .http
            .get(self.url(&format!("/v1/transcriptions/{}", job.transcription_id)))
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let payload: TranscriptionStatusResponse =
            Self::check(ops::STATUS, response).await?.json().await?;

        Ok(JobStatusReport {
            status: JobStatus::parse(&payload.status),
            error_message: payload.error_message,
        })
    }

    async fn fetch_transcript(&self, job: &RemoteJobHandle) -> TranscriptionResult<Vec<Token>> {
        let response = self
            .http
            .get(self.url(&format!(
                "/v1/transcriptions/{}/transcript",
                job.transcription_id
            )))
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let payload: TranscriptResponse =
            Self::check(ops::TRANSCRIPT, response).await?.json().await?;

        debug!(tokens = payload.tokens.len(), "fetched transcript tokens");
        Ok(payload.tokens)
    }

    async fn delete_transcription(&self, job: &RemoteJobHandle) -> TranscriptionResult<()> {
        let response = self
            .http
            .delete(self.url(&format!("/v1/transcriptions/{}", job.transcription_id)))
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::check(ops::DELETE_JOB, response).await?;
        Ok(())
    }

    async fn delete_file(&self, file: &RemoteFileHandle) -> TranscriptionResult<()> {
        let response = self
            .http
            .delete(self.url(&format!("/v1/files/{}", file.file_id)))
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::check(ops::DELETE_FILE, response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TranscriptionConfig {
        TranscriptionConfig {
            api_key: "test-key".to_string(),
            api_base_url: "https://api.soniox.com/".to_string(),
            model: "stt-async-preview".to_string(),
            language_hints: vec!["en".to_string()],
            context: Some("Healthcare".to_string()),
            diarization: true,
            upload_timeout: Duration::from_secs(600),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 2700,
            conversion_timeout: Duration::from_secs(300),
            ffmpeg_path: "ffmpeg".to_string(),
            speaker_roles: vec!["Doctor".to_string(), "Patient".to_string()],
        }
    }

    #[test]
    fn base_url_is_normalized_without_a_trailing_slash() {
        let client = SonioxClient::new(&config()).unwrap();
        assert_eq!(
            client.url("/v1/files"),
            "https://api.soniox.com/v1/files"
        );
    }

    #[test]
    fn job_body_omits_empty_optional_fields() {
        let body = CreateTranscriptionBody {
            file_id: "file-1".to_string(),
            model: "stt-async-preview".to_string(),
            language_hints: Vec::new(),
            context: None,
            enable_speaker_diarization: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("language_hints").is_none());
        assert!(json.get("context").is_none());
        assert_eq!(json["file_id"], "file-1");
        assert_eq!(json["enable_speaker_diarization"], true);
    }
}
