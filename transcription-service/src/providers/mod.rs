pub mod soniox;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TranscriptionResult;
use crate::transcript::Token;

pub use soniox::SonioxClient;

/// Provider operation names used in error reporting.
pub mod ops {
    pub const UPLOAD: &str = "upload file";
    pub const CREATE: &str = "create transcription";
    pub const STATUS: &str = "poll status";
    pub const TRANSCRIPT: &str = "fetch transcript";
    pub const DELETE_JOB: &str = "delete transcription";
    pub const DELETE_FILE: &str = "delete file";
}

/// Provider-side handle for an uploaded audio file. Owned by exactly one
/// orchestration run and deleted before that run returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFileHandle {
    pub file_id: String,
}

/// Provider-side handle for a transcription job. Same ownership rule as
/// [`RemoteFileHandle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteJobHandle {
    pub transcription_id: String,
    pub status: JobStatus,
}

/// Provider job states. Only the two terminal states are interpreted;
/// everything else means "keep polling".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
    Other(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "queued" => JobStatus::Queued,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "error" => JobStatus::Error,
            other => JobStatus::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// One status poll: the job state plus the provider's failure message, if any.
#[derive(Debug, Clone)]
pub struct JobStatusReport {
    pub status: JobStatus,
    pub error_message: Option<String>,
}

/// Parameters for a transcription job submission.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub model: String,
    pub language_hints: Vec<String>,
    pub context: Option<String>,
    pub diarization: bool,
}

/// Operations against the external speech-to-text provider.
///
/// Every call carries its own deadline; a breached deadline cancels only that
/// call. The delete operations are best-effort cleanup and their errors are
/// handled (logged, never surfaced) by the orchestrator.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Multipart upload of the (possibly converted) audio buffer.
    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> TranscriptionResult<RemoteFileHandle>;

    /// Submit a transcription job referencing an uploaded file.
    async fn create_transcription(
        &self,
        file: &RemoteFileHandle,
        request: &JobRequest,
    ) -> TranscriptionResult<RemoteJobHandle>;

    /// Single status poll.
    async fn get_job_status(&self, job: &RemoteJobHandle) -> TranscriptionResult<JobStatusReport>;

    /// Fetch word-level tokens; valid only after the job completed.
    async fn fetch_transcript(&self, job: &RemoteJobHandle) -> TranscriptionResult<Vec<Token>>;

    async fn delete_transcription(&self, job: &RemoteJobHandle) -> TranscriptionResult<()>;

    async fn delete_file(&self, file: &RemoteFileHandle) -> TranscriptionResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_maps_terminal_states() {
        assert_eq!(JobStatus::parse("completed"), JobStatus::Completed);
        assert_eq!(JobStatus::parse("error"), JobStatus::Error);
        assert_eq!(JobStatus::parse("queued"), JobStatus::Queued);
        assert_eq!(
            JobStatus::parse("transcoding"),
            JobStatus::Other("transcoding".to_string())
        );
    }

    #[test]
    fn only_completed_and_error_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(!JobStatus::Other("transcoding".to_string()).is_terminal());
    }
}
