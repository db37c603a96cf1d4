use std::time::Duration;

use thiserror::Error;

use crate::providers::ops;

/// Failures surfaced to the caller of the transcription service.
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("audio conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("speech provider unreachable: {0}")]
    ProviderUnavailable(#[from] reqwest::Error),

    #[error("{operation} rejected by speech provider (status {status}): {body}")]
    ProviderRequestFailed {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("transcription job failed: {0}")]
    JobFailed(String),

    #[error("transcription job still pending after {attempts} status checks ({elapsed:?})")]
    JobTimedOut { attempts: u32, elapsed: Duration },
}

impl TranscriptionError {
    /// Whether resubmitting the same audio is a reasonable caller response.
    ///
    /// Upload and job-creation rejections happen before the provider starts
    /// processing, so a fresh submission is safe. A provider-reported job
    /// error is not retryable without new input, and configuration errors are
    /// never retried automatically.
    pub fn is_retryable(&self) -> bool {
        match self {
            TranscriptionError::ProviderUnavailable(_) => true,
            TranscriptionError::ProviderRequestFailed { operation, .. } => {
                *operation == ops::UPLOAD || *operation == ops::CREATE
            }
            TranscriptionError::JobTimedOut { .. } => true,
            TranscriptionError::Config(_)
            | TranscriptionError::Conversion(_)
            | TranscriptionError::JobFailed(_) => false,
        }
    }
}

/// Failures of the audio conversion subprocess.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{tool} produced no output")]
    NoOutput { tool: String },

    #[error("conversion timed out after {elapsed:?} ({input_bytes} input bytes)")]
    Timeout {
        elapsed: Duration,
        input_bytes: usize,
    },

    #[error("conversion I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TranscriptionResult<T> = Result<T, TranscriptionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_and_create_rejections_are_retryable() {
        let upload = TranscriptionError::ProviderRequestFailed {
            operation: ops::UPLOAD,
            status: 503,
            body: "try later".to_string(),
        };
        let create = TranscriptionError::ProviderRequestFailed {
            operation: ops::CREATE,
            status: 500,
            body: "oops".to_string(),
        };
        assert!(upload.is_retryable());
        assert!(create.is_retryable());
    }

    #[test]
    fn terminal_failures_are_not_retryable() {
        assert!(!TranscriptionError::JobFailed("bad audio".to_string()).is_retryable());
        assert!(!TranscriptionError::Config("missing key".to_string()).is_retryable());

        let fetch = TranscriptionError::ProviderRequestFailed {
            operation: ops::TRANSCRIPT,
            status: 404,
            body: "gone".to_string(),
        };
        assert!(!fetch.is_retryable());
    }

    #[test]
    fn timeout_carries_diagnostics() {
        let err = TranscriptionError::JobTimedOut {
            attempts: 2700,
            elapsed: Duration::from_secs(5400),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("2700"));
    }
}
