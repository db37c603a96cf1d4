use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TranscriptionError, TranscriptionResult};

/// Transcription service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Bearer credential for the speech provider. Required.
    pub api_key: String,
    /// Base URL of the speech provider REST API.
    pub api_base_url: String,
    /// Provider model used for asynchronous transcription.
    pub model: String,
    /// Language hints forwarded with each job.
    pub language_hints: Vec<String>,
    /// Domain context used to bias recognition (e.g. "Healthcare").
    pub context: Option<String>,
    /// Whether to request speaker diarization.
    pub diarization: bool,
    /// Deadline for the multipart audio upload. Long by default since
    /// recordings of whole encounters can be large.
    pub upload_timeout: Duration,
    /// Deadline for every other provider request.
    pub request_timeout: Duration,
    /// Delay between job status polls.
    pub poll_interval: Duration,
    /// Maximum number of status polls before the job is abandoned.
    pub max_poll_attempts: u32,
    /// Wall-clock budget for the audio conversion subprocess.
    pub conversion_timeout: Duration,
    /// Conversion tool binary (name or absolute path).
    pub ffmpeg_path: String,
    /// Ordered role labels assigned to speakers by order of first appearance
    /// in the token stream.
    pub speaker_roles: Vec<String>,
}

impl TranscriptionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> TranscriptionResult<Self> {
        let api_key = std::env::var("SONIOX_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                TranscriptionError::Config("SONIOX_API_KEY is not set".to_string())
            })?;

        let api_base_url = std::env::var("SONIOX_API_URL")
            .unwrap_or_else(|_| "https://api.soniox.com".to_string());

        let model = std::env::var("SONIOX_MODEL")
            .unwrap_or_else(|_| "stt-async-preview".to_string());

        let language_hints = std::env::var("TRANSCRIBE_LANGUAGE_HINTS")
            .ok()
            .map(|raw| parse_list(&raw))
            .filter(|hints| !hints.is_empty())
            .unwrap_or_else(|| vec!["en".to_string()]);

        // An explicitly empty TRANSCRIBE_CONTEXT disables domain biasing.
        let context = match std::env::var("TRANSCRIBE_CONTEXT") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(raw),
            Err(_) => Some("Healthcare".to_string()),
        };

        let diarization = std::env::var("TRANSCRIBE_DIARIZATION")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(true);

        let speaker_roles = std::env::var("TRANSCRIBE_SPEAKER_ROLES")
            .ok()
            .map(|raw| parse_list(&raw))
            .filter(|roles| !roles.is_empty())
            .unwrap_or_else(|| vec!["Doctor".to_string(), "Patient".to_string()]);

        Ok(Self {
            api_key,
            api_base_url,
            model,
            language_hints,
            context,
            diarization,
            upload_timeout: secs_var("TRANSCRIBE_UPLOAD_TIMEOUT_SECS", 600),
            request_timeout: secs_var("TRANSCRIBE_REQUEST_TIMEOUT_SECS", 30),
            poll_interval: millis_var("TRANSCRIBE_POLL_INTERVAL_MS", 2000),
            max_poll_attempts: parse_var("TRANSCRIBE_MAX_POLL_ATTEMPTS", 2700),
            conversion_timeout: secs_var("TRANSCRIBE_CONVERSION_TIMEOUT_SECS", 300),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            speaker_roles,
        })
    }

    /// Upper bound on wall-clock time spent waiting for the provider to
    /// finish a job. Operators tune this against observed provider latency
    /// for long recordings.
    pub fn poll_budget(&self) -> Duration {
        self.poll_interval * self.max_poll_attempts
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn secs_var(name: &str, default_secs: u64) -> Duration {
    Duration::from_secs(parse_var(name, default_secs))
}

fn millis_var(name: &str, default_millis: u64) -> Duration {
    Duration::from_millis(parse_var(name, default_millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_trims_and_drops_empty_items() {
        assert_eq!(parse_list("en, de ,"), vec!["en".to_string(), "de".to_string()]);
        assert!(parse_list("  ").is_empty());
    }

    #[test]
    fn poll_budget_is_interval_times_attempts() {
        let config = TranscriptionConfig {
            api_key: "key".to_string(),
            api_base_url: "https://api.soniox.com".to_string(),
            model: "stt-async-preview".to_string(),
            language_hints: vec!["en".to_string()],
            context: None,
            diarization: true,
            upload_timeout: Duration::from_secs(600),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 2700,
            conversion_timeout: Duration::from_secs(300),
            ffmpeg_path: "ffmpeg".to_string(),
            speaker_roles: vec!["Doctor".to_string(), "Patient".to_string()],
        };
        assert_eq!(config.poll_budget(), Duration::from_secs(5400));
    }

    #[test]
    fn from_env_requires_the_provider_credential() {
        std::env::remove_var("SONIOX_API_KEY");
        let err = TranscriptionConfig::from_env().unwrap_err();
        assert!(matches!(err, TranscriptionError::Config(_)));

        std::env::set_var("SONIOX_API_KEY", "test-key");
        let config = TranscriptionConfig::from_env().unwrap();
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.model, "stt-async-preview");
        assert!(config.diarization);
        assert_eq!(config.context.as_deref(), Some("Healthcare"));
        assert_eq!(config.speaker_roles, vec!["Doctor", "Patient"]);
        std::env::remove_var("SONIOX_API_KEY");
    }
}
