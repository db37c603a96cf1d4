use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::audio::{AudioAsset, AudioNormalizer, ConversionResult, FfmpegNormalizer};
use crate::config::TranscriptionConfig;
use crate::error::{TranscriptionError, TranscriptionResult};
use crate::providers::{
    JobRequest, JobStatus, RemoteFileHandle, RemoteJobHandle, SonioxClient, SpeechProvider,
};
use crate::transcript::{SpeakerRoles, Token, Transcript};

/// Drives the end-to-end transcription job lifecycle: normalize, upload,
/// create, poll until terminal, fetch, clean up.
///
/// Each `transcribe` call is an independent flow with no state shared across
/// calls; one service instance can serve many concurrent requests.
pub struct TranscriptionService {
    config: TranscriptionConfig,
    provider: Arc<dyn SpeechProvider>,
    normalizer: Arc<dyn AudioNormalizer>,
    roles: SpeakerRoles,
}

impl TranscriptionService {
    /// Build the service from configuration. Fails fast when the provider
    /// credential is missing, before any network call.
    pub fn new(config: TranscriptionConfig) -> TranscriptionResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(TranscriptionError::Config(
                "speech provider API key is not set".to_string(),
            ));
        }
        let provider: Arc<dyn SpeechProvider> = Arc::new(SonioxClient::new(&config)?);
        let normalizer: Arc<dyn AudioNormalizer> = Arc::new(FfmpegNormalizer::new(
            config.ffmpeg_path.clone(),
            config.conversion_timeout,
        ));
        Ok(Self::with_parts(config, provider, normalizer))
    }

    pub fn from_env() -> TranscriptionResult<Self> {
        Self::new(TranscriptionConfig::from_env()?)
    }

    /// Assemble the service from explicit collaborators.
    pub fn with_parts(
        config: TranscriptionConfig,
        provider: Arc<dyn SpeechProvider>,
        normalizer: Arc<dyn AudioNormalizer>,
    ) -> Self {
        let roles = SpeakerRoles::new(config.speaker_roles.clone());
        Self {
            config,
            provider,
            normalizer,
            roles,
        }
    }

    /// Transcribe a raw recording into a speaker-attributed transcript.
    ///
    /// A completed job with no recognized speech returns an empty transcript,
    /// not an error.
    pub async fn transcribe(&self, asset: AudioAsset) -> TranscriptionResult<Transcript> {
        let prepared = self.prepare_audio(&asset).await;

        let upload = self
            .provider
            .upload_file(prepared.bytes, &prepared.filename, &prepared.content_type)
            .await?;
        info!(
            file_id = %upload.file_id,
            converted = prepared.converted,
            "audio uploaded to speech provider"
        );

        let mut cleanup = RemoteCleanup::new(Arc::clone(&self.provider), upload);
        let outcome = self.run_job(&mut cleanup).await;
        cleanup.run().await;
        let tokens = outcome?;

        if tokens.is_empty() {
            debug!("transcription job produced no tokens");
        }
        Ok(Transcript::from_tokens(&tokens, &self.roles))
    }

    /// Convenience wrapper over [`transcribe`](Self::transcribe) for callers
    /// holding loose bytes plus hints.
    pub async fn transcribe_bytes(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        filename: &str,
    ) -> TranscriptionResult<Transcript> {
        self.transcribe(AudioAsset::new(bytes, content_type, filename))
            .await
    }

    /// Best-effort canonicalization. Conversion is an optimization, not a
    /// hard dependency: any failure falls back to the original buffer with
    /// its original content type and filename.
    async fn prepare_audio(&self, asset: &AudioAsset) -> ConversionResult {
        match self.normalizer.normalize(asset).await {
            Ok(converted) => converted,
            Err(err) => {
                warn!(
                    error = %err,
                    content_type = %asset.content_type,
                    input_bytes = asset.bytes.len(),
                    "audio conversion failed, submitting original buffer"
                );
                ConversionResult::passthrough(asset)
            }
        }
    }

    async fn run_job(&self, cleanup: &mut RemoteCleanup) -> TranscriptionResult<Vec<Token>> {
        let request = JobRequest {
            model: self.config.model.clone(),
            language_hints: self.config.language_hints.clone(),
            context: self.config.context.clone(),
            diarization: self.config.diarization,
        };

        let file = cleanup.file.clone();
        let job = self.provider.create_transcription(&file, &request).await?;
        info!(transcription_id = %job.transcription_id, "transcription job created");
        cleanup.track_job(job.clone());

        self.wait_for_completion(&job).await?;
        self.provider.fetch_transcript(&job).await
    }

    async fn wait_for_completion(&self, job: &RemoteJobHandle) -> TranscriptionResult<()> {
        let started = Instant::now();

        for attempt in 1..=self.config.max_poll_attempts {
            let report = self.provider.get_job_status(job).await?;
            match report.status {
                JobStatus::Completed => {
                    debug!(
                        attempt,
                        elapsed = ?started.elapsed(),
                        "transcription job completed"
                    );
                    return Ok(());
                }
                JobStatus::Error => {
                    let message = report.error_message.unwrap_or_else(|| {
                        "provider reported an unspecified error".to_string()
                    });
                    return Err(TranscriptionError::JobFailed(message));
                }
                _ => tokio::time::sleep(self.config.poll_interval).await,
            }
        }

        Err(TranscriptionError::JobTimedOut {
            attempts: self.config.max_poll_attempts,
            elapsed: started.elapsed(),
        })
    }
}

/// Deletes provider-side resources exactly once, on every exit path.
///
/// The owning call awaits [`run`](RemoteCleanup::run) before returning; if
/// the orchestration future is dropped first (caller abort), `Drop` spawns
/// the deletions on the runtime instead. Deletion failures are logged and
/// swallowed so they never mask the primary result.
struct RemoteCleanup {
    provider: Arc<dyn SpeechProvider>,
    file: RemoteFileHandle,
    job: Option<RemoteJobHandle>,
    done: bool,
}

impl RemoteCleanup {
    fn new(provider: Arc<dyn SpeechProvider>, file: RemoteFileHandle) -> Self {
        Self {
            provider,
            file,
            job: None,
            done: false,
        }
    }

    fn track_job(&mut self, job: RemoteJobHandle) {
        self.job = Some(job);
    }

    async fn run(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        delete_remote(
            Arc::clone(&self.provider),
            self.job.take(),
            self.file.clone(),
        )
        .await;
    }
}

impl Drop for RemoteCleanup {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        let provider = Arc::clone(&self.provider);
        let job = self.job.take();
        let file = self.file.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    delete_remote(provider, job, file).await;
                });
            }
            Err(_) => {
                warn!(
                    file_id = %file.file_id,
                    "no async runtime available to delete remote resources"
                );
            }
        }
    }
}

async fn delete_remote(
    provider: Arc<dyn SpeechProvider>,
    job: Option<RemoteJobHandle>,
    file: RemoteFileHandle,
) {
    if let Some(job) = job {
        if let Err(err) = provider.delete_transcription(&job).await {
            warn!(
                transcription_id = %job.transcription_id,
                error = %err,
                "failed to delete transcription job"
            );
        }
    }
    if let Err(err) = provider.delete_file(&file).await {
        warn!(
            file_id = %file.file_id,
            error = %err,
            "failed to delete uploaded audio file"
        );
    }
}
