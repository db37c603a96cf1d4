use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use crate::error::ConversionError;

/// Sample rate the speech provider performs best with.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Immutable raw recording handed in by the caller.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub source_filename: String,
    pub duration_seconds: Option<f64>,
}

impl AudioAsset {
    pub fn new(
        bytes: Vec<u8>,
        content_type: impl Into<String>,
        source_filename: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            source_filename: source_filename.into(),
            duration_seconds: None,
        }
    }
}

/// Outcome of a normalization attempt.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub filename: String,
    /// False when the original buffer was reused unconverted.
    pub converted: bool,
}

impl ConversionResult {
    /// Fallback result that reuses the original buffer untouched.
    pub fn passthrough(asset: &AudioAsset) -> Self {
        Self {
            bytes: asset.bytes.clone(),
            content_type: asset.content_type.clone(),
            filename: asset.source_filename.clone(),
            converted: false,
        }
    }
}

/// Converts an arbitrary compressed recording into the canonical format for
/// the speech provider.
#[async_trait]
pub trait AudioNormalizer: Send + Sync {
    async fn normalize(&self, asset: &AudioAsset) -> Result<ConversionResult, ConversionError>;
}

/// Normalizes audio to mono 16-bit PCM, 16 kHz WAV via an ffmpeg subprocess.
///
/// The input buffer is piped through stdin and the converted WAV is read from
/// stdout; stderr is drained concurrently for diagnostics. The whole child
/// lifetime runs under a hard wall-clock timeout, and an expired child is
/// killed rather than awaited.
pub struct FfmpegNormalizer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl FfmpegNormalizer {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        let mut args: Vec<String> = [
            "-hide_banner",
            "-loglevel",
            "error",
            "-i",
            "pipe:0",
            "-ac",
            "1",
            "-ar",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
        args.push(TARGET_SAMPLE_RATE.to_string());
        args.extend(
            ["-acodec", "pcm_s16le", "-f", "wav", "pipe:1"]
                .iter()
                .map(|arg| arg.to_string()),
        );

        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Run an arbitrary filter command in place of ffmpeg.
    #[cfg(test)]
    fn with_command(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    async fn run(&self, asset: &AudioAsset) -> Result<ConversionResult, ConversionError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConversionError::Spawn {
                tool: self.program.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("child stdin was not captured"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout was not captured"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("child stderr was not captured"))?;

        // The converter may exit before consuming all of its input (e.g. on a
        // corrupt container); a broken pipe here is reported through the exit
        // status instead, so the write result is intentionally discarded.
        let input = asset.bytes.clone();
        let writer = tokio::spawn(async move {
            let _ = stdin.write_all(&input).await;
            let _ = stdin.shutdown().await;
        });

        // Both output pipes are drained while the child runs; a converter
        // that fills one pipe while the other is unread would deadlock
        // otherwise.
        let mut converted = Vec::new();
        let mut diagnostics = Vec::new();
        let (status, stdout_read, stderr_read) = tokio::join!(
            child.wait(),
            stdout.read_to_end(&mut converted),
            stderr.read_to_end(&mut diagnostics),
        );
        let _ = writer.await;
        let status = status?;
        stdout_read?;
        stderr_read?;

        if !status.success() {
            return Err(ConversionError::Failed {
                tool: self.program.clone(),
                status,
                stderr: String::from_utf8_lossy(&diagnostics).trim().to_string(),
            });
        }
        if converted.is_empty() {
            return Err(ConversionError::NoOutput {
                tool: self.program.clone(),
            });
        }

        debug!(
            input_bytes = asset.bytes.len(),
            output_bytes = converted.len(),
            "audio converted to mono 16 kHz wav"
        );

        Ok(ConversionResult {
            bytes: converted,
            content_type: "audio/wav".to_string(),
            filename: wav_filename(&asset.source_filename),
            converted: true,
        })
    }
}

#[async_trait]
impl AudioNormalizer for FfmpegNormalizer {
    async fn normalize(&self, asset: &AudioAsset) -> Result<ConversionResult, ConversionError> {
        let started = Instant::now();
        let input_bytes = asset.bytes.len();

        match tokio::time::timeout(self.timeout, self.run(asset)).await {
            Ok(result) => result,
            // Dropping the timed-out future kills the child (kill_on_drop).
            Err(_) => Err(ConversionError::Timeout {
                elapsed: started.elapsed(),
                input_bytes,
            }),
        }
    }
}

fn wav_filename(source: &str) -> String {
    match source.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.wav"),
        _ => format!("{source}.wav"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(bytes: &[u8]) -> AudioAsset {
        AudioAsset::new(bytes.to_vec(), "audio/webm", "visit.webm")
    }

    #[test]
    fn wav_filename_replaces_the_extension() {
        assert_eq!(wav_filename("visit.webm"), "visit.wav");
        assert_eq!(wav_filename("recording"), "recording.wav");
        assert_eq!(wav_filename("a.b.ogg"), "a.b.wav");
    }

    #[tokio::test]
    async fn passthrough_command_round_trips_the_buffer() {
        let normalizer =
            FfmpegNormalizer::with_command("cat", Vec::new(), Duration::from_secs(10));
        let result = normalizer.normalize(&asset(b"fake-opus-bytes")).await.unwrap();
        assert!(result.converted);
        assert_eq!(result.bytes, b"fake-opus-bytes");
        assert_eq!(result.content_type, "audio/wav");
        assert_eq!(result.filename, "visit.wav");
    }

    #[tokio::test]
    async fn failing_command_reports_the_exit_status() {
        let normalizer =
            FfmpegNormalizer::with_command("false", Vec::new(), Duration::from_secs(10));
        let err = normalizer.normalize(&asset(b"bytes")).await.unwrap_err();
        assert!(matches!(err, ConversionError::Failed { .. }));
    }

    #[tokio::test]
    async fn missing_binary_reports_a_spawn_failure() {
        let normalizer = FfmpegNormalizer::with_command(
            "definitely-not-an-installed-converter",
            Vec::new(),
            Duration::from_secs(10),
        );
        let err = normalizer.normalize(&asset(b"bytes")).await.unwrap_err();
        assert!(matches!(err, ConversionError::Spawn { .. }));
    }

    #[tokio::test]
    async fn stuck_command_is_killed_at_the_timeout() {
        let normalizer = FfmpegNormalizer::with_command(
            "sleep",
            vec!["30".to_string()],
            Duration::from_millis(200),
        );
        let started = Instant::now();
        let err = normalizer.normalize(&asset(b"bytes")).await.unwrap_err();
        assert!(matches!(err, ConversionError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
