//! Audio Transcription Service for Clinical Documentation
//!
//! Takes a raw voice recording, canonicalizes it to the format the speech
//! provider expects, drives the provider's asynchronous job lifecycle
//! (upload, create, poll, fetch, delete), and turns the resulting word-level
//! tokens into a speaker-attributed transcript for downstream note
//! generation.
//!
//! # Features
//!
//! - Best-effort audio normalization via an external ffmpeg subprocess with a
//!   hard wall-clock timeout; conversion failure falls back to submitting the
//!   original buffer
//! - Bounded status polling sized for multi-hour recordings
//! - Provider-side resources (uploaded file, transcription job) are deleted
//!   on every exit path, including caller cancellation
//! - Speaker diarization rendered with configurable clinical role labels
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use transcription_service::{AudioAsset, TranscriptionService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = TranscriptionService::from_env()?;
//!
//! let audio = std::fs::read("visit.webm")?;
//! let transcript = service
//!     .transcribe(AudioAsset::new(audio, "audio/webm", "visit.webm"))
//!     .await?;
//!
//! println!("{}", transcript.full_text);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod providers;
pub mod service;
pub mod transcript;

pub use audio::*;
pub use config::*;
pub use error::*;
pub use providers::*;
pub use service::*;
pub use transcript::*;
