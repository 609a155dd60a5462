//! Traits for the external generation providers

use crate::error::Result;
use crate::types::{FileId, StatusReport, TaskId};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Finite, non-restartable sequence of binary chunks
///
/// Consumed exactly once; a failed chunk ends the sequence.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Prompt-in, text-out completion provider
#[async_trait]
pub trait TextService: Send + Sync {
    /// Return the single text completion for `prompt`
    ///
    /// # Errors
    ///
    /// Returns `Error::Provider` for non-success responses or a response with
    /// no completion.
    async fn complete(&self, prompt: &str, max_output_tokens: u32) -> Result<String>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Streaming text-to-speech provider
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Start synthesis and return the audio as a lazy chunk stream
    async fn synthesize_stream(
        &self,
        text: &str,
        voice_id: &str,
        model_id: &str,
    ) -> Result<ByteStream>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Asynchronous video generation provider
///
/// No push notification: callers submit, then poll [`VideoService::query_status`]
/// until a terminal status, then resolve and download the file.
#[async_trait]
pub trait VideoService: Send + Sync {
    /// Submit a generation task
    ///
    /// # Errors
    ///
    /// Returns `Error::Submission` if the provider rejects the request or
    /// returns no task identifier.
    async fn submit(&self, prompt: &str, model: &str) -> Result<TaskId>;

    /// Query the current status of a task
    async fn query_status(&self, task_id: &TaskId) -> Result<StatusReport>;

    /// Resolve a rendered file to a (signed) download URL
    async fn resolve_download_url(&self, file_id: &FileId) -> Result<String>;

    /// Fetch the raw bytes behind a download URL (unauthenticated)
    async fn download(&self, url: &str) -> Result<ByteStream>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
