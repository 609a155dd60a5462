//! Error types for shortgen
//!
//! This module provides error handling for the pipeline, including:
//! - Stage-specific error variants (script, voiceover, video job, mux)
//! - Process exit code mapping for the command line binary
//! - Structured failure reports with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for shortgen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for shortgen
///
/// Every stage failure is fatal to a pipeline run. Each variant carries enough
/// context to tell the operator which collaborator failed and why.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "TEXT_SERVICE_KEY")
        key: Option<String>,
    },

    /// Narration text was empty or whitespace-only
    #[error("the script text is empty, cannot generate voiceover")]
    EmptyScript,

    /// A text or speech provider answered with an unexpected status or body
    #[error("{service} provider error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Provider {
        /// Which collaborator failed ("text", "speech")
        service: &'static str,
        /// HTTP status code, if the failure came from an HTTP response
        status: Option<u16>,
        /// Provider message or response body
        message: String,
    },

    /// Video generation request was rejected or returned no task identifier
    #[error("video submission failed: {0}")]
    Submission(String),

    /// A status query for a submitted video task failed
    #[error("status query for task {task_id} failed: {message}")]
    Poll {
        /// The task being polled
        task_id: String,
        /// The reason the query failed
        message: String,
    },

    /// The rendered video could not be resolved or downloaded
    #[error("video retrieval for file {file_id} failed: {message}")]
    Retrieval {
        /// The provider file identifier
        file_id: String,
        /// The reason retrieval failed
        message: String,
    },

    /// The provider reported a terminal failure (or an unrecognized status) for the task
    #[error("video generation for task {task_id} failed with status {status}")]
    VideoGenerationFailed {
        /// The failed task
        task_id: String,
        /// The raw status reported by the provider
        status: String,
    },

    /// The video task did not reach a terminal state within the configured wait
    #[error("video task {task_id} did not finish within {}s", .waited.as_secs())]
    Timeout {
        /// The task that timed out
        task_id: String,
        /// How long the pipeline waited
        waited: Duration,
    },

    /// Combining the video and voice track failed
    #[error("mux failed: {0}")]
    Mux(String),

    /// External tool execution failed (ffmpeg not found, could not spawn)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// The run was cancelled by the operator
    #[error("pipeline run cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// The pipeline stage a failure is attributed to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Configuration and input validation, before any stage runs
    Setup,
    /// Narration text generation
    Script,
    /// Speech synthesis
    Voiceover,
    /// Submitting the video generation task
    VideoSubmission,
    /// Polling and retrieving the rendered video
    VideoGeneration,
    /// Combining video and voice track
    Mux,
}

impl PipelineStage {
    /// Process exit code used when a run fails in this stage
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineStage::Setup => 2,
            PipelineStage::Script => 10,
            PipelineStage::Voiceover => 11,
            PipelineStage::VideoSubmission => 12,
            PipelineStage::VideoGeneration => 13,
            PipelineStage::Mux => 14,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Setup => "setup",
            PipelineStage::Script => "script",
            PipelineStage::Voiceover => "voiceover",
            PipelineStage::VideoSubmission => "video submission",
            PipelineStage::VideoGeneration => "video generation",
            PipelineStage::Mux => "mux",
        };
        f.write_str(name)
    }
}

/// Exit code reported when the operator cancels a run (128 + SIGINT)
pub const EXIT_CANCELLED: i32 = 130;

/// Convert errors to process exit codes and machine-readable codes
pub trait ToExitCode {
    /// Get the process exit code for this error when raised in `stage`
    fn exit_code(&self, stage: PipelineStage) -> i32;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToExitCode for Error {
    fn exit_code(&self, stage: PipelineStage) -> i32 {
        match self {
            Error::Cancelled => EXIT_CANCELLED,
            Error::Config { .. } => PipelineStage::Setup.exit_code(),
            _ => stage.exit_code(),
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::EmptyScript => "empty_script",
            Error::Provider { .. } => "provider_error",
            Error::Submission(_) => "submission_error",
            Error::Poll { .. } => "poll_error",
            Error::Retrieval { .. } => "retrieval_error",
            Error::VideoGenerationFailed { .. } => "video_generation_failed",
            Error::Timeout { .. } => "timeout",
            Error::Mux(_) => "mux_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::Cancelled => "cancelled",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}

/// Structured failure report for a pipeline run
///
/// Lets callers and tests assert on the failure category without parsing
/// human-readable text.
///
/// # Example JSON
///
/// ```json
/// {
///   "stage": "video_submission",
///   "code": "submission_error",
///   "message": "video submission failed: HTTP 500: upstream unavailable",
///   "exit_code": 12
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Stage the run failed in
    pub stage: PipelineStage,
    /// Machine-readable error code (e.g., "empty_script", "timeout")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Process exit code the binary should return
    pub exit_code: i32,
}

impl Failure {
    /// Build a failure report from an error raised in `stage`
    pub fn new(stage: PipelineStage, error: &Error) -> Self {
        Self {
            stage,
            code: error.error_code().to_string(),
            message: error.to_string(),
            exit_code: error.exit_code(stage),
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.message)
    }
}

/// An error paired with the stage it was raised in
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    /// Stage the error was raised in
    pub stage: PipelineStage,
    /// The underlying error
    #[source]
    pub source: Error,
}

impl StageError {
    /// Attach a stage to an error
    pub fn new(stage: PipelineStage, source: Error) -> Self {
        Self { stage, source }
    }

    /// Structured report for this error
    pub fn failure(&self) -> Failure {
        Failure::new(self.stage, &self.source)
    }
}

/// Extension to tag a `Result` with the stage it belongs to
pub(crate) trait InStage<T> {
    fn in_stage(self, stage: PipelineStage) -> std::result::Result<T, StageError>;
}

impl<T> InStage<T> for Result<T> {
    fn in_stage(self, stage: PipelineStage) -> std::result::Result<T, StageError> {
        self.map_err(|e| StageError::new(stage, e))
    }
}
