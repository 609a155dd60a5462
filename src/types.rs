//! Core types for shortgen

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Failure, PipelineStage, Result, StageError};

/// Identifier for one pipeline run, used to namespace transient files
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a fresh run identifier (`YYYYmmdd-HHMMSS-xxxx`)
    pub fn generate() -> Self {
        use rand::Rng;
        let suffix: u16 = rand::thread_rng().r#gen();
        Self(format!("{}-{:04x}", Utc::now().format("%Y%m%d-%H%M%S"), suffix))
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operator-supplied subject for the video
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Create a topic, rejecting blank input
    pub fn new(topic: impl Into<String>) -> Result<Self> {
        let topic = topic.into();
        let trimmed = topic.trim();
        if trimmed.is_empty() {
            return Err(Error::config("topic must not be empty", "topic"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Topic text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generation prompt derived from a [`Topic`]
///
/// Shared by the text service (script) and the video service (visuals).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prompt(String);

impl Prompt {
    /// Render `template`, replacing every `{topic}` with the topic text
    pub fn from_topic(topic: &Topic, template: &str) -> Self {
        Self(template.replace("{topic}", topic.as_str()))
    }

    /// Prompt text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the rendered prompt has any content
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Narration text; never empty or whitespace-only
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Script(String);

impl Script {
    /// Validate narration text
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(Error::EmptyScript);
        }
        Ok(Self(text))
    }

    /// Narration text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Synthesized narration audio written to disk
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceTrack {
    /// Transient audio file
    pub path: PathBuf,
    /// Number of audio bytes written
    pub bytes: u64,
}

/// Opaque task identifier assigned by the video service on submission
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a rendered video file
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status reported by the video service for a task
///
/// Closed set: anything the provider sends that is not one of the known
/// values lands in [`VideoStatus::Unrecognized`], which is terminal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Task accepted, resources being prepared
    Preparing,
    /// Waiting for a render slot
    Queueing,
    /// Rendering
    Processing,
    /// Rendered; a file identifier is available
    Success,
    /// Provider reported failure
    Fail,
    /// Provider reported it does not know the task state
    Unknown,
    /// A value the provider sent that this client does not know
    Unrecognized(String),
}

impl VideoStatus {
    /// Map a raw provider status string
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "Preparing" => VideoStatus::Preparing,
            "Queueing" => VideoStatus::Queueing,
            "Processing" => VideoStatus::Processing,
            "Success" => VideoStatus::Success,
            "Fail" => VideoStatus::Fail,
            "Unknown" => VideoStatus::Unknown,
            other => VideoStatus::Unrecognized(other.to_string()),
        }
    }

    /// Provider spelling of this status
    pub fn as_str(&self) -> &str {
        match self {
            VideoStatus::Preparing => "Preparing",
            VideoStatus::Queueing => "Queueing",
            VideoStatus::Processing => "Processing",
            VideoStatus::Success => "Success",
            VideoStatus::Fail => "Fail",
            VideoStatus::Unknown => "Unknown",
            VideoStatus::Unrecognized(raw) => raw,
        }
    }

    /// Whether the task is still being worked on
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            VideoStatus::Preparing | VideoStatus::Queueing | VideoStatus::Processing
        )
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status query answer from the video service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    /// Reported status
    pub status: VideoStatus,
    /// File identifier (non-empty only once rendering succeeded)
    pub file_id: Option<FileId>,
}

/// State of a video generation task as seen by the pipeline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    /// Submitted, not yet polled
    Submitted,
    /// Provider is still working (Preparing, Queueing or Processing)
    InProgress {
        /// Last reported status
        status: VideoStatus,
    },
    /// Rendered and ready for retrieval
    Succeeded {
        /// File to retrieve
        file_id: FileId,
    },
    /// Terminal failure (Fail, Unknown, unrecognized, or success without a file)
    Failed {
        /// Status that caused the failure
        status: VideoStatus,
    },
}

impl JobState {
    /// Whether no further transition can occur
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded { .. } | JobState::Failed { .. })
    }

    /// Next state for a status report
    pub fn from_report(report: StatusReport) -> Self {
        match report.status {
            VideoStatus::Success => match report.file_id {
                Some(file_id) if !file_id.0.is_empty() => JobState::Succeeded { file_id },
                // fail-closed: success without a file cannot be retrieved
                _ => JobState::Failed {
                    status: VideoStatus::Success,
                },
            },
            status if status.is_in_progress() => JobState::InProgress { status },
            status => JobState::Failed { status },
        }
    }
}

/// A submitted video generation task and its polling history
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VideoJob {
    /// Provider task identifier
    pub task_id: TaskId,
    /// Current state
    pub state: JobState,
    /// Number of status queries applied so far
    pub polls: u32,
    /// When the task was submitted
    pub submitted_at: DateTime<Utc>,
}

impl VideoJob {
    /// Track a freshly submitted task
    pub fn submitted(task_id: TaskId) -> Self {
        Self {
            task_id,
            state: JobState::Submitted,
            polls: 0,
            submitted_at: Utc::now(),
        }
    }

    /// Apply a status report; terminal states are never changed
    ///
    /// Returns `true` if the report was applied.
    pub fn apply(&mut self, report: StatusReport) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.polls += 1;
        self.state = JobState::from_report(report);
        true
    }
}

/// Rendered video downloaded to disk
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoArtifact {
    /// Transient video file
    pub path: PathBuf,
    /// Number of bytes downloaded
    pub bytes: u64,
}

/// The muxed deliverable; the only file that outlives a successful run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalArtifact {
    /// Output path
    pub path: PathBuf,
}

/// Terminal outcome of a pipeline run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Final video written
    Succeeded {
        /// Output path
        output: PathBuf,
    },
    /// The run aborted
    Failed(Failure),
}

impl PipelineOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineOutcome::Succeeded { .. } => 0,
            PipelineOutcome::Failed(failure) => failure.exit_code,
        }
    }
}

impl From<&std::result::Result<FinalArtifact, StageError>> for PipelineOutcome {
    fn from(result: &std::result::Result<FinalArtifact, StageError>) -> Self {
        match result {
            Ok(artifact) => PipelineOutcome::Succeeded {
                output: artifact.path.clone(),
            },
            Err(e) => PipelineOutcome::Failed(e.failure()),
        }
    }
}

/// Event emitted during a pipeline run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Script generated and saved
    ScriptGenerated {
        /// Saved script file
        path: PathBuf,
        /// Narration length in characters
        chars: usize,
    },

    /// Voiceover synthesis started
    SynthesizingVoiceover {
        /// Narration being spoken
        script: String,
    },

    /// Voiceover written
    VoiceoverSynthesized {
        /// Audio file
        path: PathBuf,
        /// Audio size in bytes
        bytes: u64,
    },

    /// Video task submitted
    VideoSubmitted {
        /// Provider task identifier
        task_id: TaskId,
    },

    /// Status poll answered
    VideoStatus {
        /// Provider task identifier
        task_id: TaskId,
        /// Reported status
        status: VideoStatus,
        /// Poll number (1-based)
        poll: u32,
    },

    /// Download URL resolved for the rendered video
    VideoReady {
        /// Signed download URL
        download_url: String,
    },

    /// Rendered video downloaded
    VideoDownloaded {
        /// Video file
        path: PathBuf,
        /// Video size in bytes
        bytes: u64,
    },

    /// Video and voice track combined
    Muxed {
        /// Final output
        path: PathBuf,
    },

    /// Transient files removed
    CleanupComplete {
        /// Number of files deleted
        removed: usize,
    },

    /// Run finished successfully
    Completed {
        /// Final output
        path: PathBuf,
    },

    /// Run aborted
    Failed {
        /// Structured failure report
        failure: Failure,
    },
}
