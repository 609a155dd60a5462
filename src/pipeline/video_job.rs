//! Video job state machine: submit, poll until terminal, retrieve
//!
//! ```text
//! Submitted --poll--> InProgress --poll--> ... --poll--> Succeeded --retrieve--> artifact
//!     \                   \
//!      `-----poll-----> Failed <--poll--'
//! ```
//!
//! Polling uses a fixed interval and a bounded total wait. The cancellation
//! token is checked on every iteration.

use crate::artifacts::ArtifactStore;
use crate::config::VideoConfig;
use crate::error::{Error, Result};
use crate::services::VideoService;
use crate::types::{Event, FileId, JobState, Prompt, TaskId, VideoArtifact, VideoJob};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives one video generation task through its lifecycle
pub struct VideoJobManager {
    video: Arc<dyn VideoService>,
    model: String,
    poll_interval: Duration,
    max_wait: Duration,
    event_tx: broadcast::Sender<Event>,
}

impl VideoJobManager {
    /// Create a manager for `video` using the model and polling policy in `config`
    pub fn new(
        video: Arc<dyn VideoService>,
        config: &VideoConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            video,
            model: config.model.clone(),
            poll_interval: config.poll_interval,
            max_wait: config.max_wait,
            event_tx,
        }
    }

    /// Submit a generation task for `prompt`
    ///
    /// Any provider error is reported as [`Error::Submission`].
    pub async fn submit(&self, prompt: &Prompt) -> Result<VideoJob> {
        info!(model = %self.model, service = self.video.name(), "submitting video generation task");

        let task_id = self
            .video
            .submit(prompt.as_str(), &self.model)
            .await
            .map_err(|e| match e {
                Error::Submission(_) => e,
                other => Error::Submission(other.to_string()),
            })?;
        if task_id.0.is_empty() {
            return Err(Error::Submission("provider returned an empty task id".into()));
        }

        info!(%task_id, "video generation task submitted");
        self.event_tx
            .send(Event::VideoSubmitted {
                task_id: task_id.clone(),
            })
            .ok();
        Ok(VideoJob::submitted(task_id))
    }

    /// Query the task once and apply the answer
    ///
    /// A job already in a terminal state is returned unchanged without
    /// contacting the provider.
    pub async fn poll_once(&self, job: &mut VideoJob) -> Result<JobState> {
        if job.state.is_terminal() {
            debug!(task_id = %job.task_id, "job already terminal, not polling");
            return Ok(job.state.clone());
        }

        let report = self
            .video
            .query_status(&job.task_id)
            .await
            .map_err(|e| poll_error(&job.task_id, e))?;
        let status = report.status.clone();
        job.apply(report);

        info!(task_id = %job.task_id, %status, poll = job.polls, "video status");
        self.event_tx
            .send(Event::VideoStatus {
                task_id: job.task_id.clone(),
                status,
                poll: job.polls,
            })
            .ok();
        Ok(job.state.clone())
    }

    /// Poll until the task succeeds, fails, times out or is cancelled
    ///
    /// Sleeps `poll_interval` before every poll. `max_wait` is a hard deadline
    /// counted from the first call: it cuts short both the sleep and a status
    /// query in flight, so no poll result is accepted after it passes.
    /// Cancellation interrupts the sleep and the query alike. Returns the file
    /// to retrieve.
    pub async fn wait_for_completion(
        &self,
        job: &mut VideoJob,
        cancel: &CancellationToken,
    ) -> Result<FileId> {
        let started = Instant::now();
        let deadline = started + self.max_wait;
        let task_id = job.task_id.clone();

        loop {
            match &job.state {
                JobState::Succeeded { file_id } => return Ok(file_id.clone()),
                JobState::Failed { status } => {
                    warn!(%task_id, %status, "video generation failed");
                    return Err(Error::VideoGenerationFailed {
                        task_id: task_id.0.clone(),
                        status: status.to_string(),
                    });
                }
                JobState::Submitted | JobState::InProgress { .. } => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(timed_out(&task_id, started));
            }

            let wake = (now + self.poll_interval).min(deadline);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(%task_id, "polling cancelled");
                    return Err(Error::Cancelled);
                }
                _ = sleep_until(wake) => {}
            }
            if wake >= deadline {
                return Err(timed_out(&task_id, started));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(%task_id, "status query cancelled");
                    return Err(Error::Cancelled);
                }
                _ = sleep_until(deadline) => {
                    return Err(timed_out(&task_id, started));
                }
                result = self.poll_once(job) => {
                    result?;
                }
            }
        }
    }

    /// Resolve the rendered file and download it into the video artifact
    ///
    /// Any failure is reported as [`Error::Retrieval`].
    pub async fn retrieve(&self, file_id: &FileId, store: &ArtifactStore) -> Result<VideoArtifact> {
        info!(%file_id, "downloading generated video");

        let url = self
            .video
            .resolve_download_url(file_id)
            .await
            .map_err(|e| retrieval_error(file_id, e))?;
        info!(download_url = %url, "video download link");
        self.event_tx
            .send(Event::VideoReady {
                download_url: url.clone(),
            })
            .ok();

        let stream = self
            .video
            .download(&url)
            .await
            .map_err(|e| retrieval_error(file_id, e))?;
        let artifact = store
            .write_video(stream)
            .await
            .map_err(|e| retrieval_error(file_id, e))?;

        info!(path = ?artifact.path, bytes = artifact.bytes, "video downloaded");
        self.event_tx
            .send(Event::VideoDownloaded {
                path: artifact.path.clone(),
                bytes: artifact.bytes,
            })
            .ok();
        Ok(artifact)
    }
}

fn timed_out(task_id: &TaskId, started: Instant) -> Error {
    let waited = started.elapsed();
    warn!(%task_id, waited_ms = waited.as_millis() as u64, "gave up waiting for video");
    Error::Timeout {
        task_id: task_id.0.clone(),
        waited,
    }
}

fn poll_error(task_id: &TaskId, e: Error) -> Error {
    match e {
        Error::Poll { .. } => e,
        other => Error::Poll {
            task_id: task_id.0.clone(),
            message: other.to_string(),
        },
    }
}

fn retrieval_error(file_id: &FileId, e: Error) -> Error {
    match e {
        Error::Retrieval { .. } => e,
        other => Error::Retrieval {
            file_id: file_id.0.clone(),
            message: other.to_string(),
        },
    }
}
