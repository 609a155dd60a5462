//! Shared test helpers: in-memory providers, a fake muxer and temp stores.

use crate::artifacts::ArtifactStore;
use crate::config::{ArtifactConfig, Config, RetryConfig, ServiceKeys};
use crate::error::{Error, Result};
use crate::pipeline::Muxer;
use crate::services::{ByteStream, SpeechService, TextService, VideoService};
use crate::types::{FileId, RunId, StatusReport, TaskId, VideoStatus};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Helper to create a prepared artifact store in a fresh temp directory.
/// Returns the tempdir (which must be kept alive) and the store.
pub(crate) async fn temp_store() -> (TempDir, ArtifactStore) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = ArtifactConfig {
        work_dir: temp_dir.path().to_path_buf(),
        ..Default::default()
    };
    let store = ArtifactStore::new(
        &config,
        &RunId("test-run".into()),
        temp_dir.path().join("final_video.mp4"),
    );
    store.prepare().await.unwrap();
    (temp_dir, store)
}

/// Config rooted in `dir` with dummy keys, millisecond polling and fast retries
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config {
        keys: ServiceKeys {
            text_service_key: "text-key".into(),
            speech_service_key: "speech-key".into(),
            video_service_key: "video-key".into(),
        },
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        ..Default::default()
    };
    config.video.poll_interval = Duration::from_millis(5);
    config.video.max_wait = Duration::from_secs(5);
    config.artifacts.work_dir = dir.to_path_buf();
    config
}

fn provider_error(service: &'static str, status: u16) -> Error {
    Error::Provider {
        service,
        status: Some(status),
        message: "injected failure".into(),
    }
}

fn chunk_stream(chunks: Vec<Vec<u8>>) -> ByteStream {
    futures::stream::iter(chunks.into_iter().map(Ok)).boxed()
}

/// Text service answering every prompt with the same completion
pub(crate) struct FakeText {
    reply: std::result::Result<String, u16>,
    prompts: Mutex<Vec<String>>,
    max_tokens: Mutex<Option<u32>>,
}

impl FakeText {
    pub(crate) fn returning(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            prompts: Mutex::new(Vec::new()),
            max_tokens: Mutex::new(None),
        }
    }

    pub(crate) fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            ..Self::returning("")
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub(crate) fn max_tokens_seen(&self) -> Option<u32> {
        *self.max_tokens.lock().unwrap()
    }
}

#[async_trait]
impl TextService for FakeText {
    async fn complete(&self, prompt: &str, max_output_tokens: u32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        *self.max_tokens.lock().unwrap() = Some(max_output_tokens);
        self.reply
            .clone()
            .map_err(|status| provider_error("text", status))
    }

    fn name(&self) -> &'static str {
        "fake-text"
    }
}

/// Arguments of one speech synthesis request
#[derive(Clone, Debug)]
pub(crate) struct SpeechCall {
    pub(crate) text: String,
    pub(crate) voice_id: String,
    pub(crate) model_id: String,
}

/// Speech service streaming fixed chunks
pub(crate) struct FakeSpeech {
    chunks: std::result::Result<Vec<Vec<u8>>, u16>,
    delay: Duration,
    calls: Mutex<Vec<SpeechCall>>,
}

impl FakeSpeech {
    pub(crate) fn with_chunks(chunks: &[&[u8]]) -> Self {
        Self {
            chunks: Ok(chunks.iter().map(|c| c.to_vec()).collect()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(status: u16) -> Self {
        Self {
            chunks: Err(status),
            ..Self::with_chunks(&[])
        }
    }

    /// Wait `delay` before answering
    pub(crate) fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> Vec<SpeechCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechService for FakeSpeech {
    async fn synthesize_stream(
        &self,
        text: &str,
        voice_id: &str,
        model_id: &str,
    ) -> Result<ByteStream> {
        self.calls.lock().unwrap().push(SpeechCall {
            text: text.to_string(),
            voice_id: voice_id.to_string(),
            model_id: model_id.to_string(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.chunks {
            Ok(chunks) => Ok(chunk_stream(chunks.clone())),
            Err(status) => Err(provider_error("speech", *status)),
        }
    }

    fn name(&self) -> &'static str {
        "fake-speech"
    }
}

/// Video service replaying a scripted sequence of status answers
///
/// Once the script runs out the last answer repeats.
pub(crate) struct FakeVideo {
    task_id: String,
    submit_error: Option<u16>,
    resolve_fails: bool,
    query_delay: Duration,
    statuses: Mutex<VecDeque<StatusReport>>,
    last: Mutex<Option<StatusReport>>,
    video: Vec<Vec<u8>>,
    submits: AtomicU32,
    polls: AtomicU32,
    resolves: AtomicU32,
    downloads: AtomicU32,
}

impl FakeVideo {
    pub(crate) fn new(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            submit_error: None,
            resolve_fails: false,
            query_delay: Duration::ZERO,
            statuses: Mutex::new(VecDeque::new()),
            last: Mutex::new(None),
            video: vec![b"mp4-".to_vec(), b"frames".to_vec()],
            submits: AtomicU32::new(0),
            polls: AtomicU32::new(0),
            resolves: AtomicU32::new(0),
            downloads: AtomicU32::new(0),
        }
    }

    /// Status answers in order, each with an optional file id
    pub(crate) fn statuses(self, answers: &[(&str, Option<&str>)]) -> Self {
        {
            let mut queue = self.statuses.lock().unwrap();
            for (status, file_id) in answers {
                queue.push_back(StatusReport {
                    status: VideoStatus::from_provider(status),
                    file_id: file_id.map(|f| FileId(f.to_string())),
                });
            }
        }
        self
    }

    /// Answer `status` on every poll
    pub(crate) fn forever(self, status: &str) -> Self {
        self.statuses(&[(status, None)])
    }

    pub(crate) fn submit_fails(mut self, status: u16) -> Self {
        self.submit_error = Some(status);
        self
    }

    /// Each status query takes `delay` to answer
    pub(crate) fn slow_queries(mut self, delay: Duration) -> Self {
        self.query_delay = delay;
        self
    }

    pub(crate) fn resolve_fails(mut self) -> Self {
        self.resolve_fails = true;
        self
    }

    pub(crate) fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }

    pub(crate) fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub(crate) fn resolves(&self) -> u32 {
        self.resolves.load(Ordering::SeqCst)
    }

    pub(crate) fn downloads(&self) -> u32 {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoService for FakeVideo {
    async fn submit(&self, _prompt: &str, _model: &str) -> Result<TaskId> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        match self.submit_error {
            Some(status) => Err(Error::Submission(format!("{status}: rejected"))),
            None => Ok(TaskId(self.task_id.clone())),
        }
    }

    async fn query_status(&self, _task_id: &TaskId) -> Result<StatusReport> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if !self.query_delay.is_zero() {
            tokio::time::sleep(self.query_delay).await;
        }
        let next = self.statuses.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(report) = next {
            *last = Some(report);
        }
        Ok(last.clone().unwrap_or(StatusReport {
            status: VideoStatus::Processing,
            file_id: None,
        }))
    }

    async fn resolve_download_url(&self, file_id: &FileId) -> Result<String> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        if self.resolve_fails {
            return Err(provider_error("video", 404));
        }
        Ok(format!("https://cdn.test/{}.mp4", file_id.0))
    }

    async fn download(&self, _url: &str) -> Result<ByteStream> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(chunk_stream(self.video.clone()))
    }

    fn name(&self) -> &'static str {
        "fake-video"
    }
}

enum MuxBehaviour {
    Concatenate,
    Fail,
    Silent,
}

/// Muxer that never spawns a process
pub(crate) struct FakeMuxer {
    behaviour: MuxBehaviour,
    calls: AtomicU32,
}

impl FakeMuxer {
    /// Writes video bytes followed by audio bytes to the output
    pub(crate) fn succeeding() -> Self {
        Self::with(MuxBehaviour::Concatenate)
    }

    pub(crate) fn failing() -> Self {
        Self::with(MuxBehaviour::Fail)
    }

    /// Reports success without writing anything
    pub(crate) fn silent() -> Self {
        Self::with(MuxBehaviour::Silent)
    }

    fn with(behaviour: MuxBehaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Muxer for FakeMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            MuxBehaviour::Concatenate => {
                let mut bytes = tokio::fs::read(video).await?;
                bytes.extend(tokio::fs::read(audio).await?);
                tokio::fs::write(output, bytes).await?;
                Ok(())
            }
            MuxBehaviour::Fail => Err(Error::Mux("ffmpeg exited with status 1".into())),
            MuxBehaviour::Silent => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "fake-mux"
    }
}
