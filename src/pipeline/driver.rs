//! Pipeline driver: sequences the stages and turns failures into outcomes

use super::mux::{Muxer, UnavailableMuxer, run_mux_stage};
use super::{FfmpegMuxer, ScriptGenerator, VideoJobManager, VoiceoverSynthesizer};
use crate::artifacts::ArtifactStore;
use crate::config::{Config, PipelineMode};
use crate::error::{Error, InStage, PipelineStage, Result, StageError};
use crate::services::{
    ElevenLabsSpeechService, MinimaxVideoService, OpenAiTextService, SpeechService, TextService,
    VideoService,
};
use crate::types::{
    Event, FinalArtifact, PipelineOutcome, Prompt, RunId, Topic, VideoArtifact, VoiceTrack,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

type StageResult<T> = std::result::Result<T, StageError>;

/// One configured pipeline: collaborators, event channel and cancellation
///
/// Handles exactly one job per [`Pipeline::run`] call.
pub struct Pipeline {
    config: Arc<Config>,
    text: Arc<dyn TextService>,
    speech: Arc<dyn SpeechService>,
    video: Arc<dyn VideoService>,
    muxer: Arc<dyn Muxer>,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Build a pipeline with the production HTTP providers and ffmpeg
    pub fn new(config: Config) -> Result<Self> {
        let text = Arc::new(OpenAiTextService::new(&config)?);
        let speech = Arc::new(ElevenLabsSpeechService::new(&config)?);
        let video = Arc::new(MinimaxVideoService::new(&config)?);
        let muxer: Arc<dyn Muxer> = match FfmpegMuxer::from_config(&config.mux) {
            Some(muxer) => Arc::new(muxer),
            None => Arc::new(UnavailableMuxer),
        };
        Ok(Self::with_services(config, text, speech, video, muxer))
    }

    /// Build a pipeline from explicit collaborators
    pub fn with_services(
        config: Config,
        text: Arc<dyn TextService>,
        speech: Arc<dyn SpeechService>,
        video: Arc<dyn VideoService>,
        muxer: Arc<dyn Muxer>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            config: Arc::new(config),
            text,
            speech,
            video,
            muxer,
            event_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that aborts the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the pipeline and report a structured outcome
    ///
    /// Emits [`Event::Completed`] or [`Event::Failed`] before returning.
    pub async fn run_to_outcome(&self, topic: &Topic) -> PipelineOutcome {
        let result = self.run(topic).await;
        let outcome = PipelineOutcome::from(&result);
        match &outcome {
            PipelineOutcome::Succeeded { output } => {
                self.event_tx
                    .send(Event::Completed {
                        path: output.clone(),
                    })
                    .ok();
            }
            PipelineOutcome::Failed(failure) => {
                debug!(stage = %failure.stage, code = %failure.code, "{}", failure.message);
                self.event_tx
                    .send(Event::Failed {
                        failure: failure.clone(),
                    })
                    .ok();
            }
        }
        outcome
    }

    /// Run every stage for `topic`
    ///
    /// 1. Build the prompt and generate the script (no video task is submitted
    ///    if this fails).
    /// 2. Synthesize the voiceover and run the video task (submit, poll,
    ///    retrieve), concurrently or one after the other depending on
    ///    [`PipelineMode`].
    /// 3. Mux, then delete the transient artifacts.
    ///
    /// Every failure is fatal and aborts the remaining stages.
    pub async fn run(&self, topic: &Topic) -> StageResult<FinalArtifact> {
        self.config.validate().in_stage(PipelineStage::Setup)?;
        if !self.muxer.is_available() {
            return Err(StageError::new(
                PipelineStage::Setup,
                Error::ExternalTool(format!("muxer '{}' is not available", self.muxer.name())),
            ));
        }

        let prompt = Prompt::from_topic(topic, &self.config.script.prompt_template);
        let run_id = RunId::generate();
        let store = ArtifactStore::new(&self.config.artifacts, &run_id, self.config.output_path());
        store.prepare().await.in_stage(PipelineStage::Setup)?;
        info!(%run_id, %topic, mode = ?self.config.mode, dir = ?store.dir(), "starting pipeline");

        let generator = ScriptGenerator::new(
            self.text.clone(),
            self.config.script.max_output_tokens,
            self.event_tx.clone(),
        );
        let script = cancellable(&self.cancel, generator.generate(topic, &prompt, &store))
            .await
            .in_stage(PipelineStage::Script)?;

        let (voice, video) = match self.config.mode {
            PipelineMode::Sequential => {
                let voice = self.voice_branch(script.as_str(), &store, &self.cancel).await?;
                let video = self.video_branch(&prompt, &store, &self.cancel).await?;
                (voice, video)
            }
            PipelineMode::Concurrent => {
                let branch_cancel = self.cancel.child_token();
                let voice_fut = async {
                    let result = self.voice_branch(script.as_str(), &store, &branch_cancel).await;
                    if result.is_err() {
                        // stop paying for a video that can no longer be used
                        branch_cancel.cancel();
                    }
                    result
                };
                let video_fut = self.video_branch(&prompt, &store, &branch_cancel);

                // Both branches run to completion so a video failure still
                // leaves a finished voiceover on disk.
                let (voice, video) = tokio::join!(voice_fut, video_fut);
                (voice?, video?)
            }
        };

        ensure_not_cancelled(&self.cancel).in_stage(PipelineStage::Mux)?;
        let artifact = run_mux_stage(self.muxer.as_ref(), &video, &voice, &store, &self.event_tx)
            .await
            .in_stage(PipelineStage::Mux)?;

        info!(path = ?artifact.path, "video generation complete");
        Ok(artifact)
    }

    async fn voice_branch(
        &self,
        script: &str,
        store: &ArtifactStore,
        cancel: &CancellationToken,
    ) -> StageResult<VoiceTrack> {
        let synthesizer = VoiceoverSynthesizer::new(
            self.speech.clone(),
            self.config.voice.model_id.clone(),
            self.event_tx.clone(),
        );
        cancellable(
            cancel,
            synthesizer.synthesize(script, &self.config.voice.voice_id, store),
        )
        .await
        .in_stage(PipelineStage::Voiceover)
    }

    async fn video_branch(
        &self,
        prompt: &Prompt,
        store: &ArtifactStore,
        cancel: &CancellationToken,
    ) -> StageResult<VideoArtifact> {
        let manager =
            VideoJobManager::new(self.video.clone(), &self.config.video, self.event_tx.clone());

        let mut job = cancellable(cancel, manager.submit(prompt))
            .await
            .in_stage(PipelineStage::VideoSubmission)?;
        let file_id = manager
            .wait_for_completion(&mut job, cancel)
            .await
            .in_stage(PipelineStage::VideoGeneration)?;
        cancellable(cancel, manager.retrieve(&file_id, store))
            .await
            .in_stage(PipelineStage::VideoGeneration)
    }
}

/// Race `fut` against cancellation
async fn cancellable<T>(cancel: &CancellationToken, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}
