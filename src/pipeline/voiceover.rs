//! Voiceover synthesis stage

use crate::artifacts::ArtifactStore;
use crate::error::Result;
use crate::services::SpeechService;
use crate::types::{Event, Script, VoiceTrack};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Turns narration text into an audio artifact
pub struct VoiceoverSynthesizer {
    speech: Arc<dyn SpeechService>,
    model_id: String,
    event_tx: broadcast::Sender<Event>,
}

impl VoiceoverSynthesizer {
    /// Create a synthesizer using `speech` with the given speech model
    pub fn new(
        speech: Arc<dyn SpeechService>,
        model_id: impl Into<String>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            speech,
            model_id: model_id.into(),
            event_tx,
        }
    }

    /// Synthesize `text` with `voice_id` into the voiceover artifact
    ///
    /// `text` is validated again here since it may come from outside the
    /// script stage; blank text fails with `Error::EmptyScript` before any
    /// provider call. The audio stream is consumed exactly once.
    pub async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        store: &ArtifactStore,
    ) -> Result<VoiceTrack> {
        let script = Script::new(text)?;

        info!(voice_id, service = self.speech.name(), "generating voiceover");
        self.event_tx
            .send(Event::SynthesizingVoiceover {
                script: script.as_str().to_string(),
            })
            .ok();

        let stream = self
            .speech
            .synthesize_stream(script.as_str(), voice_id, &self.model_id)
            .await?;
        let track = store.write_voice(stream).await?;

        info!(path = ?track.path, bytes = track.bytes, "voiceover generated");
        self.event_tx
            .send(Event::VoiceoverSynthesized {
                path: track.path.clone(),
                bytes: track.bytes,
            })
            .ok();
        Ok(track)
    }
}
