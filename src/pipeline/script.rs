//! Script generation stage

use crate::artifacts::ArtifactStore;
use crate::error::{Error, Result};
use crate::services::TextService;
use crate::types::{Event, Prompt, Script, Topic};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Turns a topic prompt into narration text
pub struct ScriptGenerator {
    text: Arc<dyn TextService>,
    max_output_tokens: u32,
    event_tx: broadcast::Sender<Event>,
}

impl ScriptGenerator {
    /// Create a generator using `text` for completions
    pub fn new(
        text: Arc<dyn TextService>,
        max_output_tokens: u32,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            text,
            max_output_tokens,
            event_tx,
        }
    }

    /// Generate the narration and save it to the script artifact
    ///
    /// An empty or whitespace-only completion fails with [`Error::EmptyScript`]
    /// and is not retried. The script is written before returning so a later
    /// failure can be diagnosed from it.
    pub async fn generate(
        &self,
        topic: &Topic,
        prompt: &Prompt,
        store: &ArtifactStore,
    ) -> Result<Script> {
        if prompt.is_blank() {
            return Err(Error::config("prompt must not be empty", "prompt"));
        }

        debug!(%topic, service = self.text.name(), "requesting script");
        let text = self
            .text
            .complete(prompt.as_str(), self.max_output_tokens)
            .await?;
        let script = Script::new(text)?;

        let path = store.write_script(&script).await?;
        info!(?path, chars = script.as_str().len(), "new script generated and saved");
        self.event_tx
            .send(Event::ScriptGenerated {
                path,
                chars: script.as_str().chars().count(),
            })
            .ok();

        Ok(script)
    }
}
