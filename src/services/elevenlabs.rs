//! Streaming text-to-speech service

use super::traits::{ByteStream, SpeechService};
use super::{check_status, endpoint};
use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;

/// Speech service backed by the ElevenLabs streaming endpoint
///
/// Only the request that opens the stream is retried; once audio starts
/// flowing the stream is consumed exactly once.
pub struct ElevenLabsSpeechService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

impl ElevenLabsSpeechService {
    /// Create a client from the voice settings and key in `config`
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: config.http.build_client()?,
            base_url: config.voice.base_url.clone(),
            api_key: config.keys.speech_service_key.clone(),
            retry: config.retry.clone(),
        })
    }
}

#[async_trait]
impl SpeechService for ElevenLabsSpeechService {
    async fn synthesize_stream(
        &self,
        text: &str,
        voice_id: &str,
        model_id: &str,
    ) -> Result<ByteStream> {
        let url = endpoint(&self.base_url, &format!("v1/text-to-speech/{voice_id}/stream"));
        let client = &self.client;
        let api_key = self.api_key.as_str();
        let url = url.as_str();
        let request = SpeechRequest { text, model_id };
        let request = &request;

        let response = with_retry(&self.retry, move || async move {
            let response = client
                .post(url)
                .header("xi-api-key", api_key)
                .header(reqwest::header::ACCEPT, "audio/mpeg")
                .json(request)
                .send()
                .await?;
            check_status("speech", response).await
        })
        .await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(Error::from))
            .boxed())
    }

    fn name(&self) -> &'static str {
        "elevenlabs"
    }
}
