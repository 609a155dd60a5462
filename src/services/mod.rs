//! External collaborators: text, speech and video generation providers
//!
//! The pipeline only talks to the traits in [`traits`]; the HTTP clients in
//! this module are the production implementations.

mod elevenlabs;
mod minimax;
mod openai;
pub mod traits;

pub use elevenlabs::ElevenLabsSpeechService;
pub use minimax::MinimaxVideoService;
pub use openai::OpenAiTextService;
pub use traits::{ByteStream, SpeechService, TextService, VideoService};

use crate::error::{Error, Result};

/// Turn a non-success response into [`Error::Provider`], keeping the body for diagnosis
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Provider {
        service,
        status: Some(status.as_u16()),
        message: if body.is_empty() {
            status.canonical_reason().unwrap_or("unexpected status").to_string()
        } else {
            body
        },
    })
}

/// Join a configured base URL and an API path without doubling slashes
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
