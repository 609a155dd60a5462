//! Pipeline stages and the driver that sequences them.
//!
//! - [`script`] - Narration text generation
//! - [`voiceover`] - Speech synthesis into the voiceover artifact
//! - [`video_job`] - Video task submission, polling and retrieval
//! - [`mux`] - Combining video and voiceover, transient cleanup
//! - [`driver`] - Stage sequencing, cancellation and failure reporting

mod driver;
pub mod mux;
mod script;
mod video_job;
mod voiceover;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use driver::Pipeline;
pub use mux::{FfmpegMuxer, Muxer, UnavailableMuxer};
pub use script::ScriptGenerator;
pub use video_job::VideoJobManager;
pub use voiceover::VoiceoverSynthesizer;
