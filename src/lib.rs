//! # shortgen
//!
//! Turns a topic into a short narrated video by orchestrating three hosted
//! generation services and a local muxer.
//!
//! ## Pipeline
//!
//! 1. A text service writes a short riddle-style narration for the topic.
//! 2. A speech service streams the narration as an MP3 voiceover.
//! 3. A video service renders a clip from the same prompt; the task is
//!    submitted, polled until terminal, then downloaded.
//! 4. ffmpeg combines the clip and the voiceover, and the intermediate files
//!    are removed.
//!
//! Steps 2 and 3 run concurrently by default. Any failure aborts the run and
//! is reported as a [`Failure`] carrying the stage and an exit code.
//!
//! ## Quick Start
//!
//! ```no_run
//! use shortgen::{Config, Pipeline, Topic};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let pipeline = Pipeline::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let outcome = pipeline.run_to_outcome(&Topic::new("octopuses")?).await;
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Transient working files
pub mod artifacts;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Pipeline stages and driver
pub mod pipeline;
/// Retry logic with exponential backoff
pub mod retry;
/// Text, speech and video provider clients
pub mod services;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use artifacts::ArtifactStore;
pub use config::{Config, PipelineMode};
pub use error::{Error, Failure, PipelineStage, Result, StageError, ToExitCode};
pub use pipeline::{FfmpegMuxer, Muxer, Pipeline, UnavailableMuxer};
pub use services::{ByteStream, SpeechService, TextService, VideoService};
pub use types::{Event, FinalArtifact, PipelineOutcome, Topic, VideoStatus};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives a termination signal
///
/// Spawn this next to a run; the pipeline stops at its next cancellation
/// check and reports exit code 130.
///
/// Listens for Ctrl+C everywhere and for SIGTERM on Unix.
///
/// # Example
///
/// ```no_run
/// use shortgen::{Config, Pipeline, Topic, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pipeline = Pipeline::new(Config::from_env()?)?;
///     tokio::spawn(cancel_on_signal(pipeline.cancellation_token()));
///
///     let outcome = pipeline.run_to_outcome(&Topic::new("glaciers")?).await;
///     std::process::exit(outcome.exit_code());
/// }
/// ```
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::warn!("cancelling pipeline run");
            token.cancel();
        }
        // run finished first; nothing to do
        _ = token.cancelled() => {}
    }
}

/// Resolves on SIGTERM or Ctrl+C
///
/// A listener that cannot be installed never resolves, so a broken signal
/// setup leaves the run alone instead of cancelling it.
async fn wait_for_signal() {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM listener unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C listener unavailable");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = terminate => tracing::info!(signal = "SIGTERM", "termination requested"),
        _ = interrupt => tracing::info!(signal = "SIGINT", "termination requested"),
    }
}
