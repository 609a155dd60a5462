//! Muxing stage: attach the voiceover to the rendered video

use crate::artifacts::ArtifactStore;
use crate::config::MuxConfig;
use crate::error::{Error, Result};
use crate::types::{Event, FinalArtifact, VideoArtifact, VoiceTrack};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Combines a video file and an audio file into one output file
#[async_trait]
pub trait Muxer: Send + Sync {
    /// Replace the audio of `video` with `audio`, writing `output`
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;

    /// Whether this muxer can run at all (checked before any stage runs)
    fn is_available(&self) -> bool {
        true
    }

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Muxer that shells out to an `ffmpeg` binary
///
/// Re-encodes video with a fixed codec and frame rate and maps the first
/// video stream of the input video with the first audio stream of the voiceover.
/// The output keeps the video's duration whatever the narration length.
pub struct FfmpegMuxer {
    binary_path: PathBuf,
    video_codec: String,
    audio_codec: String,
    fps: u32,
}

impl FfmpegMuxer {
    /// Create a muxer with an explicit ffmpeg path
    pub fn new(binary_path: PathBuf, config: &MuxConfig) -> Self {
        Self {
            binary_path,
            video_codec: config.video_codec.clone(),
            audio_codec: config.audio_codec.clone(),
            fps: config.fps,
        }
    }

    /// Use the configured ffmpeg path, or search PATH if allowed
    ///
    /// Returns `None` if no binary can be found.
    pub fn from_config(config: &MuxConfig) -> Option<Self> {
        let binary = match &config.ffmpeg_path {
            Some(path) => Some(path.clone()),
            None if config.search_path => which::which("ffmpeg").ok(),
            None => None,
        };
        binary.map(|path| Self::new(path, config))
    }

    /// Arguments passed to ffmpeg for one mux
    fn args(&self, video: &Path, audio: &Path, output: &Path) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = Vec::new();
        for a in ["-y", "-hide_banner", "-loglevel", "error", "-i"] {
            args.push(a.into());
        }
        args.push(video.into());
        args.push("-i".into());
        args.push(audio.into());
        for a in ["-map", "0:v:0", "-map", "1:a:0", "-c:v"] {
            args.push(a.into());
        }
        args.push(self.video_codec.clone().into());
        args.push("-r".into());
        args.push(self.fps.to_string().into());
        args.push("-c:a".into());
        args.push(self.audio_codec.clone().into());
        // The clip sets the length: pad short narration with silence, cut long narration
        for a in ["-af", "apad", "-shortest"] {
            args.push(a.into());
        }
        args.push(output.into());
        args
    }
}

#[async_trait]
impl Muxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let output_result = Command::new(&self.binary_path)
            .args(self.args(video, audio, output))
            .output()
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to execute ffmpeg: {}", e)))?;

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(Error::Mux(format!(
                "ffmpeg exited with {}: {}",
                output_result.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Muxer used when no ffmpeg binary is available
///
/// Reported as unavailable so the run fails during setup, before any provider
/// is paid for work that cannot be assembled.
pub struct UnavailableMuxer;

#[async_trait]
impl Muxer for UnavailableMuxer {
    async fn mux(&self, _video: &Path, _audio: &Path, _output: &Path) -> Result<()> {
        Err(Error::ExternalTool(
            "muxing requires an ffmpeg binary. \
             Configure mux.ffmpeg_path or ensure ffmpeg is in PATH."
                .into(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// Execute the mux stage
///
/// On success the three transient artifacts are deleted. On failure nothing
/// is deleted so the inputs can be inspected.
pub(crate) async fn run_mux_stage(
    muxer: &dyn Muxer,
    video: &VideoArtifact,
    voice: &VoiceTrack,
    store: &ArtifactStore,
    event_tx: &broadcast::Sender<Event>,
) -> Result<FinalArtifact> {
    let output = store.output_path().to_path_buf();
    info!(muxer = muxer.name(), ?output, "merging video and audio");

    muxer.mux(&video.path, &voice.path, &output).await.map_err(|e| match e {
        Error::Mux(_) | Error::ExternalTool(_) => e,
        other => Error::Mux(other.to_string()),
    })?;

    if tokio::fs::metadata(&output).await.is_err() {
        return Err(Error::Mux(format!(
            "{} reported success but {} was not written",
            muxer.name(),
            output.display()
        )));
    }

    info!(?output, "final video saved");
    event_tx.send(Event::Muxed { path: output.clone() }).ok();

    let removed = store.cleanup().await;
    debug!(removed, "transient artifacts cleaned up");
    event_tx.send(Event::CleanupComplete { removed }).ok();

    Ok(FinalArtifact { path: output })
}
