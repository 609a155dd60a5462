//! Transient working files for a pipeline run
//!
//! Script text, voiceover audio and the downloaded video live here between
//! stages. They are removed only after a successful mux; a failed run leaves
//! them in place for inspection.

use crate::config::ArtifactConfig;
use crate::error::{Error, Result};
use crate::services::ByteStream;
use crate::types::{RunId, Script, VideoArtifact, VoiceTrack};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Paths and file operations for one run's artifacts
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    namespaced: bool,
    script_path: PathBuf,
    voice_path: PathBuf,
    video_path: PathBuf,
    output_path: PathBuf,
}

impl ArtifactStore {
    /// Lay out paths for a run
    ///
    /// `output_path` is where the final video goes; it is never touched by cleanup.
    pub fn new(config: &ArtifactConfig, run_id: &RunId, output_path: PathBuf) -> Self {
        let dir = if config.namespace_by_job {
            config.work_dir.join(&run_id.0)
        } else {
            config.work_dir.clone()
        };
        Self {
            script_path: dir.join(&config.script_file),
            voice_path: dir.join(&config.voice_file),
            video_path: dir.join(&config.video_file),
            namespaced: config.namespace_by_job,
            dir,
            output_path,
        }
    }

    /// Create the working directory (and the output's parent) if missing
    pub async fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Directory holding the transient files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Transient script text file
    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// Transient voiceover audio file
    pub fn voice_path(&self) -> &Path {
        &self.voice_path
    }

    /// Transient downloaded video file
    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    /// Final muxed output
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// The three transient files, in creation order
    pub fn transient_paths(&self) -> [&Path; 3] {
        [&self.script_path, &self.voice_path, &self.video_path]
    }

    /// Persist the narration as UTF-8 text
    pub async fn write_script(&self, script: &Script) -> Result<PathBuf> {
        fs::write(&self.script_path, script.as_str()).await?;
        debug!(path = ?self.script_path, "saved script");
        Ok(self.script_path.clone())
    }

    /// Concatenate an audio stream into the voiceover file
    pub async fn write_voice(&self, stream: ByteStream) -> Result<VoiceTrack> {
        let bytes = write_stream(&self.voice_path, stream).await?;
        Ok(VoiceTrack {
            path: self.voice_path.clone(),
            bytes,
        })
    }

    /// Write a downloaded video stream to the transient video file
    pub async fn write_video(&self, stream: ByteStream) -> Result<VideoArtifact> {
        let bytes = write_stream(&self.video_path, stream).await?;
        Ok(VideoArtifact {
            path: self.video_path.clone(),
            bytes,
        })
    }

    /// Remove the transient files
    ///
    /// Files that are already gone are skipped. Other deletion failures are
    /// logged but do not fail the run, the final video already exists.
    /// Returns the number of files removed.
    pub async fn cleanup(&self) -> usize {
        let mut removed = 0;
        for path in self.transient_paths() {
            match fs::remove_file(path).await {
                Ok(()) => {
                    debug!(?path, "deleted transient file");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(?path, "transient file already gone");
                }
                Err(e) => {
                    warn!(?path, error = %e, "failed to delete transient file");
                }
            }
        }

        // Only a per-run directory is ours to remove, and only when empty
        if self.namespaced && !self.output_path.starts_with(&self.dir) {
            if let Err(e) = fs::remove_dir(&self.dir).await {
                debug!(dir = ?self.dir, error = %e, "kept run directory");
            }
        }

        info!(removed, "temporary files deleted");
        removed
    }
}

/// Stream chunks into `path`, returning the byte count
///
/// A failing chunk aborts the write; the partial file stays for inspection.
async fn write_stream(path: &Path, mut stream: ByteStream) -> Result<u64> {
    let mut file = fs::File::create(path).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    if written == 0 {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("no data received for {}", path.display()),
        )));
    }
    debug!(?path, bytes = written, "wrote stream to disk");
    Ok(written)
}
