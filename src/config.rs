//! Configuration types for shortgen
//!
//! A [`Config`] is built once at startup (usually via [`Config::from_env`]) and
//! passed by reference into every component constructor.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Environment variable holding the text-generation API key
pub const TEXT_SERVICE_KEY: &str = "TEXT_SERVICE_KEY";
/// Environment variable holding the speech-synthesis API key
pub const SPEECH_SERVICE_KEY: &str = "SPEECH_SERVICE_KEY";
/// Environment variable holding the video-generation API key
pub const VIDEO_SERVICE_KEY: &str = "VIDEO_SERVICE_KEY";

// Provider-named fallbacks, checked when the generic names are unset
const TEXT_SERVICE_KEY_FALLBACK: &str = "OPENAI_API_KEY";
const SPEECH_SERVICE_KEY_FALLBACK: &str = "ELEVENLABS_API_KEY";
const VIDEO_SERVICE_KEY_FALLBACK: &str = "MINIMAX_API_KEY";

/// API keys for the three external providers
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ServiceKeys {
    /// Bearer token for the text-generation service
    #[serde(default)]
    pub text_service_key: String,

    /// API key for the speech-synthesis service
    #[serde(default)]
    pub speech_service_key: String,

    /// Bearer token for the video-generation service
    #[serde(default)]
    pub video_service_key: String,
}

// Keys never show up in logs or panics
impl std::fmt::Debug for ServiceKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceKeys")
            .field("text_service_key", &redact(&self.text_service_key))
            .field("speech_service_key", &redact(&self.speech_service_key))
            .field("video_service_key", &redact(&self.video_service_key))
            .finish()
    }
}

fn redact(key: &str) -> &'static str {
    if key.is_empty() { "<unset>" } else { "<redacted>" }
}

/// Script generation settings (text service)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Base URL of the chat completion API (default: "https://api.openai.com")
    #[serde(default = "default_text_base_url")]
    pub base_url: String,

    /// Model used for the completion (default: "gpt-3.5-turbo")
    #[serde(default = "default_text_model")]
    pub model: String,

    /// Output token cap, roughly sized for a short narration (default: 175)
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Prompt template; `{topic}` is replaced with the operator's topic
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            base_url: default_text_base_url(),
            model: default_text_model(),
            max_output_tokens: default_max_output_tokens(),
            prompt_template: default_prompt_template(),
        }
    }
}

/// Voiceover settings (speech service)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Base URL of the speech API (default: "https://api.elevenlabs.io")
    #[serde(default = "default_speech_base_url")]
    pub base_url: String,

    /// Voice used for narration
    #[serde(default = "default_voice_id")]
    pub voice_id: String,

    /// Speech model (default: "eleven_multilingual_v2")
    #[serde(default = "default_speech_model")]
    pub model_id: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_speech_base_url(),
            voice_id: default_voice_id(),
            model_id: default_speech_model(),
        }
    }
}

/// Video generation settings (video service and polling policy)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Base URL of the video API (default: "https://api.minimaxi.chat")
    #[serde(default = "default_video_base_url")]
    pub base_url: String,

    /// Video model (default: "video-01")
    #[serde(default = "default_video_model")]
    pub model: String,

    /// Fixed delay before each status poll (default: 10 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Maximum time to wait for a terminal status before failing with a timeout
    /// (default: 30 minutes)
    #[serde(default = "default_max_wait", with = "duration_serde")]
    pub max_wait: Duration,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            base_url: default_video_base_url(),
            model: default_video_model(),
            poll_interval: default_poll_interval(),
            max_wait: default_max_wait(),
        }
    }
}

/// Muxing settings (external ffmpeg)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MuxConfig {
    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for ffmpeg if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Output video codec (default: "libx264")
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Output audio codec (default: "aac")
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Output frame rate (default: 24)
    #[serde(default = "default_fps")]
    pub fps: u32,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            search_path: true,
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            fps: default_fps(),
        }
    }
}

/// Working files and final output locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Directory for transient artifacts and the final output (default: ".")
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Final muxed video, relative to `work_dir` unless absolute (default: "final_video.mp4")
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// Transient script text file name (default: "youtube_script.txt")
    #[serde(default = "default_script_file")]
    pub script_file: String,

    /// Transient voiceover file name (default: "voiceover.mp3")
    #[serde(default = "default_voice_file")]
    pub voice_file: String,

    /// Transient downloaded video file name (default: "generated_video.mp4")
    #[serde(default = "default_video_file")]
    pub video_file: String,

    /// Place transient files in a per-run subdirectory of `work_dir` (default: false)
    ///
    /// With the default fixed file names two overlapping runs in the same
    /// directory overwrite each other's working files.
    #[serde(default)]
    pub namespace_by_job: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            output_file: default_output_file(),
            script_file: default_script_file(),
            voice_file: default_voice_file(),
            video_file: default_video_file(),
            namespace_by_job: false,
        }
    }
}

/// HTTP client timeouts shared by all providers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout (default: 120 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// TCP connect timeout (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl HttpConfig {
    /// Build a reqwest client honouring these timeouts
    pub fn build_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .build()?)
    }
}

/// Retry configuration for transient provider failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// How the script/voiceover branch and the video branch are scheduled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Script + voiceover run concurrently with video submission and polling (default)
    #[default]
    Concurrent,
    /// Script, voiceover, then video, one after another
    Sequential,
}

/// Main configuration for a pipeline run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Provider API keys
    #[serde(default)]
    pub keys: ServiceKeys,

    /// Script generation settings
    #[serde(default)]
    pub script: ScriptConfig,

    /// Voiceover settings
    #[serde(default)]
    pub voice: VoiceConfig,

    /// Video generation and polling settings
    #[serde(default)]
    pub video: VideoConfig,

    /// Muxing settings
    #[serde(default)]
    pub mux: MuxConfig,

    /// Working file locations
    #[serde(default)]
    pub artifacts: ArtifactConfig,

    /// HTTP timeouts
    #[serde(default)]
    pub http: HttpConfig,

    /// Retry policy for transient provider errors
    #[serde(default)]
    pub retry: RetryConfig,

    /// Stage scheduling
    #[serde(default)]
    pub mode: PipelineMode,
}

impl Config {
    /// Build a configuration from the process environment
    ///
    /// Loads a `.env` file from the working directory if present, then reads
    /// `TEXT_SERVICE_KEY`, `SPEECH_SERVICE_KEY` and `VIDEO_SERVICE_KEY`. The
    /// provider-named variables `OPENAI_API_KEY`, `ELEVENLABS_API_KEY` and
    /// `MINIMAX_API_KEY` are used when the generic names are unset.
    ///
    /// All other settings take their defaults.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let keys = ServiceKeys {
            text_service_key: read_key(TEXT_SERVICE_KEY, TEXT_SERVICE_KEY_FALLBACK)?,
            speech_service_key: read_key(SPEECH_SERVICE_KEY, SPEECH_SERVICE_KEY_FALLBACK)?,
            video_service_key: read_key(VIDEO_SERVICE_KEY, VIDEO_SERVICE_KEY_FALLBACK)?,
        };

        Ok(Self {
            keys,
            ..Default::default()
        })
    }

    /// Check settings that would otherwise fail deep inside a run
    pub fn validate(&self) -> Result<()> {
        if !self.script.prompt_template.contains("{topic}") {
            return Err(Error::config(
                "prompt template must contain a {topic} placeholder",
                "script.prompt_template",
            ));
        }
        if self.script.max_output_tokens == 0 {
            return Err(Error::config(
                "max_output_tokens must be greater than zero",
                "script.max_output_tokens",
            ));
        }
        if self.video.max_wait.is_zero() {
            return Err(Error::config(
                "max_wait must be greater than zero",
                "video.max_wait",
            ));
        }
        if self.video.max_wait < self.video.poll_interval {
            return Err(Error::config(
                format!(
                    "max_wait ({}ms) is shorter than poll_interval ({}ms), the task would never be polled",
                    self.video.max_wait.as_millis(),
                    self.video.poll_interval.as_millis()
                ),
                "video.max_wait",
            ));
        }
        if self.mux.fps == 0 {
            return Err(Error::config("fps must be greater than zero", "mux.fps"));
        }
        Ok(())
    }

    /// Final output path, resolved against the working directory
    pub fn output_path(&self) -> PathBuf {
        if self.artifacts.output_file.is_absolute() {
            self.artifacts.output_file.clone()
        } else {
            self.artifacts.work_dir.join(&self.artifacts.output_file)
        }
    }
}

fn read_key(primary: &str, fallback: &str) -> Result<String> {
    std::env::var(primary)
        .or_else(|_| std::env::var(fallback))
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::config(format!("{primary} not set in environment"), primary))
}

fn default_true() -> bool {
    true
}

fn default_text_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_text_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_output_tokens() -> u32 {
    175
}

fn default_prompt_template() -> String {
    "Generate a 10 to 12-second engaging YouTube Shorts riddle script based on the topic \
     '{topic}', keep the tone as per the topic provided. Keep it short and attractive. \
     Note: the riddle must contain a tricky brain teaser question also."
        .to_string()
}

fn default_speech_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}

fn default_voice_id() -> String {
    "JBFqnCBsd6RMkjVDRZzb".to_string()
}

fn default_speech_model() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_video_base_url() -> String {
    "https://api.minimaxi.chat".to_string()
}

fn default_video_model() -> String {
    "video-01".to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_max_wait() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_fps() -> u32 {
    24
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_output_file() -> PathBuf {
    PathBuf::from("final_video.mp4")
}

fn default_script_file() -> String {
    "youtube_script.txt".to_string()
}

fn default_voice_file() -> String {
    "voiceover.mp3".to_string()
}

fn default_video_file() -> String {
    "generated_video.mp4".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
