//! Shared helpers for the mock-provider integration tests

use async_trait::async_trait;
use serde_json::json;
use shortgen::{Config, Muxer, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SCRIPT: &str = "I fly without wings and cry without eyes. What am I? A cloud.";
pub const VOICE_ID: &str = "voice-it";

/// Config pointing every provider at `server`, working in `dir`
pub fn mock_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.keys.text_service_key = "sk-it".into();
    config.keys.speech_service_key = "xi-it".into();
    config.keys.video_service_key = "mm-it".into();
    config.script.base_url = server.uri();
    config.voice.base_url = server.uri();
    config.voice.voice_id = VOICE_ID.into();
    config.video.base_url = server.uri();
    config.video.poll_interval = Duration::from_millis(10);
    config.video.max_wait = Duration::from_secs(10);
    config.retry.initial_delay = Duration::from_millis(5);
    config.retry.max_delay = Duration::from_millis(20);
    config.retry.jitter = false;
    config.artifacts.work_dir = dir.to_path_buf();
    config
}

pub async fn mount_text(server: &MockServer, content: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-it"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_speech(server: &MockServer, audio: &[u8]) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{VOICE_ID}/stream")))
        .and(header("xi-api-key", "xi-it"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(audio.to_vec()))
        .mount(server)
        .await;
}

pub async fn mount_submit(server: &MockServer, task_id: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/video_generation"))
        .and(header("authorization", "Bearer mm-it"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "task_id": task_id,
            "base_resp": { "status_code": 0, "status_msg": "success" }
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// Answer status queries with `statuses` in order; the last one repeats
pub async fn mount_statuses(server: &MockServer, task_id: &str, statuses: &[(&str, &str)]) {
    for (i, (status, file_id)) in statuses.iter().enumerate() {
        let mock = Mock::given(method("GET"))
            .and(path("/v1/query/video_generation"))
            .and(query_param("task_id", task_id))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "task_id": task_id,
                "status": status,
                "file_id": file_id,
                "base_resp": { "status_code": 0, "status_msg": "success" }
            })));
        let mock = if i + 1 < statuses.len() {
            mock.up_to_n_times(1)
        } else {
            mock
        };
        mock.mount(server).await;
    }
}

pub async fn mount_retrieval(server: &MockServer, file_id: &str, video: &[u8]) {
    let download_url = format!("{}/cdn/{file_id}.mp4", server.uri());
    Mock::given(method("GET"))
        .and(path("/v1/files/retrieve"))
        .and(query_param("file_id", file_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "file": { "file_id": file_id, "download_url": download_url }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/cdn/{file_id}.mp4")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(video.to_vec()))
        .mount(server)
        .await;
}

/// Muxer that concatenates video and audio bytes instead of running ffmpeg
#[derive(Default)]
pub struct ConcatMuxer {
    calls: AtomicU32,
}

impl ConcatMuxer {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Muxer for ConcatMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut bytes = tokio::fs::read(video).await?;
        bytes.extend(tokio::fs::read(audio).await?);
        tokio::fs::write(output, bytes).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "concat"
    }
}
