//! MiniMax video generation service

use super::traits::{ByteStream, VideoService};
use super::{check_status, endpoint};
use crate::config::{Config, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::{FileId, StatusReport, TaskId, VideoStatus};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;

/// Video service backed by the MiniMax video generation API
///
/// Submission is never retried (it is not idempotent). Status queries,
/// download URL lookups and downloads retry transient failures.
pub struct MinimaxVideoService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
}

#[derive(Deserialize)]
struct BaseResp {
    #[serde(default)]
    status_code: i64,
    #[serde(default)]
    status_msg: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    task_id: String,
    #[serde(default)]
    base_resp: Option<BaseResp>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
}

#[derive(Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    file: Option<FileInfo>,
}

#[derive(Deserialize)]
struct FileInfo {
    #[serde(default)]
    download_url: String,
}

impl MinimaxVideoService {
    /// Create a client from the video settings and key in `config`
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: config.http.build_client()?,
            base_url: config.video.base_url.clone(),
            api_key: config.keys.video_service_key.clone(),
            retry: config.retry.clone(),
        })
    }

    /// Authenticated GET returning a decoded JSON body, retried on transient errors
    async fn get_json<T>(&self, path: &str, query: (&str, &str)) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = endpoint(&self.base_url, path);
        let url = url.as_str();
        let client = &self.client;
        let api_key = self.api_key.as_str();

        with_retry(&self.retry, move || async move {
            let response = client
                .get(url)
                .bearer_auth(api_key)
                .query(&[query])
                .send()
                .await?;
            let response = check_status("video", response).await?;
            Ok(response.json::<T>().await?)
        })
        .await
    }
}

#[async_trait]
impl VideoService for MinimaxVideoService {
    async fn submit(&self, prompt: &str, model: &str) -> Result<TaskId> {
        let response = self
            .client
            .post(endpoint(&self.base_url, "v1/video_generation"))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "prompt": prompt, "model": model }))
            .send()
            .await
            .map_err(|e| Error::Submission(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Submission(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| Error::Submission(format!("invalid response: {e}")))?;

        // The API reports some rejections (quota, content policy) inside a 200
        match body.base_resp {
            Some(base) if base.status_code != 0 => {
                return Err(Error::Submission(format!(
                    "provider status {}: {}",
                    base.status_code, base.status_msg
                )));
            }
            _ => {}
        }

        if body.task_id.is_empty() {
            return Err(Error::Submission("response contained no task_id".to_string()));
        }
        Ok(TaskId(body.task_id))
    }

    async fn query_status(&self, task_id: &TaskId) -> Result<StatusReport> {
        let body: QueryResponse = self
            .get_json("v1/query/video_generation", ("task_id", &task_id.0))
            .await
            .map_err(|e| Error::Poll {
                task_id: task_id.0.clone(),
                message: e.to_string(),
            })?;

        // A missing status is reported as Unknown, which fails the job
        let status = VideoStatus::from_provider(body.status.as_deref().unwrap_or("Unknown"));
        Ok(StatusReport {
            status,
            file_id: body.file_id.filter(|f| !f.is_empty()).map(FileId),
        })
    }

    async fn resolve_download_url(&self, file_id: &FileId) -> Result<String> {
        let retrieval_error = |message: String| Error::Retrieval {
            file_id: file_id.0.clone(),
            message,
        };

        let body: RetrieveResponse = self
            .get_json("v1/files/retrieve", ("file_id", &file_id.0))
            .await
            .map_err(|e| retrieval_error(e.to_string()))?;

        body.file
            .map(|f| f.download_url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| retrieval_error("response contained no download_url".to_string()))
    }

    async fn download(&self, url: &str) -> Result<ByteStream> {
        let client = &self.client;
        let response = with_retry(&self.retry, move || async move {
            let response = client.get(url).send().await?;
            check_status("video", response).await
        })
        .await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(Error::from))
            .boxed())
    }

    fn name(&self) -> &'static str {
        "minimax"
    }
}
