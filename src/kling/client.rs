//! KlingClient - handles communication with the Kling video generation API.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::token::sign_bearer_token;
use crate::config::{KLING_ACCESS_KEY_ENV, KLING_SECRET_KEY_ENV};
use crate::generator::{GenerationOptions, GenerationResult};
use crate::progress::Progress;
use crate::prompt::{build_prompt, PromptError, PromptMode, KLING_STYLE};

/// Default base URL for the Kling API.
pub const KLING_API_BASE_URL: &str = "https://api.klingai.com/v1";

/// Default model for image-to-video generation.
pub const DEFAULT_MODEL: &str = "kling-v2-6";

/// Model ids this client knows about.
pub const KNOWN_MODELS: &[&str] = &["kling-v2-6", "kling-video-o1"];

/// Durations (seconds) the API accepts; anything else is clamped to the first.
pub const ALLOWED_DURATIONS: &[u32] = &[5, 10];

/// Default timeout for submit and status requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for asset downloads (120 seconds).
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Default polling interval for status checks (10 seconds).
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default maximum number of status polls (60 polls = 10-minute ceiling).
const DEFAULT_MAX_POLLS: u32 = 60;

/// Number of download attempts before giving up.
const DOWNLOAD_RETRIES: u32 = 3;

/// Default delay between download attempts (3 seconds).
const DEFAULT_DOWNLOAD_RETRY_DELAY: Duration = Duration::from_secs(3);

/// A 200 download body at or under this size is treated as not-yet-ready.
const MIN_VIDEO_BYTES: usize = 10240;

/// Progress cap while the generation poll loop runs.
const GENERATING_PROGRESS_CAP: f32 = 0.75;

/// Clamp a requested duration to the nearest allowed value.
///
/// Members of [`ALLOWED_DURATIONS`] pass through unchanged; anything else
/// silently becomes the first allowed value.
pub fn clamp_duration(duration: u32) -> u32 {
    if ALLOWED_DURATIONS.contains(&duration) {
        duration
    } else {
        ALLOWED_DURATIONS[0]
    }
}

/// Request body for image-to-video submission.
#[derive(Debug, Serialize)]
struct SubmitRequest {
    /// Model id, e.g. `kling-v2-6`.
    model_name: String,
    /// Base64-encoded image payload.
    image: String,
    /// Fully-built instruction text.
    prompt: String,
    /// Clip duration in seconds; the API wants it stringified.
    duration: String,
    aspect_ratio: String,
    /// Fixed quality mode.
    mode: String,
    enable_audio: bool,
}

/// Envelope around every Kling response body.
#[derive(Debug, Deserialize)]
struct SubmitEnvelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<SubmitData>,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    #[serde(default)]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PollEnvelope {
    #[serde(default)]
    data: Option<PollData>,
}

/// Task state reported by the status endpoint.
#[derive(Debug, Default, Deserialize)]
struct PollData {
    #[serde(default)]
    task_status: String,
    #[serde(default)]
    task_status_msg: Option<String>,
    #[serde(default)]
    task_result: Option<TaskResult>,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    #[serde(default)]
    videos: Vec<VideoAsset>,
}

#[derive(Debug, Deserialize)]
struct VideoAsset {
    #[serde(default)]
    url: Option<String>,
}

/// Client for the Kling image-to-video API.
///
/// Holds the credential pair used to sign per-request bearer tokens; the
/// credentials are read-only after construction and the client can be reused
/// across sequential generation calls.
pub struct KlingClient {
    access_key: String,
    secret_key: String,
    base_url: String,
    http_client: reqwest::Client,
    download_client: reqwest::Client,
    poll_interval: Duration,
    max_polls: u32,
    download_retry_delay: Duration,
}

impl KlingClient {
    /// Create a new KlingClient by reading the key pair from the environment.
    ///
    /// # Errors
    ///
    /// Returns `KlingError::MissingCredentials` if `KLING_ACCESS_KEY` or
    /// `KLING_SECRET_KEY` is not set.
    pub fn new() -> Result<Self, KlingError> {
        let access_key =
            std::env::var(KLING_ACCESS_KEY_ENV).map_err(|_| KlingError::MissingCredentials)?;
        let secret_key =
            std::env::var(KLING_SECRET_KEY_ENV).map_err(|_| KlingError::MissingCredentials)?;
        Self::with_credentials(access_key, secret_key)
    }

    /// Create a new KlingClient with an explicit key pair.
    pub fn with_credentials(access_key: String, secret_key: String) -> Result<Self, KlingError> {
        Self::with_base_url(access_key, secret_key, KLING_API_BASE_URL.to_string())
    }

    /// Create a new KlingClient with a custom base URL.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(
        access_key: String,
        secret_key: String,
        base_url: String,
    ) -> Result<Self, KlingError> {
        if access_key.is_empty() || secret_key.is_empty() {
            return Err(KlingError::MissingCredentials);
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;
        let download_client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            access_key,
            secret_key,
            base_url,
            http_client,
            download_client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
            download_retry_delay: DEFAULT_DOWNLOAD_RETRY_DELAY,
        })
    }

    /// Override polling and retry timing.
    ///
    /// Production defaults are a 10s poll interval with a 60-poll budget and
    /// a 3s delay between download attempts; tests shrink these so mocked
    /// runs complete quickly. The attempt budget and terminal-state semantics
    /// are unchanged by this override.
    pub fn with_timing(
        mut self,
        poll_interval: Duration,
        max_polls: u32,
        download_retry_delay: Duration,
    ) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls;
        self.download_retry_delay = download_retry_delay;
        self
    }

    /// Get the access key.
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate an image-to-video clip.
    ///
    /// Synchronous from the caller's point of view: the future resolves only
    /// once generation reaches a terminal state (minutes, in production).
    /// Never fails past this boundary; every error becomes a
    /// `GenerationResult` with `success = false` and a diagnosable message.
    pub async fn generate_video(
        &self,
        image: &[u8],
        prompt: &str,
        progress: &Progress<'_>,
        options: &GenerationOptions,
        mode: PromptMode,
    ) -> GenerationResult {
        match self.run(image, prompt, progress, options, mode).await {
            Ok(bytes) => {
                progress.report(1.0, "Done!");
                GenerationResult::ok("video generated successfully", bytes)
            }
            Err(e) => {
                log::error!("Kling generation failed: {e}");
                GenerationResult::failure(e.to_string())
            }
        }
    }

    async fn run(
        &self,
        image: &[u8],
        prompt: &str,
        progress: &Progress<'_>,
        options: &GenerationOptions,
        mode: PromptMode,
    ) -> Result<Vec<u8>, KlingError> {
        progress.report(0.05, "Connecting to Kling...");

        // Kling rejects an empty prompt in every mode, unlike Veo which
        // substitutes a default descriptor for dance.
        let user_prompt = prompt.trim();
        if user_prompt.is_empty() {
            return Err(KlingError::EmptyPrompt);
        }
        if image.is_empty() {
            return Err(KlingError::EmptyImage);
        }

        let enhanced_prompt = build_prompt(mode, user_prompt, &KLING_STYLE)?;
        let task_id = self
            .submit(image, &enhanced_prompt, options, progress)
            .await?;
        log::info!("Kling task submitted, task_id: {task_id}");

        progress.report(0.15, "Generating video... (usually 2-5 minutes)");
        let final_state = self.poll_until_terminal(&task_id, progress).await?;

        progress.report(0.80, "Generation complete, downloading video...");
        let video_url = Self::extract_video_url(final_state)?;
        log::info!("Kling video ready at {video_url}");

        self.download(&video_url, progress).await
    }

    /// Submit the generation job and return the backend-assigned task id.
    async fn submit(
        &self,
        image: &[u8],
        enhanced_prompt: &str,
        options: &GenerationOptions,
        progress: &Progress<'_>,
    ) -> Result<String, KlingError> {
        progress.report(0.10, "Submitting generation request...");

        let model = options
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let duration = clamp_duration(options.duration_secs);

        let request_body = SubmitRequest {
            model_name: model,
            image: BASE64.encode(image),
            prompt: enhanced_prompt.to_string(),
            duration: duration.to_string(),
            aspect_ratio: options.aspect_ratio.as_str().to_string(),
            mode: "pro".to_string(),
            enable_audio: true,
        };

        let token = sign_bearer_token(&self.access_key, &self.secret_key)?;
        let response = self
            .http_client
            .post(format!("{}/videos/image2video", self.base_url))
            .bearer_auth(token)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(KlingError::Api { status, body });
        }

        let envelope: SubmitEnvelope = response.json().await?;
        if envelope.code != 0 {
            return Err(KlingError::Rejected {
                code: envelope.code,
                message: envelope
                    .message
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        envelope
            .data
            .and_then(|data| data.task_id)
            .ok_or(KlingError::MissingTaskId)
    }

    /// Poll the task until it succeeds, fails, or the attempt budget runs out.
    ///
    /// Transport failures, non-200 responses, and unparseable bodies during
    /// polling are treated as transient and retried on the next interval.
    async fn poll_until_terminal(
        &self,
        task_id: &str,
        progress: &Progress<'_>,
    ) -> Result<PollData, KlingError> {
        let url = format!("{}/videos/image2video/{}", self.base_url, task_id);

        for poll_count in 1..=self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let token = sign_bearer_token(&self.access_key, &self.secret_key)?;
            let response = match self.http_client.get(&url).bearer_auth(token).send().await {
                Ok(response) => response,
                Err(e) => {
                    log::warn!("status poll {poll_count} failed (transient): {e}");
                    continue;
                }
            };
            if !response.status().is_success() {
                log::warn!(
                    "status poll {poll_count} returned {} (transient)",
                    response.status()
                );
                continue;
            }
            let envelope: PollEnvelope = match response.json().await {
                Ok(envelope) => envelope,
                Err(e) => {
                    // Intentionally not terminal: the task keeps running
                    // server-side, so a garbled body is retried on the next
                    // interval like any other transient poll failure.
                    log::warn!("status poll {poll_count} body unparseable (transient): {e}");
                    continue;
                }
            };
            let data = envelope.data.unwrap_or_default();

            let elapsed_secs = u64::from(poll_count) * self.poll_interval.as_secs();
            let fraction =
                (0.15 + poll_count as f32 * 0.03).min(GENERATING_PROGRESS_CAP);
            progress.report(fraction, &format!("Generating... ({elapsed_secs}s elapsed)"));

            match data.task_status.as_str() {
                "succeed" => return Ok(data),
                "failed" => {
                    return Err(KlingError::GenerationFailed(
                        data.task_status_msg
                            .unwrap_or_else(|| "unknown error".to_string()),
                    ));
                }
                status => log::debug!("task {task_id} status: {status}"),
            }
        }

        Err(KlingError::Timeout {
            polls: self.max_polls,
        })
    }

    /// Extract the first asset URL from a succeeded task's result.
    fn extract_video_url(state: PollData) -> Result<String, KlingError> {
        let asset = state
            .task_result
            .and_then(|result| result.videos.into_iter().next())
            .ok_or(KlingError::MissingVideo)?;
        asset.url.ok_or(KlingError::MissingVideoUrl)
    }

    /// Download the generated asset, retrying while the CDN warms up.
    ///
    /// The asset URL is pre-signed, so this GET carries no bearer token. A
    /// successful response at or under [`MIN_VIDEO_BYTES`] means the file is
    /// not fully materialized yet and is retried after a short delay.
    async fn download(
        &self,
        video_url: &str,
        progress: &Progress<'_>,
    ) -> Result<Vec<u8>, KlingError> {
        let mut last_status: Option<u16> = None;

        for attempt in 0..DOWNLOAD_RETRIES {
            progress.report(
                0.85 + attempt as f32 * 0.05,
                &format!("Downloading video... ({}/{})", attempt + 1, DOWNLOAD_RETRIES),
            );

            match self.download_client.get(video_url).send().await {
                Ok(response) => {
                    let status = response.status();
                    last_status = Some(status.as_u16());
                    if status.is_success() {
                        let bytes = response.bytes().await?;
                        if bytes.len() > MIN_VIDEO_BYTES {
                            return Ok(bytes.to_vec());
                        }
                        log::warn!(
                            "downloaded asset is only {} bytes, retrying",
                            bytes.len()
                        );
                    }
                }
                Err(e) => {
                    log::warn!("video download attempt {} failed: {e}", attempt + 1);
                    last_status = None;
                }
            }

            tokio::time::sleep(self.download_retry_delay).await;
        }

        Err(KlingError::Download {
            attempts: DOWNLOAD_RETRIES,
            last_status,
        })
    }
}

/// Errors that can occur during Kling operations.
#[derive(Debug, thiserror::Error)]
pub enum KlingError {
    #[error("Kling credentials not configured")]
    MissingCredentials,

    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("image payload is empty")]
    EmptyImage,

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("failed to sign bearer token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Kling API request failed ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Kling API error (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Kling response did not include a task id")]
    MissingTaskId,

    #[error("video generation failed: {0}")]
    GenerationFailed(String),

    #[error("video generation timed out after {polls} status checks")]
    Timeout { polls: u32 },

    #[error("no video was found in the completed task result")]
    MissingVideo,

    #[error("generated video entry has no download URL")]
    MissingVideoUrl,

    #[error("video download failed after {attempts} attempts (last status: {last_status:?})")]
    Download {
        attempts: u32,
        last_status: Option<u16>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_credentials_creates_client() {
        let client =
            KlingClient::with_credentials("ak".to_string(), "sk".to_string()).unwrap();
        assert_eq!(client.access_key(), "ak");
        assert_eq!(client.base_url(), KLING_API_BASE_URL);
    }

    #[test]
    fn test_with_credentials_empty_access_key_fails() {
        let result = KlingClient::with_credentials("".to_string(), "sk".to_string());
        assert!(matches!(result, Err(KlingError::MissingCredentials)));
    }

    #[test]
    fn test_with_credentials_empty_secret_key_fails() {
        let result = KlingClient::with_credentials("ak".to_string(), "".to_string());
        assert!(matches!(result, Err(KlingError::MissingCredentials)));
    }

    #[test]
    fn test_with_base_url_overrides_default() {
        let client = KlingClient::with_base_url(
            "ak".to_string(),
            "sk".to_string(),
            "http://127.0.0.1:9".to_string(),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
    }

    #[test]
    fn test_default_model_is_in_catalog() {
        assert!(KNOWN_MODELS.contains(&DEFAULT_MODEL));
    }

    #[test]
    fn test_clamp_duration_allows_members() {
        assert_eq!(clamp_duration(5), 5);
        assert_eq!(clamp_duration(10), 10);
    }

    #[test]
    fn test_clamp_duration_snaps_non_members_to_first() {
        assert_eq!(clamp_duration(7), 5);
        assert_eq!(clamp_duration(0), 5);
        assert_eq!(clamp_duration(999), 5);
    }

    #[test]
    fn test_submit_request_serialization() {
        let request = SubmitRequest {
            model_name: "kling-v2-6".to_string(),
            image: "aGVsbG8=".to_string(),
            prompt: "a dog".to_string(),
            duration: "5".to_string(),
            aspect_ratio: "16:9".to_string(),
            mode: "pro".to_string(),
            enable_audio: true,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model_name"], "kling-v2-6");
        assert_eq!(json["duration"], "5");
        assert_eq!(json["mode"], "pro");
        assert_eq!(json["enable_audio"], true);
    }

    #[test]
    fn test_submit_envelope_success_deserialization() {
        let json = r#"{"code": 0, "message": "ok", "data": {"task_id": "task-1"}}"#;
        let envelope: SubmitEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.code, 0);
        assert_eq!(envelope.data.unwrap().task_id.as_deref(), Some("task-1"));
    }

    #[test]
    fn test_submit_envelope_tolerates_missing_fields() {
        let envelope: SubmitEnvelope = serde_json::from_str("{}").unwrap();
        assert_eq!(envelope.code, 0);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_poll_envelope_succeed_deserialization() {
        let json = r#"{
            "code": 0,
            "data": {
                "task_status": "succeed",
                "task_result": {"videos": [{"url": "https://cdn.example/video.mp4"}]}
            }
        }"#;
        let envelope: PollEnvelope = serde_json::from_str(json).unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data.task_status, "succeed");
        let url = data.task_result.unwrap().videos[0].url.clone();
        assert_eq!(url.as_deref(), Some("https://cdn.example/video.mp4"));
    }

    #[test]
    fn test_poll_envelope_failed_carries_message() {
        let json = r#"{"data": {"task_status": "failed", "task_status_msg": "content blocked"}}"#;
        let envelope: PollEnvelope = serde_json::from_str(json).unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data.task_status, "failed");
        assert_eq!(data.task_status_msg.as_deref(), Some("content blocked"));
    }

    #[test]
    fn test_extract_video_url_missing_result_block() {
        let state = PollData {
            task_status: "succeed".to_string(),
            task_status_msg: None,
            task_result: None,
        };
        assert!(matches!(
            KlingClient::extract_video_url(state),
            Err(KlingError::MissingVideo)
        ));
    }

    #[test]
    fn test_extract_video_url_empty_video_list() {
        let state = PollData {
            task_status: "succeed".to_string(),
            task_status_msg: None,
            task_result: Some(TaskResult { videos: vec![] }),
        };
        assert!(matches!(
            KlingClient::extract_video_url(state),
            Err(KlingError::MissingVideo)
        ));
    }

    #[test]
    fn test_extract_video_url_entry_without_url() {
        let state = PollData {
            task_status: "succeed".to_string(),
            task_status_msg: None,
            task_result: Some(TaskResult {
                videos: vec![VideoAsset { url: None }],
            }),
        };
        assert!(matches!(
            KlingClient::extract_video_url(state),
            Err(KlingError::MissingVideoUrl)
        ));
    }

    #[test]
    fn test_error_display_includes_provider_detail() {
        let err = KlingError::Api {
            status: 500,
            body: "internal error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Kling API request failed (500): internal error"
        );

        let err = KlingError::Rejected {
            code: 1201,
            message: "invalid image".to_string(),
        };
        assert!(err.to_string().contains("1201"));
        assert!(err.to_string().contains("invalid image"));
    }

    #[test]
    fn test_timeout_error_mentions_timed_out() {
        let err = KlingError::Timeout { polls: 60 };
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("60"));
    }
}
