//! VeoClient - handles communication with the Veo long-running-operation API.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures_util::StreamExt;

use super::types::{
    ApiErrorBody, OperationHandle, OperationStatus, SubmitBody, SubmitInstance, SubmitParameters,
    VeoImagePayload,
};
use crate::config::GEMINI_API_KEY_ENV;
use crate::generator::{GenerationOptions, GenerationResult};
use crate::image::{validate_image, ImageError};
use crate::progress::Progress;
use crate::prompt::{build_prompt, PromptError, PromptMode, VEO_STYLE};

/// Default base URL for the Veo API.
pub const VEO_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for video generation.
pub const DEFAULT_MODEL: &str = "veo-3.1-fast-generate-preview";

/// Secondary model used on the last degraded submission attempt.
pub const FALLBACK_MODEL: &str = "veo-2.0-generate-001";

/// Model ids this client knows about; unknown requests fall back to
/// [`DEFAULT_MODEL`].
pub const KNOWN_MODELS: &[&str] = &[
    "veo-3.1-fast-generate-preview",
    "veo-3.0-generate-001",
    "veo-2.0-generate-001",
];

/// Default timeout for submit and status requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for asset downloads (120 seconds).
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Default polling interval for operation refreshes (10 seconds).
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Overall generation budget (300 seconds).
const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Resolve a requested model id against the known set.
///
/// Unrecognized ids fall back to [`DEFAULT_MODEL`] rather than failing, so a
/// stale saved selection still produces a video.
pub fn resolve_model(requested: Option<&str>) -> &'static str {
    match requested {
        Some(id) => match KNOWN_MODELS.iter().find(|known| **known == id) {
            Some(known) => known,
            None => {
                log::warn!("unknown Veo model '{id}', falling back to {DEFAULT_MODEL}");
                DEFAULT_MODEL
            }
        },
        None => DEFAULT_MODEL,
    }
}

/// Client for the Veo image-to-video API.
///
/// Submits a job to the `:predictLongRunning` endpoint, polls the returned
/// operation handle until it reports completion, and downloads the generated
/// asset. The API key is read-only after construction.
pub struct VeoClient {
    api_key: String,
    base_url: String,
    http_client: reqwest::Client,
    download_client: reqwest::Client,
    poll_interval: Duration,
    generation_timeout: Duration,
}

impl VeoClient {
    /// Create a new VeoClient by reading the API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns `VeoError::MissingApiKey` if `GEMINI_API_KEY` is not set.
    pub fn new() -> Result<Self, VeoError> {
        let api_key = std::env::var(GEMINI_API_KEY_ENV).map_err(|_| VeoError::MissingApiKey)?;
        Self::with_api_key(api_key)
    }

    /// Create a new VeoClient with an explicit API key.
    pub fn with_api_key(api_key: String) -> Result<Self, VeoError> {
        Self::with_base_url(api_key, VEO_API_BASE_URL.to_string())
    }

    /// Create a new VeoClient with a custom base URL.
    ///
    /// Useful for testing against a mock server.
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, VeoError> {
        if api_key.is_empty() {
            return Err(VeoError::MissingApiKey);
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
            api_key,
            base_url,
            http_client,
            download_client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        })
    }

    /// Override polling timing.
    ///
    /// Production defaults are a 10s refresh interval within a 300s budget;
    /// tests shrink these so mocked runs complete quickly. Terminal-state
    /// semantics are unchanged by this override.
    pub fn with_timing(mut self, poll_interval: Duration, generation_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.generation_timeout = generation_timeout;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Generate an image-to-video clip.
    ///
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
                log::error!("Veo generation failed: {e}");
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
    ) -> Result<Vec<u8>, VeoError> {
        progress.report(0.10, "Connecting to Veo...");

        let mime_type = validate_image(image)?;
        // Speech requires dialogue; an empty dance descriptor is replaced
        // with the default style inside the builder.
        let enhanced_prompt = build_prompt(mode, prompt, &VEO_STYLE)?;

        progress.report(0.30, "Submitting generation request...");
        let operation = self
            .submit_with_fallback(image, mime_type, &enhanced_prompt, options)
            .await?;
        log::info!("Veo operation started: {}", operation.name);

        progress.report(0.50, "Waiting for video generation... (about 1-3 minutes)");
        let status = self.poll_until_done(&operation.name, progress).await?;

        progress.report(0.90, "Processing result...");
        if let Some(error) = status.error {
            return Err(VeoError::OperationFailed(error.detail()));
        }
        let sample = status
            .response
            .and_then(|response| response.generate_video_response)
            .map(|inner| inner.generated_samples)
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or(VeoError::NoVideo)?;

        self.download(&sample.video.uri).await
    }

    /// Submit the job, degrading the request shape on bad-request rejections.
    ///
    /// Attempts, in order: full configuration on the resolved model, minimal
    /// configuration (aspect ratio only) on the resolved model, minimal
    /// configuration on [`FALLBACK_MODEL`]. Only a 400-class rejection
    /// advances to the next attempt; any other error aborts immediately.
    async fn submit_with_fallback(
        &self,
        image: &[u8],
        mime_type: &str,
        enhanced_prompt: &str,
        options: &GenerationOptions,
    ) -> Result<OperationHandle, VeoError> {
        let model = resolve_model(options.model.as_deref());
        let aspect_ratio = options.aspect_ratio.as_str();

        let image_payload = VeoImagePayload {
            bytes_base64: BASE64.encode(image),
            mime_type: mime_type.to_string(),
        };
        let make_body = |parameters: SubmitParameters| SubmitBody {
            instances: vec![SubmitInstance {
                prompt: enhanced_prompt.to_string(),
                image: image_payload.clone(),
            }],
            parameters,
        };

        let degraded_attempts: [(&str, SubmitParameters); 2] = [
            (
                model,
                SubmitParameters::full(aspect_ratio, options.duration_secs, &options.resolution),
            ),
            (model, SubmitParameters::minimal(aspect_ratio)),
        ];

        for (index, (attempt_model, parameters)) in degraded_attempts.into_iter().enumerate() {
            match self.submit_once(attempt_model, &make_body(parameters)).await {
                Ok(operation) => return Ok(operation),
                Err(e @ VeoError::BadRequest { .. }) => {
                    log::warn!(
                        "Veo rejected submission attempt {} ({e}), degrading request",
                        index + 1
                    );
                }
                Err(e) => return Err(e),
            }
        }

        // Last resort: minimal configuration on the fallback model. Whatever
        // this attempt returns, including a bad-request rejection, is final.
        self.submit_once(FALLBACK_MODEL, &make_body(SubmitParameters::minimal(aspect_ratio)))
            .await
    }

    async fn submit_once(
        &self,
        model: &str,
        body: &SubmitBody,
    ) -> Result<OperationHandle, VeoError> {
        let url = format!("{}/models/{}:predictLongRunning", self.base_url, model);
        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_submission_error(status.as_u16(), body_text));
        }

        Ok(response.json().await?)
    }

    /// Poll the operation until `done` or the overall budget elapses.
    async fn poll_until_done(
        &self,
        operation_name: &str,
        progress: &Progress<'_>,
    ) -> Result<OperationStatus, VeoError> {
        let url = format!("{}/{}", self.base_url, operation_name);
        let started = tokio::time::Instant::now();

        loop {
            if started.elapsed() > self.generation_timeout {
                return Err(VeoError::Timeout {
                    seconds: self.generation_timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .http_client
                .get(&url)
                .query(&[("key", self.api_key.as_str())])
                .send()
                .await?;
            let status_code = response.status();
            if !status_code.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(VeoError::Api {
                    status: status_code.as_u16(),
                    body,
                });
            }

            let status: OperationStatus = response.json().await?;
            progress.report(
                0.60,
                &format!("Generating... ({}s elapsed)", started.elapsed().as_secs()),
            );
            if status.done {
                return Ok(status);
            }
            log::debug!("operation {operation_name} still running");
        }
    }

    /// Download the generated asset and normalize it to raw bytes.
    async fn download(&self, uri: &str) -> Result<Vec<u8>, VeoError> {
        let response = self
            .download_client
            .get(uri)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VeoError::DownloadFailed {
                status: status.as_u16(),
                body,
            });
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk?);
        }

        if bytes.is_empty() {
            return Err(VeoError::EmptyDownload);
        }
        Ok(bytes)
    }
}

/// Classify a non-2xx submission response.
///
/// HTTP 400, or an error body carrying an `INVALID_ARGUMENT` / 400 signature,
/// is a bad-request rejection eligible for the degraded-config retry; all
/// other statuses abort the fallback chain.
fn classify_submission_error(status: u16, body: String) -> VeoError {
    let nested = serde_json::from_str::<ApiErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.error);

    let bad_request_signature = status == 400
        || nested.as_ref().is_some_and(|e| {
            e.code == Some(400)
                || e.status
                    .as_deref()
                    .is_some_and(|s| s.contains("INVALID_ARGUMENT"))
        });

    let detail = nested.map(|e| e.detail()).unwrap_or_else(|| body.clone());

    if bad_request_signature {
        VeoError::BadRequest { status, detail }
    } else {
        VeoError::Api { status, body }
    }
}

/// Errors that can occur during Veo operations.
#[derive(Debug, thiserror::Error)]
pub enum VeoError {
    #[error("Gemini API key not configured")]
    MissingApiKey,

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Veo rejected the request ({status}): {detail}")]
    BadRequest { status: u16, detail: String },

    #[error("Veo API request failed ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Veo operation failed: {0}")]
    OperationFailed(String),

    #[error("video generation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("generation finished but no video was returned")]
    NoVideo,

    #[error("video download failed ({status}): {body}")]
    DownloadFailed { status: u16, body: String },

    #[error("downloaded video was empty")]
    EmptyDownload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_api_key_creates_client() {
        let client = VeoClient::with_api_key("test-key".to_string()).unwrap();
        assert_eq!(client.base_url(), VEO_API_BASE_URL);
    }

    #[test]
    fn test_with_api_key_empty_returns_error() {
        let result = VeoClient::with_api_key("".to_string());
        assert!(matches!(result, Err(VeoError::MissingApiKey)));
    }

    #[test]
    fn test_with_base_url_overrides_default() {
        let client =
            VeoClient::with_base_url("k".to_string(), "http://127.0.0.1:9".to_string()).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:9");
    }

    #[test]
    fn test_resolve_model_known_id_passes_through() {
        assert_eq!(resolve_model(Some("veo-3.0-generate-001")), "veo-3.0-generate-001");
        assert_eq!(resolve_model(Some("veo-2.0-generate-001")), FALLBACK_MODEL);
    }

    #[test]
    fn test_resolve_model_unknown_id_falls_back() {
        assert_eq!(resolve_model(Some("veo-99-imaginary")), DEFAULT_MODEL);
    }

    #[test]
    fn test_resolve_model_none_uses_default() {
        assert_eq!(resolve_model(None), DEFAULT_MODEL);
    }

    #[test]
    fn test_catalog_contains_default_and_fallback() {
        assert!(KNOWN_MODELS.contains(&DEFAULT_MODEL));
        assert!(KNOWN_MODELS.contains(&FALLBACK_MODEL));
    }

    #[test]
    fn test_classify_http_400_as_bad_request() {
        let err = classify_submission_error(400, "plain rejection".to_string());
        assert!(matches!(err, VeoError::BadRequest { status: 400, .. }));
    }

    #[test]
    fn test_classify_invalid_argument_signature_as_bad_request() {
        let body = r#"{"error": {"code": 400, "message": "durationSeconds is not supported",
                        "status": "INVALID_ARGUMENT"}}"#;
        let err = classify_submission_error(422, body.to_string());
        match err {
            VeoError::BadRequest { status, detail } => {
                assert_eq!(status, 422);
                assert!(detail.contains("durationSeconds is not supported"));
                assert!(detail.contains("INVALID_ARGUMENT"));
            }
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_other_statuses_as_api_error() {
        let err = classify_submission_error(503, "try later".to_string());
        assert!(matches!(err, VeoError::Api { status: 503, .. }));
    }

    #[test]
    fn test_classify_extracts_nested_detail() {
        let body = r#"{"error": {"message": "image too large"}}"#;
        let err = classify_submission_error(400, body.to_string());
        match err {
            VeoError::BadRequest { detail, .. } => assert_eq!(detail, "image too large"),
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn test_timeout_error_mentions_timed_out() {
        let err = VeoError::Timeout { seconds: 300 };
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("300"));
    }

    #[test]
    fn test_no_video_error_message() {
        assert_eq!(
            VeoError::NoVideo.to_string(),
            "generation finished but no video was returned"
        );
    }
}
