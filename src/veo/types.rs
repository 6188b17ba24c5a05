//! Wire types for the Veo long-running-operation API.

use serde::{Deserialize, Serialize};

/// Image input attached to a generation request.
#[derive(Debug, Clone, Serialize)]
pub struct VeoImagePayload {
    /// Base64-encoded image bytes; the API expects `bytesBase64Encoded`.
    #[serde(rename = "bytesBase64Encoded")]
    pub bytes_base64: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// One generation instance (prompt + first-frame image).
#[derive(Debug, Clone, Serialize)]
pub struct SubmitInstance {
    pub prompt: String,
    pub image: VeoImagePayload,
}

/// Generation parameters; optional fields are dropped entirely when the
/// request shape is degraded after a bad-request rejection.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitParameters {
    #[serde(rename = "aspectRatio")]
    pub aspect_ratio: String,
    #[serde(rename = "durationSeconds", skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl SubmitParameters {
    /// Full configuration: requested duration and resolution included.
    pub fn full(aspect_ratio: &str, duration_seconds: u32, resolution: &str) -> Self {
        Self {
            aspect_ratio: aspect_ratio.to_string(),
            duration_seconds: Some(duration_seconds),
            resolution: Some(resolution.to_string()),
        }
    }

    /// Minimal configuration: aspect ratio only.
    pub fn minimal(aspect_ratio: &str) -> Self {
        Self {
            aspect_ratio: aspect_ratio.to_string(),
            duration_seconds: None,
            resolution: None,
        }
    }
}

/// Body of the `:predictLongRunning` submission call.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitBody {
    pub instances: Vec<SubmitInstance>,
    pub parameters: SubmitParameters,
}

/// Initial response: just the name of the long-running operation.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationHandle {
    pub name: String,
}

/// Snapshot of a long-running operation from the status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<ApiError>,
    #[serde(default)]
    pub response: Option<OperationResponse>,
}

/// Error object the API nests in operation snapshots and 4xx bodies.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ApiError {
    /// Human-readable detail combining message and status.
    pub fn detail(&self) -> String {
        match (&self.message, &self.status) {
            (Some(message), Some(status)) => format!("{message} ({status})"),
            (Some(message), None) => message.clone(),
            (None, Some(status)) => status.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

/// Top-level shape of a non-2xx response body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationResponse {
    #[serde(rename = "generateVideoResponse", default)]
    pub generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateVideoResponse {
    #[serde(rename = "generatedSamples", default)]
    pub generated_samples: Vec<GeneratedSample>,
}

/// One generated video sample.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedSample {
    pub video: VideoRef,
}

/// Reference to a downloadable video asset.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoRef {
    pub uri: String,
}
