//! Backend-agnostic generation facade.
//!
//! The caller picks a [`Provider`], builds a [`VideoGenerator`] from
//! configuration, and calls `generate_video`. Whichever backend runs, the
//! outcome is always a [`GenerationResult`]; no error crosses this boundary
//! as a panic or a propagated `Err`.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::kling::KlingClient;
use crate::progress::Progress;
use crate::prompt::PromptMode;
use crate::veo::VeoClient;

/// The generation backend to use for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Kling polling REST API.
    Kling,
    /// Veo long-running-operation API.
    Veo,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Kling => "kling",
            Provider::Veo => "veo",
        }
    }
}

/// Aspect ratios the backends accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AspectRatio {
    /// 16:9 landscape.
    #[value(name = "16:9")]
    Wide,
    /// 9:16 portrait.
    #[value(name = "9:16")]
    Tall,
    /// 1:1 square.
    #[value(name = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Wide => "16:9",
            AspectRatio::Tall => "9:16",
            AspectRatio::Square => "1:1",
        }
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        AspectRatio::Wide
    }
}

/// Per-request generation knobs shared by both backends.
///
/// `model = None` means each backend's own default model. Backends interpret
/// the rest on their own terms: Kling clamps `duration_secs` to its allowed
/// set and ignores `resolution`; Veo may drop duration and resolution
/// entirely when degrading a rejected request.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub model: Option<String>,
    pub duration_secs: u32,
    pub aspect_ratio: AspectRatio,
    pub resolution: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: None,
            duration_secs: 5,
            aspect_ratio: AspectRatio::default(),
            resolution: "720p".to_string(),
        }
    }
}

/// Terminal outcome of one generation request.
///
/// Produced exactly once per request and immutable after creation. On
/// failure, `message` carries enough provider-supplied detail (status code,
/// response body or nested error body) to diagnose without extra logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub success: bool,
    pub message: String,
    pub video_bytes: Option<Vec<u8>>,
}

impl GenerationResult {
    /// A successful outcome carrying the downloaded asset.
    pub fn ok(message: impl Into<String>, video_bytes: Vec<u8>) -> Self {
        Self {
            success: true,
            message: message.into(),
            video_bytes: Some(video_bytes),
        }
    }

    /// A failed outcome; `message` is the human-readable diagnosis.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            video_bytes: None,
        }
    }
}

/// A configured generation backend, selected at call time.
///
/// Modeled as a tagged union rather than trait objects: there are exactly two
/// backends and the caller picks one per request.
pub enum VideoGenerator {
    Kling(KlingClient),
    Veo(VeoClient),
}

impl VideoGenerator {
    /// Build a generator for `provider` from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the selected provider's credentials are
    /// absent from both the config file and the environment.
    pub fn from_config(provider: Provider, config: &Config) -> Result<Self, ConfigError> {
        match provider {
            Provider::Kling => {
                let (access_key, secret_key) = config.kling_credentials()?;
                let client = KlingClient::with_credentials(access_key, secret_key)
                    .map_err(|_| ConfigError::MissingKlingCredentials)?;
                Ok(VideoGenerator::Kling(client))
            }
            Provider::Veo => {
                let api_key = config.gemini_api_key()?;
                let client = VeoClient::with_api_key(api_key)
                    .map_err(|_| ConfigError::MissingGeminiApiKey)?;
                Ok(VideoGenerator::Veo(client))
            }
        }
    }

    /// Which backend this generator drives.
    pub fn provider(&self) -> Provider {
        match self {
            VideoGenerator::Kling(_) => Provider::Kling,
            VideoGenerator::Veo(_) => Provider::Veo,
        }
    }

    /// Generate a video clip from a photo.
    ///
    /// Blocks (as an awaited future) for the full duration of generation,
    /// which can run minutes. `progress` is invoked zero or more times with
    /// `(fraction, message)`; fractions are monotonically non-decreasing by
    /// convention. Always resolves to a [`GenerationResult`].
    pub async fn generate_video(
        &self,
        image: &[u8],
        prompt: &str,
        progress: &Progress<'_>,
        options: &GenerationOptions,
        mode: PromptMode,
    ) -> GenerationResult {
        log::info!(
            "starting {} generation (mode: {mode:?}, duration: {}s, aspect: {})",
            self.provider().as_str(),
            options.duration_secs,
            options.aspect_ratio.as_str(),
        );
        match self {
            VideoGenerator::Kling(client) => {
                client
                    .generate_video(image, prompt, progress, options, mode)
                    .await
            }
            VideoGenerator::Veo(client) => {
                client
                    .generate_video(image, prompt, progress, options, mode)
                    .await
            }
        }
    }
}
