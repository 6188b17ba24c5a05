//! Kling backend integration.
//!
//! Talks to Kling's polling-based REST image-to-video API: sign a short-lived
//! bearer token, submit the job, poll the task until terminal, download the
//! asset.

mod client;
mod token;

pub use client::{
    clamp_duration, KlingClient, KlingError, ALLOWED_DURATIONS, DEFAULT_MODEL,
    KLING_API_BASE_URL, KNOWN_MODELS,
};
pub use token::{sign_bearer_token, Claims, TOKEN_NBF_SKEW_SECS, TOKEN_TTL_SECS};
