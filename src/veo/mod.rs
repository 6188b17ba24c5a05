//! Veo backend integration.
//!
//! Talks to the Veo long-running-operation API: validate the image, submit
//! with graceful request-shape fallback on rejection, poll the operation
//! handle, download the generated asset.

mod client;
mod types;

pub use client::{
    resolve_model, VeoClient, VeoError, DEFAULT_MODEL, FALLBACK_MODEL, KNOWN_MODELS,
    VEO_API_BASE_URL,
};
pub use types::{
    ApiError, ApiErrorBody, GeneratedSample, GenerateVideoResponse, OperationHandle,
    OperationResponse, OperationStatus, SubmitBody, SubmitInstance, SubmitParameters,
    VeoImagePayload, VideoRef,
};
