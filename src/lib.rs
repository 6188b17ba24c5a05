//! dogclip library crate.
//!
//! Turns a photo of a dog into a short video clip (spoken dialogue or dance)
//! through one of two remote generation backends, behind a single
//! backend-agnostic facade.

pub mod config;
pub mod generator;
pub mod image;
pub mod kling;
pub mod progress;
pub mod prompt;
pub mod veo;
