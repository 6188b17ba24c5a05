//! Prompt construction for dog video generation.
//!
//! Both backends share the same two-template scheme (one for spoken dialogue,
//! one for dancing) but carry their own fixed voice/style wording, supplied
//! through a [`PromptStyle`]. Building a prompt is a pure string transform:
//! the same `(mode, text, style)` input always yields identical output.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What the dog in the generated clip should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// The dog speaks the user-provided dialogue with lip-sync.
    Speech,
    /// The dog dances to the user-provided style descriptor.
    Dance,
}

/// Default dance-style descriptor used when the user leaves the prompt empty
/// in dance mode.
pub const DEFAULT_DANCE_STYLE: &str = "an upbeat freestyle dance with lots of bouncing";

/// Per-backend fixed wording slotted into the shared templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptStyle {
    /// Voice characteristics line for speech mode.
    pub voice: &'static str,
    /// Movement instruction line for dance mode.
    pub movement: &'static str,
}

/// Fixed wording for the Kling backend.
pub const KLING_STYLE: PromptStyle = PromptStyle {
    voice: "Voice: a cute three-year-old girl, cheerful and adorable tone.",
    movement: "Make the dog move naturally and energetically to the beat.",
};

/// Fixed wording for the Veo backend.
pub const VEO_STYLE: PromptStyle = PromptStyle {
    voice: "Voice: a small cheerful child, bright and playful tone.",
    movement: "The dog's whole body bounces to the rhythm, tail wagging.",
};

/// Build the fully-specified instruction text sent to a generation backend.
///
/// # Arguments
/// * `mode` - Speech or dance
/// * `user_text` - The raw user prompt (dialogue or dance-style descriptor)
/// * `style` - The backend's fixed voice/movement wording
///
/// # Errors
///
/// Returns `PromptError::EmptyDialogue` when `mode` is speech and `user_text`
/// is empty or whitespace-only. Dance mode never fails: an empty descriptor
/// is replaced with [`DEFAULT_DANCE_STYLE`].
pub fn build_prompt(
    mode: PromptMode,
    user_text: &str,
    style: &PromptStyle,
) -> Result<String, PromptError> {
    let trimmed = user_text.trim();

    match mode {
        PromptMode::Speech => {
            if trimmed.is_empty() {
                return Err(PromptError::EmptyDialogue);
            }
            Ok(format!(
                "The dog in the photo opens its mouth and speaks the following dialogue \
                 with accurate lip-sync mouth movements.\n\
                 {}\n\
                 The dog's mouth moves naturally matching each syllable of the dialogue.\n\
                 Preserve the dog's identity and the original background.\n\
                 No subtitles, no extra text overlays.\n\n\
                 Dialogue:\n{}",
                style.voice, trimmed
            ))
        }
        PromptMode::Dance => {
            let descriptor = if trimmed.is_empty() {
                DEFAULT_DANCE_STYLE
            } else {
                trimmed
            };
            Ok(format!(
                "The dog in the photo stands up and dances energetically.\n\
                 {}\n\
                 Background music is a wordless instrumental track.\n\
                 Preserve the dog's identity and the original background.\n\
                 No subtitles, no extra text overlays.\n\n\
                 Dance style:\n{}",
                style.movement, descriptor
            ))
        }
    }
}

/// Errors that can occur while building a prompt.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("dialogue text is required for speech mode")]
    EmptyDialogue,
}
