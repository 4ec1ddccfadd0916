//! Prompt shaping: turn validated document text into a model-ready request.
//!
//! Each task has its own context ceiling, model, temperature, and token
//! budget; this module is the single place where those per-task knobs get
//! combined with the prompt templates from [`crate::prompts`].
//!
//! Truncation is a character-count prefix cut, applied before the document
//! is spliced into the template. The tail of an over-long document is simply
//! not seen by the model. That is the deliberate trade: predictable prompt
//! sizes over clever sampling.

use crate::config::StudyConfig;
use crate::output::ExtractedText;
use crate::prompts;

/// A fully shaped single-turn prompt, ready to hand to a provider.
#[derive(Debug, Clone)]
pub struct ShapedPrompt {
    /// Model identifier for this task.
    pub model: String,
    /// System instruction, when the task uses one.
    pub system: Option<String>,
    /// The user-role prompt text.
    pub user: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token budget, when the task caps one.
    pub max_output_tokens: Option<u32>,
}

/// Shape a summarization prompt from extracted text.
pub fn shape_summary(text: &ExtractedText, config: &StudyConfig) -> ShapedPrompt {
    let context = truncate_chars(text.as_str(), config.summary_context_chars);
    ShapedPrompt {
        model: config.summary_model.clone(),
        system: None,
        user: prompts::summary_prompt(context),
        temperature: config.summary_temperature,
        max_output_tokens: Some(config.summary_max_tokens),
    }
}

/// Shape a flashcard-generation prompt from extracted text.
pub fn shape_flashcards(text: &ExtractedText, config: &StudyConfig) -> ShapedPrompt {
    let context = truncate_chars(text.as_str(), config.flashcard_context_chars);
    ShapedPrompt {
        model: config.flashcard_model.clone(),
        system: None,
        user: prompts::flashcard_prompt(context),
        temperature: config.flashcard_temperature,
        max_output_tokens: Some(config.flashcard_max_tokens),
    }
}

/// Build the chat grounding instruction from document text.
///
/// Chat differs from the one-shot tasks: the document rides in the system
/// instruction and the turns carry the conversation, so there is no single
/// `user` prompt to shape here.
pub fn shape_chat_system(document: &str, config: &StudyConfig) -> String {
    prompts::chat_system_prompt(truncate_chars(document, config.chat_context_chars))
}

/// Keep exactly the first `max_chars` characters of `text`.
///
/// Character-based, not byte-based, so a ceiling never splits a multi-byte
/// sequence.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
