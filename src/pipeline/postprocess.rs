//! Flashcard response recovery: model text out, structured cards in.
//!
//! Models asked for "a JSON array and nothing else" still love to wrap the
//! array in a markdown fence or a sentence of prose. Recovery runs three
//! attempts, in order of decreasing confidence:
//!
//! 1. the contents of a ```` ```json ```` fenced block
//! 2. the slice from the first `[` to the last `]`
//! 3. the whole response verbatim
//!
//! Whichever candidate is chosen gets exactly one parse; if that fails the
//! request fails. Anything fancier (bracket repair, partial card salvage)
//! would silently hand the user cards the model never wrote.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::StudyError;
use crate::output::{Flashcard, FlashcardSet};

// (?s) so the payload may span lines; lazy match stops at the first
// closing fence.
static RE_FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap());

/// Parse a model response into a [`FlashcardSet`].
pub fn parse_flashcards(response: &str) -> Result<FlashcardSet, StudyError> {
    let candidate = json_candidate(response);
    let cards: Vec<Flashcard> = serde_json::from_str(candidate).map_err(|e| {
        debug!(error = %e, "flashcard candidate did not parse");
        StudyError::FlashcardFormat {
            detail: format!("model response was not a valid flashcard array: {e}"),
        }
    })?;
    Ok(FlashcardSet { cards })
}

/// Pick the most plausible JSON slice out of a model response.
fn json_candidate(response: &str) -> &str {
    if let Some(captures) = RE_FENCED_JSON.captures(response) {
        if let Some(fenced) = captures.get(1) {
            return fenced.as_str();
        }
    }
    if let (Some(open), Some(close)) = (response.find('['), response.rfind(']')) {
        if open < close {
            return &response[open..=close];
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARDS: &str = r#"[
        {"question": "What is a monad?", "answer": "A monoid in the category of endofunctors."},
        {"question": "What does Tj do?", "answer": "Shows a text string."}
    ]"#;

    #[test]
    fn bare_array_parses() {
        let set = parse_flashcards(CARDS).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.cards[0].question, "What is a monad?");
    }

    #[test]
    fn fenced_and_bare_yield_identical_cards() {
        let fenced = format!("```json\n{CARDS}\n```");
        assert_eq!(
            parse_flashcards(&fenced).unwrap(),
            parse_flashcards(CARDS).unwrap()
        );
    }

    #[test]
    fn prose_wrapped_array_is_recovered() {
        let wrapped = format!("Sure! Here are your flashcards:\n{CARDS}\nHappy studying!");
        let set = parse_flashcards(&wrapped).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn fence_takes_precedence_over_outer_brackets() {
        // Brackets in the prose must not widen the candidate past the fence.
        let tricky = format!("[note] model output below\n```json\n{CARDS}\n```\n[end]");
        let set = parse_flashcards(&tricky).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn empty_array_is_a_valid_empty_set() {
        let set = parse_flashcards("[]").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn unparseable_response_is_a_format_error() {
        let err = parse_flashcards("I cannot generate flashcards for this document.").unwrap_err();
        match err {
            StudyError::FlashcardFormat { detail } => {
                assert!(detail.contains("not a valid flashcard array"), "got: {detail}");
            }
            other => panic!("expected FlashcardFormat, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_inside_brackets_fails() {
        let err = parse_flashcards(r#"[{"question": "q", "answer": }]"#).unwrap_err();
        assert!(matches!(err, StudyError::FlashcardFormat { .. }));
    }
}
