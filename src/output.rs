//! Result shapes produced by the three tasks, plus the extracted-text and
//! conversation types that flow between pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The flat text extracted from a PDF, page order then in-page run order,
/// runs separated by a single space, trimmed at both ends.
///
/// Constructed only by [`crate::pipeline::extract::extract`], which enforces
/// the minimum-length validity rule — holding one of these means the
/// document passed that check. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtractedText(String);

impl ExtractedText {
    pub(crate) fn new(text: String) -> Self {
        ExtractedText(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters (not bytes), matching the validity threshold.
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ExtractedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of the summarize task.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub text: String,
}

/// One question/answer study card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

/// Result of the flashcard-generate task.
///
/// The prompt asks for 10–15 cards, but that is a guideline the model may
/// violate; the count is deliberately not validated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashcardSet {
    pub cards: Vec<Flashcard>,
}

impl FlashcardSet {
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Who produced a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a document-grounded conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        ChatTurn {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatTurn {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Client-side conversation state for the chat task.
///
/// The server is stateless across requests: the client owns the turn history
/// and the cached extracted text, and sends both with every turn so
/// extraction happens at most once per document per session. Nothing here is
/// ever persisted server-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationState {
    pub turns: Vec<ChatTurn>,
    /// Extracted document text cached after the first turn, reused so the
    /// PDF is not re-parsed on every question.
    pub document_text: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the user's question before sending it.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ChatTurn::user(content));
    }

    /// Record the assistant's completed answer once the stream finishes.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(ChatTurn::assistant(content));
    }

    /// History to accompany the next question: every prior turn, in order.
    pub fn history(&self) -> &[ChatTurn] {
        &self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_turn_roles_serialize_lowercase() {
        let turn = ChatTurn::user("what is this paper about?");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains(r#""role":"user""#), "got: {json}");

        let back: ChatTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }

    #[test]
    fn conversation_state_preserves_turn_order() {
        let mut state = ConversationState::new();
        state.push_user("q1");
        state.push_assistant("a1");
        state.push_user("q2");

        let roles: Vec<Role> = state.history().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
    }

    #[test]
    fn extracted_text_char_count_is_chars_not_bytes() {
        let text = ExtractedText::new("héllo".to_string());
        assert_eq!(text.char_count(), 5);
        assert_eq!(text.as_str().len(), 6);
    }
}
