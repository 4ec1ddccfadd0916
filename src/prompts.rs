//! Instruction templates for the three tasks.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing how summaries are framed or what
//!    output contract flashcards must follow is an edit in exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the assembled prompts directly
//!    without calling a real model, so a template regression (dropping the
//!    JSON output contract, say) is caught cheaply.
//!
//! The document text spliced into these templates is already truncated by
//! the prompt shaper; nothing here enforces a length limit.

/// Instruction head for the summarize task.
pub const SUMMARY_INSTRUCTIONS: &str = "\
You are a professional document summarizer. Please provide a clear, structured summary of the following document text.

Focus on:
- Main topics and key points
- Important details and findings
- Overall purpose and conclusions

Keep the summary concise but comprehensive, using clear paragraphs.";

/// Instruction head for the flashcard-generate task.
///
/// The output contract (a JSON array of objects with `question` and `answer`
/// string fields) is load-bearing: post-processing parses against exactly
/// this shape. The 10–15 count is a guideline the model may violate.
pub const FLASHCARD_INSTRUCTIONS: &str = r#"You are a professional educator creating study flashcards. Based on the following document text, create 10-15 high-quality flashcards.

Format your response as a JSON array with this exact structure:
[
  {
    "question": "Question text here",
    "answer": "Answer text here"
  }
]

Guidelines:
- Focus on key concepts, definitions, and important facts
- Make questions clear and specific
- Keep answers concise but complete
- Cover different aspects of the material
- Use varied question types (what, why, how, define, etc.)"#;

/// Build the full summarize prompt with document text spliced in.
pub fn summary_prompt(document: &str) -> String {
    format!("{SUMMARY_INSTRUCTIONS}\n\nDocument text:\n{document}")
}

/// Build the full flashcard prompt with document text spliced in.
pub fn flashcard_prompt(document: &str) -> String {
    format!("{FLASHCARD_INSTRUCTIONS}\n\nDocument text:\n{document}")
}

/// Build the chat system instruction grounding answers in the document.
///
/// The "say so when the answer is not in the document" clause is the
/// anti-hallucination guard: without it models happily answer from general
/// knowledge and present it as if it came from the PDF.
pub fn chat_system_prompt(document: &str) -> String {
    format!(
        "You are a helpful AI assistant that answers questions about PDF documents.\n\n\
         Here is the content of the PDF document:\n\n\
         {document}\n\n\
         Answer questions based on this document content. Be concise, accurate, \
         and cite specific information from the document when relevant. \
         If the answer is not in the document, say so."
    )
}
