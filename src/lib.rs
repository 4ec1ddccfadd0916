//! # docstudy
//!
//! Turn a PDF into study material: a summary, a deck of flashcards, or a
//! streaming document-grounded chat answer, each produced by a language
//! model working from text extracted out of the document's content streams.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use docstudy::{summarize, DocumentSource, StudyConfig};
//!
//! # async fn run() -> Result<(), docstudy::StudyError> {
//! let config = StudyConfig::builder().api_key("AIza...").build()?;
//! let source = DocumentSource::Upload {
//!     bytes: std::fs::read("paper.pdf").map_err(|e| docstudy::StudyError::Internal(e.to_string()))?,
//!     media_type: "application/pdf".into(),
//! };
//! let summary = summarize(source, &config).await?;
//! println!("{}", summary.text);
//! # Ok(())
//! # }
//! ```
//!
//! ## How it works
//!
//! Every task runs the same pipeline spine:
//!
//! 1. **source** — resolve an uploaded byte buffer or a remote blob URL
//! 2. **extract** — walk the PDF content streams into flat text and check it
//!    clears the minimum-length threshold
//! 3. **shape** — splice the text into the task prompt under a per-task
//!    character ceiling
//! 4. **generate** — one model invocation; chat streams, the others block
//!
//! The model seam is the [`ModelProvider`] trait; a Gemini REST
//! implementation ships in [`provider`], and tests (or alternative backends)
//! plug in their own via [`StudyConfig::provider`].
//!
//! Chat answers arrive as an [`AnswerStream`]; see [`chat_answer`]. Callers
//! that keep the extracted text around between questions pass it back as
//! [`ChatSource::Text`] to skip re-parsing the document.

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod stream;
pub mod tasks;

pub use config::{StudyConfig, StudyConfigBuilder};
pub use error::StudyError;
pub use output::{
    ChatTurn, ConversationState, ExtractedText, Flashcard, FlashcardSet, Role, Summary,
};
pub use pipeline::source::DocumentSource;
pub use provider::{ChunkStream, GeminiProvider, ModelProvider, ModelRequest, ProviderError};
pub use stream::{chat_answer, relay, AnswerStream, ChatSource, NO_ANSWER_FALLBACK};
pub use tasks::{extract_only, flashcards, summarize};
