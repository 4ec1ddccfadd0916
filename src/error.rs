//! Error types for the docstudy library.
//!
//! Every failure a request can hit maps to exactly one [`StudyError`]
//! variant, and every variant maps to exactly one HTTP status via
//! [`StudyError::status_code`]. The messages are written for end users:
//! "encrypted PDF", "no extractable text", and "rate limited" must each be
//! distinguishable from a generic failure, because the recovery action
//! differs for each (re-export the file, upload a text-based PDF, wait and
//! retry).
//!
//! Nothing here is retried by the library — each pipeline stage gets one
//! attempt per request, and the error surfaces at the request boundary.

use thiserror::Error;

use crate::provider::ProviderError;

/// All errors returned by the docstudy pipeline.
#[derive(Debug, Error)]
pub enum StudyError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Neither an embedded payload nor a remote URL (nor, for chat, a
    /// question / pre-extracted text) was supplied.
    #[error("{detail}")]
    MissingInput { detail: String },

    /// The remote blob could not be fetched, or answered with a non-2xx status.
    #[error("Failed to fetch document from '{url}': {reason}")]
    Fetch { url: String, reason: String },

    /// A direct upload declared a media type other than `application/pdf`.
    #[error("File must be a PDF (got media type '{media_type}')")]
    UnsupportedMediaType { media_type: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The parser could not process the document structure at all.
    #[error("Failed to parse PDF: {detail}. The file might be corrupted or not a valid PDF.")]
    MalformedDocument { detail: String },

    /// The document is encrypted; extraction is not attempted.
    #[error("This PDF is encrypted or password-protected. Please use an unencrypted PDF.")]
    EncryptedDocument,

    /// Parsing succeeded but too little text came out to be useful.
    #[error("Could not extract text from PDF: {detail}")]
    ExtractionInsufficient { chars: usize, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// Transport or provider failure on the model call.
    #[error("Model request failed: {detail}")]
    ModelInvocation { detail: String },

    /// The model call succeeded but returned empty or whitespace-only text.
    #[error("No content received from the model. Please try again.")]
    ModelEmptyResponse,

    /// Flashcard generation returned text that is not a parseable
    /// JSON array of question/answer pairs. No repair is attempted.
    #[error("Failed to generate valid flashcards: {detail}")]
    FlashcardFormat { detail: String },

    /// The provider signalled quota exhaustion (HTTP 429 or a
    /// resource-exhaustion marker in its diagnostic).
    #[error("Rate limit reached. Please wait a moment and try again.")]
    RateLimited,

    // ── Config errors ─────────────────────────────────────────────────────
    /// No model provider is available (missing API key etc.).
    #[error("Model provider is not configured. {hint}")]
    NotConfigured { hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StudyError {
    /// Shorthand for a [`StudyError::MissingInput`] with a custom message.
    pub fn missing_input(detail: impl Into<String>) -> Self {
        StudyError::MissingInput {
            detail: detail.into(),
        }
    }

    /// The HTTP status this error maps to at the request boundary.
    ///
    /// Convention: malformed/missing input → 400, misconfiguration → 503,
    /// rate-limited → 429, everything else → 500.
    pub fn status_code(&self) -> u16 {
        match self {
            StudyError::MissingInput { .. }
            | StudyError::UnsupportedMediaType { .. }
            | StudyError::MalformedDocument { .. }
            | StudyError::EncryptedDocument
            | StudyError::ExtractionInsufficient { .. } => 400,
            StudyError::RateLimited => 429,
            StudyError::NotConfigured { .. } => 503,
            StudyError::Fetch { .. }
            | StudyError::ModelInvocation { .. }
            | StudyError::ModelEmptyResponse
            | StudyError::FlashcardFormat { .. }
            | StudyError::Internal(_) => 500,
        }
    }
}

/// Classify a provider failure: quota exhaustion becomes [`StudyError::RateLimited`],
/// everything else propagates as [`StudyError::ModelInvocation`].
impl From<ProviderError> for StudyError {
    fn from(e: ProviderError) -> Self {
        if e.is_rate_limited() {
            StudyError::RateLimited
        } else {
            StudyError::ModelInvocation {
                detail: e.to_string(),
            }
        }
    }
}
