//! Configuration for the extraction-and-answer pipeline.
//!
//! All behaviour is controlled through [`StudyConfig`], built via its
//! [`StudyConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to share a config across request handlers and to see at a glance which
//! limits a deployment is running with.
//!
//! The extraction threshold and the per-task context ceilings are empirical
//! values carried over from production use. They are fields, not hard-coded
//! constants, precisely because nobody has derived a "correct" value for
//! them — tune per deployment if needed.

use crate::error::StudyError;
use crate::provider::ModelProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for summarize / flashcard / chat requests.
///
/// Built via [`StudyConfig::builder()`] or [`StudyConfig::default()`].
///
/// # Example
/// ```rust
/// use docstudy::StudyConfig;
///
/// let config = StudyConfig::builder()
///     .api_key("AIza...")
///     .summary_model("gemini-2.5-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct StudyConfig {
    /// Minimum extracted-text length (in characters) for a document to count
    /// as extractable. Default: 50.
    ///
    /// Below this the document is almost certainly image-only or corrupt, and
    /// summarizing 40 characters of noise would silently produce garbage.
    /// Extraction fails explicitly instead.
    pub min_extract_chars: usize,

    /// Maximum document characters injected into a summarize prompt. Default: 30,000.
    ///
    /// Prefix truncation: the first N characters are kept, the rest dropped.
    /// Later-document loss is a known limitation of this policy.
    pub summary_context_chars: usize,

    /// Maximum document characters injected into a flashcard prompt. Default: 15,000.
    pub flashcard_context_chars: usize,

    /// Maximum document characters injected as chat grounding context. Default: 30,000.
    pub chat_context_chars: usize,

    /// Model used for summarization. Default: `gemini-2.5-flash`.
    pub summary_model: String,

    /// Model used for flashcard generation. Default: `gemini-2.0-flash`.
    pub flashcard_model: String,

    /// Model used for chat answers. Default: `gemini-2.0-flash`.
    pub chat_model: String,

    /// Sampling temperature for summaries. Default: 0.3.
    ///
    /// Low temperature keeps the summary faithful to the document instead of
    /// creative. Flashcards run hotter because varied question phrasing is a
    /// feature there.
    pub summary_temperature: f32,

    /// Output token budget for summaries. Default: 4096.
    pub summary_max_tokens: u32,

    /// Sampling temperature for flashcard generation. Default: 0.7.
    pub flashcard_temperature: f32,

    /// Output token budget for flashcard generation. Default: 2000.
    pub flashcard_max_tokens: u32,

    /// Sampling temperature for chat answers. Default: 0.3.
    pub chat_temperature: f32,

    /// Timeout for fetching a remote blob URL, in seconds. Default: 60.
    ///
    /// Matches the nominal end-to-end request deadline; a blob fetch slower
    /// than that would blow the overall budget anyway.
    pub fetch_timeout_secs: u64,

    /// API key for the default Gemini provider. If `None`, the key is read
    /// from `GEMINI_API_KEY` / `GOOGLE_GENERATIVE_AI_API_KEY` at call time.
    pub api_key: Option<String>,

    /// Pre-constructed model provider. Takes precedence over `api_key`.
    /// Useful in tests or when the caller needs custom middleware.
    pub provider: Option<Arc<dyn ModelProvider>>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            min_extract_chars: 50,
            summary_context_chars: 30_000,
            flashcard_context_chars: 15_000,
            chat_context_chars: 30_000,
            summary_model: "gemini-2.5-flash".to_string(),
            flashcard_model: "gemini-2.0-flash".to_string(),
            chat_model: "gemini-2.0-flash".to_string(),
            summary_temperature: 0.3,
            summary_max_tokens: 4096,
            flashcard_temperature: 0.7,
            flashcard_max_tokens: 2000,
            chat_temperature: 0.3,
            fetch_timeout_secs: 60,
            api_key: None,
            provider: None,
        }
    }
}

impl fmt::Debug for StudyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudyConfig")
            .field("min_extract_chars", &self.min_extract_chars)
            .field("summary_context_chars", &self.summary_context_chars)
            .field("flashcard_context_chars", &self.flashcard_context_chars)
            .field("chat_context_chars", &self.chat_context_chars)
            .field("summary_model", &self.summary_model)
            .field("flashcard_model", &self.flashcard_model)
            .field("chat_model", &self.chat_model)
            .field("summary_temperature", &self.summary_temperature)
            .field("flashcard_temperature", &self.flashcard_temperature)
            .field("chat_temperature", &self.chat_temperature)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn ModelProvider>"))
            .finish()
    }
}

impl StudyConfig {
    /// Create a new builder for `StudyConfig`.
    pub fn builder() -> StudyConfigBuilder {
        StudyConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`StudyConfig`].
#[derive(Debug)]
pub struct StudyConfigBuilder {
    config: StudyConfig,
}

impl StudyConfigBuilder {
    pub fn min_extract_chars(mut self, n: usize) -> Self {
        self.config.min_extract_chars = n;
        self
    }

    pub fn summary_context_chars(mut self, n: usize) -> Self {
        self.config.summary_context_chars = n;
        self
    }

    pub fn flashcard_context_chars(mut self, n: usize) -> Self {
        self.config.flashcard_context_chars = n;
        self
    }

    pub fn chat_context_chars(mut self, n: usize) -> Self {
        self.config.chat_context_chars = n;
        self
    }

    pub fn summary_model(mut self, model: impl Into<String>) -> Self {
        self.config.summary_model = model.into();
        self
    }

    pub fn flashcard_model(mut self, model: impl Into<String>) -> Self {
        self.config.flashcard_model = model.into();
        self
    }

    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.config.chat_model = model.into();
        self
    }

    pub fn summary_temperature(mut self, t: f32) -> Self {
        self.config.summary_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn summary_max_tokens(mut self, n: u32) -> Self {
        self.config.summary_max_tokens = n;
        self
    }

    pub fn flashcard_temperature(mut self, t: f32) -> Self {
        self.config.flashcard_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn flashcard_max_tokens(mut self, n: u32) -> Self {
        self.config.flashcard_max_tokens = n;
        self
    }

    pub fn chat_temperature(mut self, t: f32) -> Self {
        self.config.chat_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StudyConfig, StudyError> {
        let c = &self.config;
        if c.min_extract_chars == 0 {
            return Err(StudyError::Internal(
                "min_extract_chars must be ≥ 1".into(),
            ));
        }
        for (name, ceiling) in [
            ("summary_context_chars", c.summary_context_chars),
            ("flashcard_context_chars", c.flashcard_context_chars),
            ("chat_context_chars", c.chat_context_chars),
        ] {
            if ceiling < c.min_extract_chars {
                return Err(StudyError::Internal(format!(
                    "{} ({}) must not be below min_extract_chars ({})",
                    name, ceiling, c.min_extract_chars
                )));
            }
        }
        Ok(self.config)
    }
}
