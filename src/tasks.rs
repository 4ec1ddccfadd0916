//! Task dispatch for the blocking study tasks: summarize and flashcards.
//!
//! Both tasks run the same spine — resolve bytes, extract text off the async
//! runtime, shape the prompt, invoke the provider — and differ only in the
//! shaping knobs and in whether the response gets a structure-recovery pass.
//! Chat, the streaming task, lives in [`crate::stream`].
//!
//! Extraction is CPU-bound (it walks every content stream in the document),
//! so it runs on the blocking pool rather than stalling the reactor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::info;

use crate::config::StudyConfig;
use crate::error::StudyError;
use crate::output::{ChatTurn, ExtractedText, FlashcardSet, Summary};
use crate::pipeline::extract;
use crate::pipeline::postprocess::parse_flashcards;
use crate::pipeline::shape::{self, ShapedPrompt};
use crate::pipeline::source::{self, DocumentSource};
use crate::provider::{self, ModelRequest};

/// Monotonic id correlating the log lines of one task invocation.
static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> u64 {
    REQUEST_SEQ.fetch_add(1, Ordering::Relaxed)
}

/// Summarize a document.
pub async fn summarize(source: DocumentSource, config: &StudyConfig) -> Result<Summary, StudyError> {
    let request_id = next_request_id();
    let started = Instant::now();

    let text = extract_text(source, config).await?;
    let shaped = shape::shape_summary(&text, config);
    info!(
        request_id,
        task = "summarize",
        chars = text.char_count(),
        model = %shaped.model,
        "document extracted"
    );

    let response = complete(shaped, config).await?;
    info!(
        request_id,
        task = "summarize",
        elapsed_ms = started.elapsed().as_millis() as u64,
        "summary produced"
    );
    Ok(Summary { text: response })
}

/// Generate a flashcard set for a document.
pub async fn flashcards(
    source: DocumentSource,
    config: &StudyConfig,
) -> Result<FlashcardSet, StudyError> {
    let request_id = next_request_id();
    let started = Instant::now();

    let text = extract_text(source, config).await?;
    let shaped = shape::shape_flashcards(&text, config);
    info!(
        request_id,
        task = "flashcards",
        chars = text.char_count(),
        model = %shaped.model,
        "document extracted"
    );

    let response = complete(shaped, config).await?;
    let set = parse_flashcards(&response)?;
    info!(
        request_id,
        task = "flashcards",
        cards = set.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "flashcards produced"
    );
    Ok(set)
}

/// Resolve and extract a document without invoking a model.
///
/// This is the sharing point for callers that want to extract once and run
/// several tasks (or a chat session) over the same text.
pub async fn extract_only(
    source: DocumentSource,
    config: &StudyConfig,
) -> Result<ExtractedText, StudyError> {
    extract_text(source, config).await
}

/// Resolve a source to bytes, then extract on the blocking pool.
async fn extract_text(
    source: DocumentSource,
    config: &StudyConfig,
) -> Result<ExtractedText, StudyError> {
    let bytes = source::resolve(source, config).await?;
    let config = config.clone();
    tokio::task::spawn_blocking(move || extract::extract(&bytes, &config))
        .await
        .map_err(|e| StudyError::Internal(format!("extraction task failed: {e}")))?
}

/// Run one blocking completion and reject empty responses.
async fn complete(shaped: ShapedPrompt, config: &StudyConfig) -> Result<String, StudyError> {
    let provider = provider::resolve(config)?;
    let request = ModelRequest {
        model: shaped.model,
        system: shaped.system,
        turns: vec![ChatTurn::user(shaped.user)],
        temperature: shaped.temperature,
        max_output_tokens: shaped.max_output_tokens,
    };

    let response = provider.generate(&request).await?;
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(StudyError::ModelEmptyResponse);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChunkStream, ModelProvider, ProviderError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedProvider {
        response: Result<String, ProviderError>,
    }

    #[async_trait]
    impl ModelProvider for FixedProvider {
        fn provider_name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _request: &ModelRequest) -> Result<String, ProviderError> {
            self.response.clone()
        }

        async fn generate_stream(
            &self,
            _request: &ModelRequest,
        ) -> Result<ChunkStream, ProviderError> {
            Err(ProviderError::transport("not a streaming test"))
        }
    }

    fn config_with(response: Result<String, ProviderError>) -> StudyConfig {
        StudyConfig {
            provider: Some(Arc::new(FixedProvider { response })),
            ..StudyConfig::default()
        }
    }

    fn shaped() -> ShapedPrompt {
        ShapedPrompt {
            model: "gemini-2.0-flash".into(),
            system: None,
            user: "prompt".into(),
            temperature: 0.3,
            max_output_tokens: None,
        }
    }

    #[tokio::test]
    async fn complete_trims_surrounding_whitespace() {
        let config = config_with(Ok("  the answer \n".into()));
        assert_eq!(complete(shaped(), &config).await.unwrap(), "the answer");
    }

    #[tokio::test]
    async fn complete_rejects_whitespace_only_responses() {
        let config = config_with(Ok("   \n\t ".into()));
        let err = complete(shaped(), &config).await.unwrap_err();
        assert!(matches!(err, StudyError::ModelEmptyResponse));
    }

    #[tokio::test]
    async fn quota_failures_map_to_rate_limited() {
        let config = config_with(Err(ProviderError::http(429, "slow down".into())));
        let err = complete(shaped(), &config).await.unwrap_err();
        assert!(matches!(err, StudyError::RateLimited));
        assert_eq!(err.status_code(), 429);
    }

    #[tokio::test]
    async fn resource_exhausted_messages_also_map_to_rate_limited() {
        let config = config_with(Err(ProviderError::http(
            500,
            "RESOURCE_EXHAUSTED: try later".into(),
        )));
        let err = complete(shaped(), &config).await.unwrap_err();
        assert!(matches!(err, StudyError::RateLimited));
    }
}
