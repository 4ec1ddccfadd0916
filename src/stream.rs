//! Streaming chat answers grounded in a document.
//!
//! Chat is the one task whose output is consumed incrementally: the caller
//! gets an [`AnswerStream`] and forwards chunks to the client as they
//! arrive. The relay preserves chunk order, holds one chunk at a time, and
//! does no re-chunking — whatever fragment boundaries the provider emits are
//! the boundaries the client sees.
//!
//! Dropping the stream is cancellation. Nothing upstream is polled after the
//! drop, and no cleanup beyond the drop itself is required.

use futures::StreamExt;
use std::pin::Pin;
use tracing::info;

use crate::config::StudyConfig;
use crate::error::StudyError;
use crate::output::ChatTurn;
use crate::pipeline::shape;
use crate::pipeline::source::DocumentSource;
use crate::provider::{self, ChunkStream, ModelRequest};
use crate::tasks;

/// A finite stream of answer fragments, in model emission order.
pub type AnswerStream = Pin<Box<dyn futures::Stream<Item = Result<String, StudyError>> + Send>>;

/// Emitted as the sole chunk when the model closes its stream without
/// producing any text.
pub const NO_ANSWER_FALLBACK: &str =
    "No answer was produced for this question. Please try again.";

/// Where the grounding text for a chat question comes from.
///
/// Callers that already extracted the document (e.g. a client caching the
/// text between questions) pass it back as [`ChatSource::Text`] and skip the
/// parse entirely.
pub enum ChatSource {
    /// Previously extracted document text, reused as-is.
    Text(String),
    /// A document still in byte form; it is resolved and extracted first.
    Document(DocumentSource),
}

/// Answer a question about a document, streaming the answer.
///
/// `history` carries the prior conversation turns in order; the question
/// becomes the final user turn. Validation failures surface here, before any
/// chunk is produced; failures after the first chunk surface as an `Err`
/// item inside the stream.
pub async fn chat_answer(
    source: ChatSource,
    question: &str,
    history: &[ChatTurn],
    config: &StudyConfig,
) -> Result<AnswerStream, StudyError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(StudyError::missing_input("No question provided"));
    }

    let document = match source {
        ChatSource::Text(text) => {
            if text.trim().is_empty() {
                return Err(StudyError::missing_input("No PDF content available"));
            }
            text
        }
        ChatSource::Document(doc) => tasks::extract_only(doc, config).await?.into_inner(),
    };

    let mut turns: Vec<ChatTurn> = history.to_vec();
    turns.push(ChatTurn::user(question));
    let request = ModelRequest {
        model: config.chat_model.clone(),
        system: Some(shape::shape_chat_system(&document, config)),
        turns,
        temperature: config.chat_temperature,
        max_output_tokens: None,
    };
    info!(
        model = %request.model,
        history_turns = history.len(),
        document_chars = document.chars().count(),
        "starting chat answer"
    );

    let provider = provider::resolve(config)?;
    let upstream = provider.generate_stream(&request).await?;
    Ok(relay(upstream))
}

struct RelayState {
    upstream: ChunkStream,
    delivered: u64,
    done: bool,
}

/// Forward provider chunks to the caller, one at a time.
///
/// Empty chunks are dropped. A provider error ends the stream after being
/// surfaced as the final item. A stream that closes having delivered nothing
/// yields [`NO_ANSWER_FALLBACK`] so the client never receives a silent empty
/// body.
pub fn relay(upstream: ChunkStream) -> AnswerStream {
    let state = RelayState {
        upstream,
        delivered: 0,
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        loop {
            if st.done {
                return None;
            }
            match st.upstream.next().await {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    st.delivered += 1;
                    return Some((Ok(chunk), st));
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(StudyError::from(e)), st));
                }
                None => {
                    st.done = true;
                    if st.delivered == 0 {
                        return Some((Ok(NO_ANSWER_FALLBACK.to_string()), st));
                    }
                    return None;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn chunks(items: Vec<Result<String, ProviderError>>) -> ChunkStream {
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn relay_preserves_chunk_order() {
        let out: Vec<String> = relay(chunks(vec![
            Ok("The ".into()),
            Ok("answer ".into()),
            Ok("is 42.".into()),
        ]))
        .map(|r| r.unwrap())
        .collect()
        .await;
        assert_eq!(out.concat(), "The answer is 42.");
    }

    #[tokio::test]
    async fn relay_drops_empty_chunks_without_counting_them() {
        let out: Vec<String> = relay(chunks(vec![Ok(String::new()), Ok("hi".into())]))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(out, vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn empty_stream_yields_the_fallback_message() {
        let out: Vec<String> = relay(chunks(vec![])).map(|r| r.unwrap()).collect().await;
        assert_eq!(out, vec![NO_ANSWER_FALLBACK.to_string()]);
    }

    #[tokio::test]
    async fn only_empty_chunks_also_yield_the_fallback() {
        let out: Vec<String> = relay(chunks(vec![Ok(String::new()), Ok(String::new())]))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(out, vec![NO_ANSWER_FALLBACK.to_string()]);
    }

    #[tokio::test]
    async fn rate_limit_error_mid_stream_surfaces_and_ends_the_stream() {
        let out: Vec<Result<String, StudyError>> = relay(chunks(vec![
            Ok("partial".into()),
            Err(ProviderError::http(429, "quota".into())),
        ]))
        .collect()
        .await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_deref().unwrap(), "partial");
        assert!(matches!(out[1], Err(StudyError::RateLimited)));
    }

    #[tokio::test]
    async fn relay_is_pull_driven() {
        // An endless upstream that counts how often it is polled for a value.
        let pulls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulls);
        let upstream: ChunkStream = Box::pin(stream::unfold(0u64, move |n| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Some((Ok(format!("chunk-{n}")), n + 1))
            }
        }));

        let taken: Vec<String> = relay(upstream)
            .take(2)
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(taken, vec!["chunk-0".to_string(), "chunk-1".to_string()]);
        assert_eq!(pulls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn blank_question_is_rejected_before_any_model_call() {
        let err = chat_answer(
            ChatSource::Text("document body".into()),
            "   ",
            &[],
            &StudyConfig::default(),
        )
        .await
        .err()
        .expect("a blank question must not start a stream");
        assert!(matches!(err, StudyError::MissingInput { .. }));
        assert_eq!(err.to_string(), "No question provided");
    }

    #[tokio::test]
    async fn blank_cached_text_is_rejected() {
        let err = chat_answer(
            ChatSource::Text("  \n ".into()),
            "what is this?",
            &[],
            &StudyConfig::default(),
        )
        .await
        .err()
        .expect("blank cached text must not start a stream");
        assert_eq!(err.to_string(), "No PDF content available");
    }
}
