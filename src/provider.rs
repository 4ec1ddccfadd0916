//! Model provider seam: the narrow interface the dispatcher calls, plus the
//! shipped Gemini REST implementation.
//!
//! The pipeline never talks to an HTTP model API directly — it goes through
//! [`ModelProvider`], a two-method trait (`generate` for the blocking tasks,
//! `generate_stream` for chat). That keeps rate-limit classification and
//! response handling testable with a scripted provider, and lets callers
//! plug in a different backend without touching the pipeline.
//!
//! The Gemini implementation speaks the `generateContent` /
//! `streamGenerateContent?alt=sse` REST endpoints. Streaming responses are
//! server-sent events: `data: {json}` lines, each carrying a candidate with
//! a text fragment. The parser here buffers raw bytes only until the next
//! newline, so one chunk is resident at a time regardless of response size.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::config::StudyConfig;
use crate::error::StudyError;
use crate::output::{ChatTurn, Role};

/// A finite, non-restartable stream of text chunks from the model.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// One model invocation: instruction, conversation turns, sampling knobs.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Model identifier, e.g. `gemini-2.0-flash`.
    pub model: String,
    /// System instruction, sent out-of-band from the turns.
    pub system: Option<String>,
    /// Conversation turns in order; the last one is the live user message.
    pub turns: Vec<ChatTurn>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token budget; `None` uses the provider default.
    pub max_output_tokens: Option<u32>,
}

impl ModelRequest {
    /// A single-user-message request, the shape the blocking tasks use.
    pub fn single_user(
        model: impl Into<String>,
        prompt: impl Into<String>,
        temperature: f32,
        max_output_tokens: Option<u32>,
    ) -> Self {
        ModelRequest {
            model: model.into(),
            system: None,
            turns: vec![ChatTurn::user(prompt)],
            temperature,
            max_output_tokens,
        }
    }
}

/// A failure reported by a model provider.
///
/// Carries the HTTP status when one is available so the caller can classify
/// quota exhaustion; the message carries the provider diagnostic.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    /// A transport-level failure with no HTTP status (connect error, body
    /// read error, malformed response JSON).
    pub fn transport(e: impl std::fmt::Display) -> Self {
        ProviderError {
            status: None,
            message: e.to_string(),
        }
    }

    /// A non-success HTTP response.
    pub fn http(status: u16, body: String) -> Self {
        ProviderError {
            status: Some(status),
            message: format!("HTTP {status}: {body}"),
        }
    }

    /// Whether this failure signals quota/rate-limit exhaustion: HTTP 429,
    /// or a resource-exhaustion marker in the diagnostic message.
    pub fn is_rate_limited(&self) -> bool {
        if self.status == Some(429) {
            return true;
        }
        let msg = self.message.to_lowercase();
        msg.contains("resource_exhausted") || msg.contains("quota") || msg.contains("rate limit")
    }
}

/// The model collaborator interface consumed by the task dispatcher.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Name used in logs and configuration hints.
    fn provider_name(&self) -> &str;

    /// One blocking completion: suspend until the full text is available.
    async fn generate(&self, request: &ModelRequest) -> Result<String, ProviderError>;

    /// One streaming completion: chunks arrive incrementally, in order.
    async fn generate_stream(&self, request: &ModelRequest) -> Result<ChunkStream, ProviderError>;
}

/// Resolve the model provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is; this is how
///    tests inject a scripted provider.
/// 2. **Configured API key** (`config.api_key`) — a Gemini provider with
///    that key.
/// 3. **Environment** — `GEMINI_API_KEY`, then `GOOGLE_GENERATIVE_AI_API_KEY`.
pub fn resolve(config: &StudyConfig) -> Result<Arc<dyn ModelProvider>, StudyError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }
    if let Some(ref key) = config.api_key {
        return Ok(Arc::new(GeminiProvider::new(key.clone())));
    }
    GeminiProvider::from_env()
        .map(|p| Arc::new(p) as Arc<dyn ModelProvider>)
        .ok_or_else(|| StudyError::NotConfigured {
            hint: "Set GEMINI_API_KEY or GOOGLE_GENERATIVE_AI_API_KEY, or supply an \
                   api_key / provider in StudyConfig."
                .into(),
        })
}

// ── Gemini REST implementation ───────────────────────────────────────────

/// Default Gemini API endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini REST provider (`generateContent` / `streamGenerateContent`).
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        GeminiProvider {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Point at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build from the environment, trying `GEMINI_API_KEY` first and
    /// `GOOGLE_GENERATIVE_AI_API_KEY` second.
    pub fn from_env() -> Option<Self> {
        ["GEMINI_API_KEY", "GOOGLE_GENERATIVE_AI_API_KEY"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            .map(Self::new)
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &ModelRequest) -> Result<String, ProviderError> {
        let url = self.endpoint(&request.model, "generateContent");
        debug!(model = %request.model, "gemini generate");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&build_body(request))
            .send()
            .await
            .map_err(ProviderError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http(status.as_u16(), body));
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(ProviderError::transport)?;
        Ok(parsed.text())
    }

    async fn generate_stream(&self, request: &ModelRequest) -> Result<ChunkStream, ProviderError> {
        let url = self.endpoint(&request.model, "streamGenerateContent");
        debug!(model = %request.model, "gemini generate_stream");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str()), ("alt", "sse")])
            .json(&build_body(request))
            .send()
            .await
            .map_err(ProviderError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::http(status.as_u16(), body));
        }

        Ok(sse_text_stream(response.bytes_stream()))
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<WirePart>,
}

#[derive(Serialize)]
struct WirePart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

fn build_body(request: &ModelRequest) -> GenerateContentBody {
    GenerateContentBody {
        system_instruction: request.system.as_ref().map(|text| WireContent {
            role: None,
            parts: vec![WirePart { text: text.clone() }],
        }),
        contents: request
            .turns
            .iter()
            .map(|turn| WireContent {
                role: Some(
                    match turn.role {
                        Role::User => "user",
                        // Gemini calls the assistant side "model"
                        Role::Assistant => "model",
                    }
                    .to_string(),
                ),
                parts: vec![WirePart {
                    text: turn.content.clone(),
                }],
            })
            .collect(),
        generation_config: GenerationConfig {
            temperature: request.temperature,
            max_output_tokens: request.max_output_tokens,
        },
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenate the text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

// ── SSE parsing ──────────────────────────────────────────────────────────

struct SseState<S> {
    body: Pin<Box<S>>,
    buf: String,
    pending: VecDeque<String>,
    done: bool,
}

/// Turn an SSE byte stream into a stream of text chunks.
///
/// Buffers only up to the next newline; complete `data:` lines are parsed
/// as streaming responses and their text fragments emitted in arrival order.
fn sse_text_stream<S>(body: S) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        buf: String::new(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(text) = st.pending.pop_front() {
                return Some((Ok(text), st));
            }
            if st.done {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    st.buf.push_str(&String::from_utf8_lossy(&bytes));
                    drain_complete_lines(&mut st.buf, &mut st.pending);
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(ProviderError::transport(e)), st));
                }
                None => {
                    st.done = true;
                    // A final data line without a trailing newline still counts.
                    let tail = std::mem::take(&mut st.buf);
                    if let Some(text) = data_line_text(tail.trim()) {
                        st.pending.push_back(text);
                    }
                }
            }
        }
    }))
}

fn drain_complete_lines(buf: &mut String, pending: &mut VecDeque<String>) {
    while let Some(pos) = buf.find('\n') {
        let line = buf[..pos].trim_end_matches('\r').trim().to_string();
        buf.replace_range(..=pos, "");
        if let Some(text) = data_line_text(&line) {
            pending.push_back(text);
        }
    }
}

/// Extract the text fragment from one SSE line, if it carries one.
///
/// Non-`data:` lines (comments, event names, keep-alive blanks) and
/// unparseable payloads are skipped rather than failing the stream — a
/// malformed frame mid-stream should not kill an answer that is already
/// flowing to the client.
fn data_line_text(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<GenerateContentResponse>(payload) {
        Ok(response) => {
            let text = response.text();
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        }
        Err(e) => {
            debug!(error = %e, "skipping unparseable SSE frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunk_frame(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"parts\":[{{\"text\":\"{text}\"}}]}}}}]}}\n\n"
        )
    }

    #[test]
    fn body_uses_camel_case_and_model_role() {
        let request = ModelRequest {
            model: "gemini-2.0-flash".into(),
            system: Some("ground answers in the document".into()),
            turns: vec![ChatTurn::user("q1"), ChatTurn::assistant("a1")],
            temperature: 0.3,
            max_output_tokens: Some(4096),
        };
        let json = serde_json::to_value(build_body(&request)).unwrap();

        assert!(json.get("systemInstruction").is_some());
        // f32 temperatures widen to f64 in JSON; compare with a tolerance.
        let temperature = json["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.3).abs() < 1e-6, "got {temperature}");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 4096);
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
    }

    #[test]
    fn max_tokens_omitted_when_unset() {
        let request = ModelRequest::single_user("m", "p", 0.3, None);
        let json = serde_json::to_value(build_body(&request)).unwrap();
        assert!(json["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn response_text_concatenates_first_candidate_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text(), "Hello world");
    }

    #[test]
    fn data_line_skips_blank_and_done_frames() {
        assert_eq!(data_line_text(""), None);
        assert_eq!(data_line_text("data:"), None);
        assert_eq!(data_line_text("data: [DONE]"), None);
        assert_eq!(data_line_text(": keep-alive"), None);
        assert_eq!(data_line_text("data: not json"), None);
    }

    #[tokio::test]
    async fn sse_stream_yields_fragments_in_order() {
        let frames = format!("{}{}", chunk_frame("Hel"), chunk_frame("lo"));
        let body = stream::iter(vec![Ok(Bytes::from(frames))]);

        let chunks: Vec<String> = sse_text_stream(body)
            .map(|r| r.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(chunks, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn sse_stream_handles_frames_split_across_reads() {
        let frame = chunk_frame("split");
        let (head, rest) = frame.split_at(17);
        let body = stream::iter(vec![
            Ok(Bytes::copy_from_slice(head.as_bytes())),
            Ok(Bytes::copy_from_slice(rest.as_bytes())),
        ]);

        let chunks: Vec<String> = sse_text_stream(body)
            .map(|r| r.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(chunks, vec!["split".to_string()]);
    }

    #[tokio::test]
    async fn sse_stream_parses_final_line_without_newline() {
        let frame = chunk_frame("tail");
        let trimmed = frame.trim_end().to_string();
        let body = stream::iter(vec![Ok(Bytes::from(trimmed))]);

        let chunks: Vec<String> = sse_text_stream(body)
            .map(|r| r.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(chunks, vec!["tail".to_string()]);
    }
}
