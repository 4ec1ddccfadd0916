//! HTTP API for the study pipeline.
//!
//! Endpoints (all `POST`, all `multipart/form-data`):
//!
//! - `/api/summarize`  — fields `pdf` or `blobUrl`; returns `{"summary"}`
//! - `/api/flashcards` — fields `pdf` or `blobUrl`; returns `{"flashcards"}`
//! - `/api/chat`       — fields `question`, plus `pdfText` or `pdf`/`blobUrl`,
//!   optional `history` (JSON array of `{role, content}`); streams the answer
//!   as `text/plain` chunks
//!
//! `blobUrl` takes precedence over an embedded `pdf` when both are present.
//! Failures map to JSON `{"error": "..."}` with the status the error class
//! dictates: 400 for input problems, 429 for quota exhaustion, 503 when no
//! model credentials are configured, 500 otherwise.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use futures::StreamExt;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docstudy::{
    chat_answer, flashcards, summarize, ChatSource, ChatTurn, DocumentSource, StudyConfig,
    StudyError,
};

#[derive(Parser, Debug)]
#[command(
    name = "docstudy-server",
    version,
    about = "HTTP API that turns PDFs into summaries, flashcards, and chat answers"
)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "DOCSTUDY_BIND", default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Gemini API key. Falls back to GOOGLE_GENERATIVE_AI_API_KEY at call
    /// time when unset.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Maximum accepted request body size, in MiB.
    #[arg(long, default_value_t = 25)]
    max_upload_mb: usize,

    /// Override the summarization model.
    #[arg(long)]
    summary_model: Option<String>,

    /// Override the flashcard model.
    #[arg(long)]
    flashcard_model: Option<String>,

    /// Override the chat model.
    #[arg(long)]
    chat_model: Option<String>,
}

#[derive(Clone)]
struct AppState {
    config: Arc<StudyConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut builder = StudyConfig::builder();
    if let Some(key) = args.api_key.clone() {
        builder = builder.api_key(key);
    }
    if let Some(model) = args.summary_model.clone() {
        builder = builder.summary_model(model);
    }
    if let Some(model) = args.flashcard_model.clone() {
        builder = builder.flashcard_model(model);
    }
    if let Some(model) = args.chat_model.clone() {
        builder = builder.chat_model(model);
    }
    let config = builder.build()?;

    let state = AppState {
        config: Arc::new(config),
    };
    let app = router(state, args.max_upload_mb);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(addr = %args.bind, "docstudy server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState, max_upload_mb: usize) -> Router {
    Router::new()
        .route("/api/summarize", post(summarize_handler))
        .route("/api/flashcards", post(flashcards_handler))
        .route("/api/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_upload_mb * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn summarize_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let form = read_form(multipart).await?;
    let source = document_source(&form)?;
    let summary = summarize(source, &state.config).await?;
    Ok(Json(json!({ "summary": summary.text })))
}

async fn flashcards_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let form = read_form(multipart).await?;
    let source = document_source(&form)?;
    let set = flashcards(source, &state.config).await?;
    Ok(Json(json!({ "flashcards": set.cards })))
}

async fn chat_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(multipart).await?;

    let question = form.question.clone().unwrap_or_default();
    let history: Vec<ChatTurn> = match form.history.as_deref() {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| AppError(StatusCode::BAD_REQUEST, format!("invalid history: {e}")))?,
        None => Vec::new(),
    };

    // Cached text from a previous extraction wins over re-parsing the
    // document; fall back to whichever document field the form carries.
    let source = match form.pdf_text.as_deref() {
        Some(text) if !text.trim().is_empty() => ChatSource::Text(text.to_string()),
        _ => ChatSource::Document(document_source(&form)?),
    };

    let answer = chat_answer(source, &question, &history, &state.config).await?;
    let body = Body::from_stream(answer.map(|r| r.map_err(axum::BoxError::from)));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response())
}

// ── Multipart form ───────────────────────────────────────────────────────

#[derive(Default)]
struct StudyForm {
    /// Embedded file bytes plus the declared content type.
    pdf: Option<(Vec<u8>, String)>,
    blob_url: Option<String>,
    question: Option<String>,
    pdf_text: Option<String>,
    history: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<StudyForm, AppError> {
    let mut form = StudyForm::default();
    while let Some(field) = multipart.next_field().await.map_err(AppError::from)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "pdf" => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(AppError::from)?;
                form.pdf = Some((bytes.to_vec(), content_type));
            }
            "blobUrl" => form.blob_url = Some(field.text().await.map_err(AppError::from)?),
            "question" => form.question = Some(field.text().await.map_err(AppError::from)?),
            "pdfText" => form.pdf_text = Some(field.text().await.map_err(AppError::from)?),
            "history" => form.history = Some(field.text().await.map_err(AppError::from)?),
            // Unknown fields are ignored so clients can evolve ahead of us.
            _ => {}
        }
    }
    Ok(form)
}

fn document_source(form: &StudyForm) -> Result<DocumentSource, AppError> {
    if let Some(url) = form.blob_url.as_deref() {
        if !url.trim().is_empty() {
            return Ok(DocumentSource::Remote {
                url: url.trim().to_string(),
            });
        }
    }
    if let Some((bytes, content_type)) = &form.pdf {
        return Ok(DocumentSource::Upload {
            bytes: bytes.clone(),
            media_type: content_type.clone(),
        });
    }
    Err(AppError(
        StatusCode::BAD_REQUEST,
        "No PDF file provided".to_string(),
    ))
}

// ── Error mapping ────────────────────────────────────────────────────────

#[derive(Debug)]
struct AppError(StatusCode, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<StudyError> for AppError {
    fn from(e: StudyError) -> Self {
        let status = StatusCode::from_u16(e.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        AppError(status, e.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError(StatusCode::BAD_REQUEST, format!("invalid form data: {e}"))
    }
}
