//! PDF text extraction: byte buffer in, flat validated text out.
//!
//! The walk is deliberately simple: pages in page-number order, and within
//! each page the text-showing operators (`Tj`, `'`, `"`, `TJ`) in content-
//! stream order. That ordering is the only guarantee — there is no layout or
//! column reconstruction, because the downstream consumer is a language
//! model, not a human reading a two-column paper.
//!
//! Failure policy mirrors the rest of the pipeline: one parse attempt,
//! structural failures are terminal. The sole local recovery is per-run
//! decoding — a run whose payload cannot be decoded contributes its raw
//! bytes instead of aborting the document — and the analogous skip of a
//! single page whose content stream will not decode.

use lopdf::content::Content;
use lopdf::{Document, Object};
use tracing::{debug, warn};

use crate::config::StudyConfig;
use crate::error::StudyError;
use crate::output::ExtractedText;

/// Extract the text of a PDF held in memory.
///
/// Returns [`ExtractedText`] (page order, in-page run order, runs separated
/// by single spaces, trimmed) or a typed failure:
///
/// - [`StudyError::EncryptedDocument`] — the document carries an `Encrypt`
///   entry, or the parser diagnostic indicates encryption
/// - [`StudyError::MalformedDocument`] — the parser cannot process the
///   structure at all
/// - [`StudyError::ExtractionInsufficient`] — parsed, but fewer than
///   `config.min_extract_chars` characters of text came out
pub fn extract(bytes: &[u8], config: &StudyConfig) -> Result<ExtractedText, StudyError> {
    if has_encrypt_marker(bytes) {
        return Err(StudyError::EncryptedDocument);
    }

    let doc = Document::load_mem(bytes).map_err(classify_parse_error)?;

    let pages = doc.get_pages();
    debug!(pages = pages.len(), "walking page tree");

    let mut accumulator = String::new();
    for (page_no, page_id) in &pages {
        let data = match doc.get_page_content(*page_id) {
            Ok(d) => d,
            Err(e) => {
                warn!(page = page_no, error = %e, "skipping unreadable page content");
                continue;
            }
        };
        let content = match Content::decode(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!(page = page_no, error = %e, "skipping undecodable content stream");
                continue;
            }
        };

        for operation in &content.operations {
            match operation.operator.as_str() {
                // Tj and ' take the string as their only/first operand
                "Tj" | "'" => {
                    if let Some(Object::String(raw, _)) = operation.operands.first() {
                        push_run(&mut accumulator, raw);
                    }
                }
                // " takes (word-spacing, char-spacing, string)
                "\"" => {
                    if let Some(Object::String(raw, _)) = operation.operands.last() {
                        push_run(&mut accumulator, raw);
                    }
                }
                // TJ interleaves strings with kerning adjustments
                "TJ" => {
                    if let Some(Object::Array(items)) = operation.operands.first() {
                        for item in items {
                            if let Object::String(raw, _) = item {
                                push_run(&mut accumulator, raw);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    let text = accumulator.trim().to_string();
    let chars = text.chars().count();
    if chars < config.min_extract_chars {
        let detail = if text.is_empty() {
            "the document contains no text runs".to_string()
        } else {
            format!(
                "only {chars} characters of text were found; \
                 the file might be an image-based PDF or corrupted"
            )
        };
        return Err(StudyError::ExtractionInsufficient { chars, detail });
    }

    debug!(chars, "extraction complete");
    Ok(ExtractedText::new(text))
}

/// Append one decoded run plus its separating space.
fn push_run(accumulator: &mut String, raw: &[u8]) {
    let run = decode_run(raw);
    if !run.is_empty() {
        accumulator.push_str(&run);
        accumulator.push(' ');
    }
}

/// Decode one run payload.
///
/// UTF-16BE payloads (BOM-prefixed) are transcoded; everything else is read
/// as UTF-8 with lossy fallback, then percent-decoded. A failed percent
/// decode falls back to the raw text unmodified — run decoding is never
/// fatal to extraction.
fn decode_run(raw: &[u8]) -> String {
    if raw.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = raw[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    let text = String::from_utf8_lossy(raw);
    match urlencoding::decode(&text) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => text.into_owned(),
    }
}

/// Spot an `Encrypt` trailer entry in the raw bytes, before parsing.
///
/// The parser runs an empty-password decryption pass during load and drops
/// the trailer entry when it succeeds, so a loaded document never reports
/// itself encrypted — the marker has to be read off the file tail, where the
/// trailer of a classic-xref PDF lives. Content streams earlier in the file
/// may legitimately contain the byte sequence, hence the bounded window.
fn has_encrypt_marker(bytes: &[u8]) -> bool {
    const TRAILER_WINDOW: usize = 2048;
    const MARKER: &[u8] = b"/Encrypt";
    let tail = &bytes[bytes.len().saturating_sub(TRAILER_WINDOW)..];
    tail.windows(MARKER.len()).any(|w| w == MARKER)
}

/// Map a parser failure to the user-facing taxonomy.
///
/// Encryption a trailer scan misses (cross-reference-stream files keep their
/// trailer dictionary elsewhere) still surfaces when the parse fails with a
/// diagnostic mentioning encryption/decryption.
fn classify_parse_error(e: lopdf::Error) -> StudyError {
    classify_parse_detail(e.to_string())
}

fn classify_parse_detail(detail: String) -> StudyError {
    let lower = detail.to_lowercase();
    if lower.contains("encrypt") || lower.contains("decrypt") || lower.contains("password") {
        StudyError::EncryptedDocument
    } else {
        StudyError::MalformedDocument { detail }
    }
}
