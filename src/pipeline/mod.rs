//! Pipeline stages for the extraction-and-answer core.
//!
//! Each submodule implements exactly one transformation step. Keeping
//! stages separate makes each independently testable and lets us swap an
//! implementation (e.g. change the PDF parser) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ extract ──▶ shape ──▶ generate ──▶ (relay, chat only)
//! (bytes)    (lopdf)     (prompt)  (model)       (chunk forwarding)
//! ```
//!
//! 1. [`source`]  — resolve an embedded upload or remote blob URL to bytes
//! 2. [`extract`] — walk the PDF content streams into one flat text string,
//!    with the minimum-length validity check
//! 3. [`shape`]   — splice the text into a task prompt under its character
//!    ceiling (prefix truncation only)
//! 4. generation lives in [`crate::tasks`] (blocking) and [`crate::stream`]
//!    (chat); [`postprocess`] recovers the flashcard JSON payload from raw
//!    model output

pub mod extract;
pub mod postprocess;
pub mod shape;
pub mod source;
