//! Byte source resolution: normalise heterogeneous inputs into raw bytes.
//!
//! A request carries its document either as an embedded upload or as a URL
//! into a remote object store. Both collapse here into one in-memory byte
//! buffer so the extractor sees a single shape. The media-type check applies
//! only to direct uploads — a blob URL was produced by an upload path that
//! already validated the content type, so a second check would only reject
//! stores that serve PDFs under a generic content type.
//!
//! Large documents are expected to arrive via the blob path; the server caps
//! the embedded-payload size, but that is the caller's sizing policy, not
//! enforced here.

use crate::config::StudyConfig;
use crate::error::StudyError;
use tracing::{debug, info};

/// Declared media type a direct upload must carry.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Where a request's document bytes come from. Exactly one per request.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// Bytes embedded in the request, with the declared media type.
    Upload { bytes: Vec<u8>, media_type: String },
    /// A URL into the remote object store; fetched with one outbound call.
    Remote { url: String },
}

/// Resolve a source to raw document bytes.
///
/// Upload: validates the declared media type is `application/pdf`.
/// Remote: one HTTP GET with the configured timeout; a non-2xx status or a
/// transport failure is a [`StudyError::Fetch`].
pub async fn resolve(source: DocumentSource, config: &StudyConfig) -> Result<Vec<u8>, StudyError> {
    match source {
        DocumentSource::Upload { bytes, media_type } => {
            if media_type != PDF_MEDIA_TYPE {
                return Err(StudyError::UnsupportedMediaType { media_type });
            }
            debug!(size = bytes.len(), "using direct upload");
            Ok(bytes)
        }
        DocumentSource::Remote { url } => fetch_remote(&url, config.fetch_timeout_secs).await,
    }
}

async fn fetch_remote(url: &str, timeout_secs: u64) -> Result<Vec<u8>, StudyError> {
    info!(%url, "fetching document from blob storage");

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| StudyError::Internal(format!("http client: {e}")))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| StudyError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(StudyError::Fetch {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| StudyError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    debug!(size = bytes.len(), "fetched document bytes");
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_with_pdf_media_type_passes_through() {
        let config = StudyConfig::default();
        let source = DocumentSource::Upload {
            bytes: b"%PDF-1.5 fake".to_vec(),
            media_type: PDF_MEDIA_TYPE.to_string(),
        };
        let bytes = tokio_test::block_on(resolve(source, &config)).unwrap();
        assert_eq!(bytes, b"%PDF-1.5 fake");
    }

    #[test]
    fn upload_with_other_media_type_is_rejected() {
        let config = StudyConfig::default();
        let source = DocumentSource::Upload {
            bytes: vec![1, 2, 3],
            media_type: "image/png".to_string(),
        };
        let err = tokio_test::block_on(resolve(source, &config)).unwrap_err();
        match err {
            StudyError::UnsupportedMediaType { media_type } => {
                assert_eq!(media_type, "image/png")
            }
            other => panic!("expected UnsupportedMediaType, got {other:?}"),
        }
        // 400 at the boundary: the caller sent the wrong thing.
        assert_eq!(
            StudyError::UnsupportedMediaType {
                media_type: "image/png".into()
            }
            .status_code(),
            400
        );
    }

    #[tokio::test]
    async fn unreachable_remote_is_a_fetch_error() {
        let config = StudyConfig::builder().fetch_timeout_secs(1).build().unwrap();
        let source = DocumentSource::Remote {
            // Reserved TEST-NET-1 address; nothing listens there.
            url: "http://192.0.2.1:9/doc.pdf".to_string(),
        };
        let err = resolve(source, &config).await.unwrap_err();
        assert!(matches!(err, StudyError::Fetch { .. }), "got {err:?}");
    }
}
