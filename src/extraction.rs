//! Text-extraction collaborator boundary.
//!
//! The pipeline treats extraction as an opaque capability: bytes in, text
//! out. PDF and OCR engines live behind this trait in other crates; the
//! implementation shipped here handles plain UTF-8 documents.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by extraction collaborators.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Extraction produced no usable text.
    #[error("no text could be extracted from the document")]
    Empty,
    /// Document bytes could not be interpreted.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

/// Interface implemented by text-extraction backends.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from raw document bytes.
    async fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}

/// Extractor for documents that are already plain UTF-8 text.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|error| ExtractionError::InvalidDocument(error.to_string()))?;
        if text.trim().is_empty() {
            return Err(ExtractionError::Empty);
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_utf8_text() {
        let text = PlainTextExtractor
            .extract("A document body.".as_bytes())
            .await
            .expect("text");
        assert_eq!(text, "A document body.");
    }

    #[tokio::test]
    async fn rejects_empty_documents() {
        let error = PlainTextExtractor
            .extract(b"   \n  ")
            .await
            .expect_err("empty");
        assert!(matches!(error, ExtractionError::Empty));
    }

    #[tokio::test]
    async fn rejects_non_utf8_bytes() {
        let error = PlainTextExtractor
            .extract(&[0xff, 0xfe, 0x00])
            .await
            .expect_err("binary");
        assert!(matches!(error, ExtractionError::InvalidDocument(_)));
    }
}
