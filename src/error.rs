//! Error taxonomy for the ingestion and query pipeline.
//!
//! Each stage has its own error type so callers can tell a bad input file
//! apart from a flaky provider or a missing credential:
//!
//! | Error | Raised by | Scope of failure |
//! |-------|-----------|------------------|
//! | [`ExtractionError`] | [`extract`](crate::extract) | one document |
//! | [`EmbeddingError`] | [`embedding`](crate::embedding) | one chunk or one query |
//! | [`GenerationError`] | [`llm`](crate::llm), [`answer`](crate::answer) | one query (sources preserved) |
//! | [`ConfigurationError`] | provider constructors | startup, before any call |
//!
//! [`RagError`] wraps all of them for the orchestrator API.

use thiserror::Error;

use crate::models::Source;

/// A file could not be turned into elements.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported file type: '{0}'")]
    UnsupportedFileType(String),

    #[error("{path} is {size} bytes, above the {limit} byte limit")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF could not be parsed: {0}")]
    Pdf(String),

    #[error("image could not be decoded: {0}")]
    Image(String),

    #[error("OCR failed: {0}")]
    Ocr(String),
}

/// An embedding provider call failed.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider is disabled")]
    Disabled,

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("local embedding failed: {0}")]
    Local(String),
}

/// A chat-completion call failed.
///
/// `sources` holds whatever retrieval produced before the failure so the
/// caller can still show what was found.
#[derive(Debug, Error)]
#[error("{provider} completion failed: {message}")]
pub struct GenerationError {
    pub provider: String,
    pub message: String,
    pub sources: Vec<Source>,
}

impl GenerationError {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
            sources: Vec::new(),
        }
    }

    /// Attach the retrieval results that were computed before the failure.
    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }
}

/// A provider was configured incorrectly. Raised at construction time.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{var} environment variable not set (required by the {provider} provider)")]
    MissingCredential {
        provider: &'static str,
        var: &'static str,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Top-level error for [`RagOrchestrator`](crate::rag::RagOrchestrator) operations.
#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("vector index error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_error_keeps_sources() {
        let src = Source {
            filename: "a.md".to_string(),
            page: Some(2),
            element_type: crate::models::ElementType::Table,
            content: "x | y".to_string(),
            similarity: 0.5,
        };
        let err = GenerationError::new("gemini", "timeout").with_sources(vec![src]);
        assert_eq!(err.sources.len(), 1);
        assert_eq!(err.to_string(), "gemini completion failed: timeout");
    }

    #[test]
    fn missing_credential_names_variable() {
        let err = ConfigurationError::MissingCredential {
            provider: "openai",
            var: "OPENAI_API_KEY",
        };
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
