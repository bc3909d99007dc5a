//! Error taxonomy for ingestion and question answering.
//!
//! Every variant renders as a message suitable for showing to the person who
//! started the batch or asked the question.

use thiserror::Error;

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error)]
pub enum RagError {
    /// A URL could not be retrieved.
    #[error("Failed to fetch '{url}': {message}")]
    Fetch { url: String, message: String },

    /// A PDF (or other uploaded file) produced no usable text.
    #[error("Failed to extract text from '{filename}': {message}")]
    Extraction { filename: String, message: String },

    /// Embedding or inserting a unit's chunks failed.
    #[error("Indexing failed: {0}")]
    Index(String),

    /// Embedding the query or searching the collection failed.
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// A question was asked before any collection was opened or populated.
    #[error("No vector store initialized; ingest documents first")]
    NotInitialized,

    #[error("Please enter a question")]
    EmptyQuery,

    #[error("At most {max} URLs can be processed at once (got {given})")]
    TooManyUrls { given: usize, max: usize },

    #[error("Nothing to ingest: provide at least one URL or file")]
    NoInput,

    #[error("Configuration error: {0}")]
    Config(String),

    /// The language model backend failed.
    #[error("Language model error: {0}")]
    Model(String),
}

impl RagError {
    pub fn fetch(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn extraction(filename: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Extraction {
            filename: filename.into(),
            message: message.to_string(),
        }
    }

    pub fn index(err: impl std::fmt::Display) -> Self {
        Self::Index(err.to_string())
    }

    pub fn retrieval(err: impl std::fmt::Display) -> Self {
        Self::Retrieval(err.to_string())
    }

    pub fn model(err: impl std::fmt::Display) -> Self {
        Self::Model(err.to_string())
    }
}
