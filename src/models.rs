//! Core data types that flow through ingestion and retrieval.

use std::collections::BTreeMap;

/// Metadata key holding the provenance of a document (URL or filename).
pub const SOURCE_KEY: &str = "source";

/// String-keyed metadata attached to documents and copied to their chunks.
pub type Metadata = BTreeMap<String, String>;

/// Raw text produced by a loader, before chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    /// Create a document whose only metadata is its `source`.
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.into());
        Self {
            text: text.into(),
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` metadata value, if present and non-empty.
    pub fn source(&self) -> Option<&str> {
        source_of(&self.metadata)
    }
}

/// A bounded piece of a document's text. Identifiers are assigned at
/// indexing time, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position within the parent document, starting at 0.
    pub chunk_index: i64,
    pub text: String,
    pub metadata: Metadata,
}

impl Chunk {
    pub fn source(&self) -> Option<&str> {
        source_of(&self.metadata)
    }
}

/// A chunk as stored in the collection.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub chunk_index: i64,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// A chunk returned by a similarity search.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    /// Cosine similarity to the query vector.
    pub score: f64,
}

impl RetrievedChunk {
    /// The source label shown to the model; empty only for malformed rows.
    pub fn source(&self) -> &str {
        source_of(&self.metadata).unwrap_or("")
    }
}

fn source_of(metadata: &Metadata) -> Option<&str> {
    metadata
        .get(SOURCE_KEY)
        .map(String::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_source_counts_as_missing() {
        let doc = Document::new("text", "   ");
        assert_eq!(doc.source(), None);

        let doc = Document::new("text", "a.pdf").with_metadata("title", "A");
        assert_eq!(doc.source(), Some("a.pdf"));
        assert_eq!(doc.metadata.get("title").map(String::as_str), Some("A"));
    }
}
