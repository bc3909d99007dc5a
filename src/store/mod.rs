//! Vector store abstraction.
//!
//! A [`VectorStore`] is a handle on one named collection: a set of
//! [`IndexEntry`] rows (id, text, vector, metadata) that can be emptied,
//! appended to, and searched by cosine similarity.
//!
//! Backends:
//! - [`SqliteStore`](sqlite::SqliteStore) persists entries in a SQLite file
//!   under the configured store directory. Used by the CLI.
//! - [`InMemoryStore`](memory::InMemoryStore) keeps entries in a `Vec`
//!   behind a lock. Used by tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::models::{IndexEntry, RetrievedChunk};

/// One collection of indexed chunks.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`reset`](VectorStore::reset) | Delete every entry in the collection |
/// | [`add_entries`](VectorStore::add_entries) | Insert entries, all or nothing |
/// | [`similarity_search`](VectorStore::similarity_search) | Top-k entries by cosine similarity |
/// | [`count`](VectorStore::count) | Number of entries |
/// | [`contains`](VectorStore::contains) | Whether an id is present |
/// | [`sources`](VectorStore::sources) | Distinct sources with entry counts |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name of the collection this handle operates on.
    fn collection(&self) -> &str;

    async fn reset(&self) -> Result<()>;

    /// Insert every entry or none of them.
    async fn add_entries(&self, entries: &[IndexEntry]) -> Result<()>;

    /// Return at most `k` entries ordered by descending similarity.
    ///
    /// Fails when stored vectors have a different width than `query_vec`,
    /// which happens when the embedding model changed since ingestion.
    async fn similarity_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievedChunk>>;

    async fn count(&self) -> Result<i64>;

    async fn contains(&self, id: &str) -> Result<bool>;

    /// Distinct `source` values and how many entries each has, sorted by source.
    async fn sources(&self) -> Result<Vec<(String, i64)>>;
}

/// Open (creating if needed) the persistent collection described by `config`.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn VectorStore>> {
    let store = sqlite::SqliteStore::open(&config.db_path(), &config.collection).await?;
    Ok(Arc::new(store))
}

/// Reject a stored vector whose width differs from the query's.
pub(crate) fn check_dims(query: usize, stored: usize) -> Result<()> {
    if query != stored {
        anyhow::bail!(
            "query embedding has {} dimensions but the collection holds {} dimensions; \
             re-ingest with the current embedding model",
            query,
            stored
        );
    }
    Ok(())
}

/// Sort scored entries by descending similarity and keep the first `k`.
pub(crate) fn rank(mut candidates: Vec<RetrievedChunk>, k: usize) -> Vec<RetrievedChunk> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(k);
    candidates
}
