//! In-memory [`VectorStore`] implementation for tests.
//!
//! Entries live in a `Vec` behind `std::sync::RwLock`. Search is
//! brute-force cosine similarity over all stored vectors.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{check_dims, rank, VectorStore};
use crate::embedding::cosine_similarity;
use crate::models::{IndexEntry, RetrievedChunk, SOURCE_KEY};

pub struct InMemoryStore {
    collection: String,
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Ids of every stored entry, in insertion order.
    pub fn ids(&self) -> Vec<String> {
        match self.entries.read() {
            Ok(entries) => entries.iter().map(|e| e.id.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn reset(&self) -> Result<()> {
        self.entries.write().map_err(poisoned)?.clear();
        Ok(())
    }

    async fn add_entries(&self, new_entries: &[IndexEntry]) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;

        // Validate the whole batch before touching the collection.
        let mut seen: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        for entry in new_entries {
            if !seen.insert(entry.id.as_str()) {
                bail!("duplicate entry id: {}", entry.id);
            }
        }

        entries.extend(new_entries.iter().cloned());
        Ok(())
    }

    async fn similarity_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let candidates = entries
            .iter()
            .map(|e| {
                check_dims(query_vec.len(), e.vector.len())?;
                Ok(RetrievedChunk {
                    id: e.id.clone(),
                    text: e.text.clone(),
                    metadata: e.metadata.clone(),
                    score: cosine_similarity(query_vec, &e.vector) as f64,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(rank(candidates, k))
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.entries.read().map_err(poisoned)?.len() as i64)
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self
            .entries
            .read()
            .map_err(poisoned)?
            .iter()
            .any(|e| e.id == id))
    }

    async fn sources(&self) -> Result<Vec<(String, i64)>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();
        for entry in entries.iter() {
            let source = entry.metadata.get(SOURCE_KEY).cloned().unwrap_or_default();
            *counts.entry(source).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn entry(id: &str, source: &str, vector: Vec<f32>) -> IndexEntry {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.to_string());
        IndexEntry {
            id: id.to_string(),
            chunk_index: 0,
            text: format!("text of {}", id),
            vector,
            metadata,
            hash: String::new(),
        }
    }

    #[tokio::test]
    async fn search_orders_by_similarity() {
        let store = InMemoryStore::new("test");
        store
            .add_entries(&[
                entry("far", "a.pdf", vec![0.0, 1.0]),
                entry("near", "b.pdf", vec![1.0, 0.1]),
                entry("mid", "a.pdf", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.similarity_search(&[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert_eq!(hits[0].source(), "b.pdf");
    }

    #[tokio::test]
    async fn search_rejects_mismatched_width() {
        let store = InMemoryStore::new("test");
        store.add_entries(&[entry("x", "a", vec![1.0, 0.0])]).await.unwrap();

        assert!(store.similarity_search(&[1.0, 0.0, 0.0], 1).await.is_err());
        assert_eq!(store.similarity_search(&[1.0, 0.0], 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_ids_reject_whole_batch() {
        let store = InMemoryStore::new("test");
        store.add_entries(&[entry("x", "a", vec![1.0])]).await.unwrap();

        let err = store
            .add_entries(&[entry("y", "a", vec![1.0]), entry("x", "a", vec![1.0])])
            .await;
        assert!(err.is_err());
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(!store.contains("y").await.unwrap());
    }

    #[tokio::test]
    async fn reset_empties_collection() {
        let store = InMemoryStore::new("test");
        store
            .add_entries(&[entry("x", "a", vec![1.0]), entry("y", "b", vec![1.0])])
            .await
            .unwrap();
        assert_eq!(
            store.sources().await.unwrap(),
            vec![("a".to_string(), 1), ("b".to_string(), 1)]
        );

        store.reset().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.similarity_search(&[1.0], 5).await.unwrap().is_empty());
    }
}
