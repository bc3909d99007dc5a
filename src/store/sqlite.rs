//! SQLite-backed [`VectorStore`] implementation.
//!
//! All collections share one `entries` table, partitioned by the
//! `collection` column. Vectors are stored as little-endian `f32` BLOBs and
//! scored in process; there is no ANN index.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::{check_dims, rank, VectorStore};
use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::migrate;
use crate::models::{IndexEntry, Metadata, RetrievedChunk, SOURCE_KEY};

pub struct SqliteStore {
    pool: SqlitePool,
    collection: String,
}

impl SqliteStore {
    /// Connect to the database at `db_path`, creating file and schema as needed.
    pub async fn open(db_path: &Path, collection: &str) -> Result<Self> {
        let pool = db::connect(db_path).await?;
        migrate::run_migrations(&pool).await?;
        tracing::debug!(path = %db_path.display(), collection, "vector store opened");
        Ok(Self::new(pool, collection))
    }

    pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn reset(&self) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM entries WHERE collection = ?")
            .bind(&self.collection)
            .execute(&self.pool)
            .await?
            .rows_affected();
        tracing::debug!(collection = %self.collection, deleted, "collection reset");
        Ok(())
    }

    async fn add_entries(&self, entries: &[IndexEntry]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for entry in entries {
            let metadata_json = serde_json::to_string(&entry.metadata)?;
            let source = entry.metadata.get(SOURCE_KEY).cloned().unwrap_or_default();

            sqlx::query(
                r#"
                INSERT INTO entries (id, collection, chunk_index, text, source,
                                     metadata_json, embedding, dims, hash, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.id)
            .bind(&self.collection)
            .bind(entry.chunk_index)
            .bind(&entry.text)
            .bind(&source)
            .bind(&metadata_json)
            .bind(vec_to_blob(&entry.vector))
            .bind(entry.vector.len() as i64)
            .bind(&entry.hash)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn similarity_search(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let rows = sqlx::query(
            "SELECT id, text, metadata_json, embedding, dims FROM entries WHERE collection = ?",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let candidates = rows
            .iter()
            .map(|row| {
                let id: String = row.get("id");
                let dims: i64 = row.get("dims");
                check_dims(query_vec.len(), dims as usize)?;

                let blob: Vec<u8> = row.get("embedding");
                let metadata_json: String = row.get("metadata_json");
                let metadata: Metadata = serde_json::from_str(&metadata_json)
                    .with_context(|| format!("corrupt metadata for entry {}", id))?;
                Ok(RetrievedChunk {
                    id,
                    text: row.get("text"),
                    metadata,
                    score: cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(rank(candidates, k))
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM entries WHERE collection = ? AND id = ?",
        )
        .bind(&self.collection)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn sources(&self) -> Result<Vec<(String, i64)>> {
        let rows = sqlx::query(
            "SELECT source, COUNT(*) AS n FROM entries \
             WHERE collection = ? GROUP BY source ORDER BY source",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("source"), row.get("n")))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, source: &str, vector: Vec<f32>) -> IndexEntry {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.to_string());
        metadata.insert("title".to_string(), format!("Title {}", id));
        IndexEntry {
            id: id.to_string(),
            chunk_index: 0,
            text: format!("text of {}", id),
            vector,
            metadata,
            hash: "h".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_search_and_reset() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("db/vs.sqlite"), "c1")
            .await
            .unwrap();

        store
            .add_entries(&[
                entry("a", "one.pdf", vec![1.0, 0.0]),
                entry("b", "two.pdf", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        assert!(store.contains("a").await.unwrap());

        let hits = store.similarity_search(&[0.9, 0.1], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        assert_eq!(hits[0].source(), "one.pdf");
        assert_eq!(
            hits[0].metadata.get("title").map(String::as_str),
            Some("Title a")
        );

        store.reset().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vs.sqlite");
        let first = SqliteStore::open(&path, "first").await.unwrap();
        let second = SqliteStore::open(&path, "second").await.unwrap();

        first.add_entries(&[entry("a", "x", vec![1.0])]).await.unwrap();
        second.add_entries(&[entry("b", "y", vec![1.0])]).await.unwrap();

        first.reset().await.unwrap();
        assert_eq!(first.count().await.unwrap(), 0);
        assert_eq!(second.count().await.unwrap(), 1);
        assert_eq!(second.sources().await.unwrap(), vec![("y".to_string(), 1)]);
    }

    #[tokio::test]
    async fn search_rejects_mismatched_width() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("vs.sqlite"), "c")
            .await
            .unwrap();
        store
            .add_entries(&[entry("a", "one.pdf", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        let err = store.similarity_search(&[1.0, 0.0], 5).await.unwrap_err();
        assert!(err.to_string().contains("3 dimensions"), "{}", err);
        assert_eq!(store.similarity_search(&[1.0, 0.0, 0.0], 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_metadata_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("vs.sqlite"), "c")
            .await
            .unwrap();
        store
            .add_entries(&[entry("a", "one.pdf", vec![1.0])])
            .await
            .unwrap();
        sqlx::query("UPDATE entries SET metadata_json = '{not json' WHERE id = 'a'")
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store.similarity_search(&[1.0], 1).await.unwrap_err();
        assert!(err.to_string().contains("corrupt metadata for entry a"), "{}", err);
    }

    #[tokio::test]
    async fn failed_batch_inserts_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteStore::open(&tmp.path().join("vs.sqlite"), "c")
            .await
            .unwrap();

        let result = store
            .add_entries(&[entry("dup", "x", vec![1.0]), entry("dup", "x", vec![1.0])])
            .await;
        assert!(result.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
