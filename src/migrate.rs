use anyhow::Result;
use sqlx::SqlitePool;

/// Create the vector store schema if it does not exist yet.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // One row per indexed chunk; `collection` partitions the table.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            source TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            hash TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_collection ON entries(collection)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_source ON entries(collection, source)")
        .execute(pool)
        .await?;

    Ok(())
}
