//! Ingestion pipeline: load → split → embed → insert, one unit at a time.
//!
//! An [`IngestRun`] is a caller-driven state machine. Each call to
//! [`IngestRun::next`] first performs the work of the state announced by the
//! previous call, then announces the next state:
//!
//! ```text
//! Initializing ─▶ Loading(1) ─▶ Splitting(1) ─▶ Indexing(1) ─▶ Loading(2) ─▶ … ─▶ Complete
//!       │               │              │               │
//!       └───────────────┴──────────────┴───────────────┴──▶ Failed
//! ```
//!
//! After `Complete` or `Failed` the run yields `None`. A run that is dropped
//! early simply stops; units already indexed stay indexed.
//!
//! Each unit's entries are inserted in one transaction, so a failing unit
//! leaves nothing behind. Earlier units of the same batch are kept.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::chunk::TextSplitter;
use crate::context::{Components, RagContext};
use crate::embedding;
use crate::error::{RagError, Result};
use crate::loader::{DocumentLoader, SourceBatch};
use crate::models::{Chunk, Document, IndexEntry};

/// One step of an ingestion run, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum IngestStatus {
    Initializing,
    Loading { unit: usize, total: usize },
    Splitting { unit: usize, total: usize },
    Indexing { unit: usize, total: usize, chunks: usize },
    Complete { units: usize, chunks: usize },
    Failed { message: String },
}

impl IngestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngestStatus::Complete { .. } | IngestStatus::Failed { .. })
    }
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestStatus::Initializing => write!(f, "Initializing components"),
            IngestStatus::Loading { unit, total } => {
                write!(f, "Loading data (unit {}/{})", unit, total)
            }
            IngestStatus::Splitting { unit, total } => {
                write!(f, "Splitting data (unit {}/{})", unit, total)
            }
            IngestStatus::Indexing {
                unit,
                total,
                chunks,
            } => write!(
                f,
                "Saving data to vector DB (unit {}/{}, {} chunks)",
                unit, total, chunks
            ),
            IngestStatus::Complete { units, chunks } => write!(
                f,
                "Complete: indexed {} chunks from {} unit(s)",
                chunks, units
            ),
            IngestStatus::Failed { message } => write!(f, "Failed: {}", message),
        }
    }
}

enum State {
    Start,
    Initializing,
    Loading(usize),
    Splitting(usize),
    Indexing(usize),
    Done,
}

/// A pull-based ingestion batch. See the module docs.
pub struct IngestRun<'a> {
    ctx: &'a mut RagContext,
    batch: Option<SourceBatch>,
    reset: bool,
    state: State,
    components: Option<Components>,
    splitter: TextSplitter,
    units: Vec<Box<dyn DocumentLoader>>,
    documents: Vec<Document>,
    chunks: Vec<Chunk>,
    indexed: usize,
}

impl<'a> IngestRun<'a> {
    pub(crate) fn new(ctx: &'a mut RagContext, batch: SourceBatch, reset: bool) -> Self {
        let splitter = ctx.splitter().clone();
        Self {
            ctx,
            batch: Some(batch),
            reset,
            state: State::Start,
            components: None,
            splitter,
            units: Vec::new(),
            documents: Vec::new(),
            chunks: Vec::new(),
            indexed: 0,
        }
    }

    /// Perform the pending step and return the next status, or `None` once
    /// a terminal status has been returned.
    pub async fn next(&mut self) -> Option<IngestStatus> {
        let state = std::mem::replace(&mut self.state, State::Done);
        match self.step(state).await {
            Ok(Some((state, status))) => {
                self.state = state;
                Some(status)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "ingestion failed");
                Some(IngestStatus::Failed {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Pull until the run ends, passing every status to `observe`.
    /// Returns the terminal status.
    pub async fn run_to_end(mut self, mut observe: impl FnMut(&IngestStatus)) -> IngestStatus {
        let mut last = IngestStatus::Failed {
            message: "ingestion produced no status".to_string(),
        };
        while let Some(status) = self.next().await {
            observe(&status);
            last = status;
        }
        last
    }

    async fn step(&mut self, state: State) -> Result<Option<(State, IngestStatus)>> {
        let next = match state {
            State::Start => {
                if let Some(batch) = &self.batch {
                    batch.validate(&self.ctx.config().loader)?;
                }
                (State::Initializing, IngestStatus::Initializing)
            }
            State::Initializing => {
                let components = self.ctx.initialize().await?.clone();
                self.components = Some(components);

                let batch = self.batch.take().ok_or(RagError::NoInput)?;
                self.units = batch.into_units(&self.ctx.config().loader)?;
                tracing::info!(units = self.units.len(), reset = self.reset, "ingestion started");
                self.loading(0)
            }
            State::Loading(i) => {
                if i == 0 && self.reset {
                    self.components()?.store.reset().await.map_err(RagError::index)?;
                    tracing::info!("collection reset");
                }
                self.documents = self.load_unit(i).await?;
                (
                    State::Splitting(i),
                    IngestStatus::Splitting {
                        unit: i + 1,
                        total: self.units.len(),
                    },
                )
            }
            State::Splitting(i) => {
                self.chunks = self.splitter.split_documents(&self.documents);
                self.documents.clear();
                tracing::debug!(unit = i + 1, chunks = self.chunks.len(), "split unit");
                (
                    State::Indexing(i),
                    IngestStatus::Indexing {
                        unit: i + 1,
                        total: self.units.len(),
                        chunks: self.chunks.len(),
                    },
                )
            }
            State::Indexing(i) => {
                let chunks = std::mem::take(&mut self.chunks);
                self.index_chunks(i, chunks).await?;
                if i + 1 < self.units.len() {
                    self.loading(i + 1)
                } else {
                    tracing::info!(
                        units = self.units.len(),
                        chunks = self.indexed,
                        "ingestion complete"
                    );
                    (
                        State::Done,
                        IngestStatus::Complete {
                            units: self.units.len(),
                            chunks: self.indexed,
                        },
                    )
                }
            }
            State::Done => return Ok(None),
        };
        Ok(Some(next))
    }

    fn loading(&self, i: usize) -> (State, IngestStatus) {
        (
            State::Loading(i),
            IngestStatus::Loading {
                unit: i + 1,
                total: self.units.len(),
            },
        )
    }

    fn components(&self) -> Result<&Components> {
        self.components.as_ref().ok_or(RagError::NotInitialized)
    }

    async fn load_unit(&self, i: usize) -> Result<Vec<Document>> {
        let unit = &self.units[i];
        tracing::debug!(unit = i + 1, source = %unit.describe(), "loading unit");
        let documents = unit.load().await?;

        if documents.iter().any(|doc| doc.source().is_none()) {
            return Err(RagError::extraction(
                unit.describe(),
                "loader produced a document without a source",
            ));
        }
        Ok(documents)
    }

    async fn index_chunks(&mut self, i: usize, chunks: Vec<Chunk>) -> Result<()> {
        if chunks.is_empty() {
            tracing::info!(unit = i + 1, "unit produced no chunks; nothing to index");
            return Ok(());
        }

        let components = self.components()?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedding::embed_in_batches(
            components.embedder.as_ref(),
            &texts,
            self.ctx.config().embedding.batch_size,
        )
        .await
        .map_err(RagError::index)?;

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry {
                id: Uuid::new_v4().to_string(),
                chunk_index: chunk.chunk_index,
                hash: content_hash(&chunk.text),
                text: chunk.text,
                vector,
                metadata: chunk.metadata,
            })
            .collect();

        components
            .store
            .add_entries(&entries)
            .await
            .map_err(RagError::index)?;

        tracing::debug!(unit = i + 1, entries = entries.len(), "indexed unit");
        self.indexed += entries.len();
        Ok(())
    }
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(IngestStatus::Initializing.to_string(), "Initializing components");
        assert_eq!(
            IngestStatus::Loading { unit: 1, total: 2 }.to_string(),
            "Loading data (unit 1/2)"
        );
        assert_eq!(
            IngestStatus::Indexing {
                unit: 2,
                total: 2,
                chunks: 7
            }
            .to_string(),
            "Saving data to vector DB (unit 2/2, 7 chunks)"
        );
        assert!(IngestStatus::Complete { units: 1, chunks: 0 }.is_terminal());
        assert!(!IngestStatus::Splitting { unit: 1, total: 1 }.is_terminal());
    }

    #[test]
    fn status_serializes_with_phase_tag() {
        let json = serde_json::to_value(IngestStatus::Indexing {
            unit: 1,
            total: 3,
            chunks: 12,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"phase": "indexing", "unit": 1, "total": 3, "chunks": 12})
        );
    }

    #[test]
    fn content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
