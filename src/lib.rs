//! # WebQuery RAG
//!
//! A small retrieval-augmented question-answering pipeline: ingest web pages
//! or PDFs, index them into a vector store, and answer questions from the
//! most similar chunks with the sources the answer drew on.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Loaders    │──▶│   Pipeline   │──▶│ Vector store │
//! │  URL / PDF  │   │ Split+Embed  │   │   (SQLite)   │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │ top-k
//!                                             ▼
//!                   ┌──────────────┐   ┌──────────────┐
//!                   │   CLI (wq)   │◀──│    Answer    │
//!                   │              │   │ LLM+sources  │
//!                   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Library use
//!
//! ```rust,no_run
//! use webquery_rag::config::Config;
//! use webquery_rag::context::RagContext;
//! use webquery_rag::loader::SourceBatch;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut ctx = RagContext::new(Config::default())?;
//!
//! {
//!     let mut run = ctx.ingest(
//!         SourceBatch::Urls(vec!["https://example.com/rates".into()]),
//!         true,
//!     );
//!     while let Some(status) = run.next().await {
//!         println!("{}", status);
//!     }
//! }
//!
//! let result = ctx.answer("What is the current mortgage rate?").await?;
//! println!("{}\n\n{}", result.answer, result.formatted_sources());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`chunk`] | Recursive text splitting |
//! | [`loader`] | URL and PDF loaders |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store abstraction and backends |
//! | [`llm`] | Language model backends |
//! | [`ingest`] | Pull-based ingestion pipeline |
//! | [`answer`] | Retrieval depth, prompting, source attribution |
//! | [`context`] | Component ownership and lifecycle |
//! | [`progress`] | Ingestion progress reporting |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod store;

pub use error::{RagError, Result};
