//! Answer generation: retrieve, prompt, complete, attribute.
//!
//! 1. [`retrieval_depth`] picks `k` from the question wording.
//! 2. The question is embedded and the top-`k` chunks are retrieved.
//! 3. [`build_prompt`] "stuffs" every chunk into one prompt as
//!    `Content:` / `Source:` pairs and asks for a trailing `SOURCES:` line.
//! 4. [`parse_completion`] separates the answer from the raw sources line.
//! 5. [`dedup_sources`] turns the raw line into a sorted, duplicate-free list.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::llm::ChatModel;
use crate::models::RetrievedChunk;
use crate::store::VectorStore;

/// Shown instead of a source list when the model cited nothing.
pub const NO_SOURCES: &str = "No sources found.";

/// The generated answer and the deduplicated sources it cites.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<String>,
    /// Number of chunks requested from the store.
    pub k: usize,
}

impl AnswerResult {
    /// Sources one per line, or [`NO_SOURCES`].
    pub fn formatted_sources(&self) -> String {
        if self.sources.is_empty() {
            NO_SOURCES.to_string()
        } else {
            self.sources.join("\n")
        }
    }
}

/// Reject blank questions.
pub fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(RagError::EmptyQuery);
    }
    Ok(trimmed)
}

/// Number of chunks to retrieve: `summary_k` when the lowercased question
/// mentions any summary keyword, `default_k` otherwise.
pub fn retrieval_depth(question: &str, config: &RetrievalConfig) -> usize {
    let lowered = question.to_lowercase();
    let wants_summary = config
        .summary_keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && lowered.contains(&keyword.to_lowercase()));
    if wants_summary {
        config.summary_k
    } else {
        config.default_k
    }
}

pub fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> String {
    let mut passages = String::new();
    for chunk in chunks {
        passages.push_str(&format!(
            "Content: {}\nSource: {}\n\n",
            chunk.text,
            chunk.source()
        ));
    }

    format!(
        r#"Given the following extracted parts of long documents and a question, create a final answer with references ("SOURCES").
If you don't know the answer, just say that you don't know. Don't try to make up an answer.
Use only the passages below. ALWAYS end your answer with a line of the form
SOURCES: <source>, <source>
listing the Source values of the passages you used, separated by commas.

QUESTION: {question}
=========
{passages}=========
FINAL ANSWER:"#,
        question = question,
        passages = passages
    )
}

fn sources_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"(?i)SOURCES?:").expect("static regex is valid"))
}

/// Split a completion into `(answer, raw_sources)`.
///
/// The answer is everything before the first `SOURCE:`/`SOURCES:` marker
/// (any case); the raw sources are the first line after it. Without a
/// marker the whole completion is the answer and the sources are empty.
pub fn parse_completion(completion: &str) -> (String, String) {
    match sources_marker().find(completion) {
        Some(marker) => {
            let answer = completion[..marker.start()].trim().to_string();
            let raw_sources = completion[marker.end()..]
                .trim_start_matches([' ', '\t'])
                .lines()
                .next()
                .unwrap_or("")
                .trim()
                .to_string();
            (answer, raw_sources)
        }
        None => (completion.trim().to_string(), String::new()),
    }
}

/// Split on commas, trim, drop empty entries, deduplicate. Output is sorted.
pub fn dedup_sources(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Newline-joined [`dedup_sources`], or [`NO_SOURCES`].
pub fn format_sources(raw: &str) -> String {
    let sources = dedup_sources(raw);
    if sources.is_empty() {
        NO_SOURCES.to_string()
    } else {
        sources.join("\n")
    }
}

/// Answer `question` from the chunks in `store`.
pub async fn generate_answer(
    question: &str,
    config: &RetrievalConfig,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    model: &dyn ChatModel,
) -> Result<AnswerResult> {
    let question = validate_question(question)?;
    let k = retrieval_depth(question, config);

    let query_vec = embedder
        .embed_query(question)
        .await
        .map_err(RagError::retrieval)?;
    let chunks = store
        .similarity_search(&query_vec, k)
        .await
        .map_err(RagError::retrieval)?;
    tracing::debug!(k, retrieved = chunks.len(), "retrieved chunks");

    let prompt = build_prompt(question, &chunks);
    let completion = model.complete(&prompt).await.map_err(RagError::model)?;
    let (answer, raw_sources) = parse_completion(&completion);

    Ok(AnswerResult {
        answer,
        sources: dedup_sources(&raw_sources),
        k,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, SOURCE_KEY};

    #[test]
    fn summary_questions_retrieve_more() {
        let config = RetrievalConfig::default();
        assert_eq!(retrieval_depth("Summarize the findings", &config), 35);
        assert_eq!(retrieval_depth("Give me a SUMMARY please", &config), 35);
        assert_eq!(retrieval_depth("What is the interest rate?", &config), 20);
    }

    #[test]
    fn sources_are_deduplicated_one_per_line() {
        assert_eq!(format_sources("A.pdf, B.pdf, A.pdf"), "A.pdf\nB.pdf");
        assert_eq!(format_sources(""), NO_SOURCES);
        assert_eq!(format_sources(" , ,"), NO_SOURCES);
    }

    #[test]
    fn completion_split_at_marker() {
        let (answer, raw) =
            parse_completion("Rates rose to 6.8%.\nSOURCES: https://a.com, b.pdf\nextra");
        assert_eq!(answer, "Rates rose to 6.8%.");
        assert_eq!(raw, "https://a.com, b.pdf");

        let (answer, raw) = parse_completion("It depends.\nSource: a.pdf");
        assert_eq!(answer, "It depends.");
        assert_eq!(raw, "a.pdf");
    }

    #[test]
    fn completion_without_marker_has_no_sources() {
        let (answer, raw) = parse_completion("  I don't know.  ");
        assert_eq!(answer, "I don't know.");
        assert_eq!(raw, "");
    }

    #[test]
    fn prompt_lists_each_passage_with_its_source() {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), "report.pdf".to_string());
        let chunk = RetrievedChunk {
            id: "1".to_string(),
            text: "Prices fell.".to_string(),
            metadata,
            score: 0.9,
        };
        let prompt = build_prompt("What happened?", &[chunk]);
        assert!(prompt.contains("QUESTION: What happened?"));
        assert!(prompt.contains("Content: Prices fell.\nSource: report.pdf"));
        assert!(prompt.contains("SOURCES:"));
    }

    #[test]
    fn blank_question_rejected() {
        assert!(matches!(validate_question("   "), Err(RagError::EmptyQuery)));
        assert_eq!(validate_question(" hi ").unwrap(), "hi");
    }

    #[test]
    fn formatted_sources_fallback() {
        let result = AnswerResult {
            answer: "x".into(),
            sources: vec![],
            k: 20,
        };
        assert_eq!(result.formatted_sources(), NO_SOURCES);
    }
}
