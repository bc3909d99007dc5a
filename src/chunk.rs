//! Recursive separator-based text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `chunk_size` characters
//! that overlap their predecessor by up to `chunk_overlap` characters.
//! Lengths are counted in `char`s, so multi-byte text is never cut inside a
//! code point.
//!
//! # Algorithm
//!
//! 1. Pick the first separator (in configured order) that occurs in the text.
//! 2. Split on it, keeping the separator at the end of each piece so that
//!    sentence punctuation stays with its sentence.
//! 3. Merge consecutive pieces that fit into a sliding window. When the next
//!    piece would overflow `chunk_size`, emit the window and drop pieces from
//!    its front until what is left is at most `chunk_overlap` characters.
//! 4. Pieces that are themselves longer than `chunk_size` are split again
//!    with the remaining separators.
//! 5. With no separator left, cut hard every `chunk_size - chunk_overlap`
//!    characters. This is logged, not fatal.
//!
//! Emitted chunks are whitespace-trimmed and blank chunks are dropped.
//!
//! # Example
//!
//! ```rust
//! use webquery_rag::chunk::TextSplitter;
//!
//! let splitter = TextSplitter::new(20, 5, vec![".".into(), " ".into()]).unwrap();
//! let chunks = splitter.split_text("Sentence one. Sentence two. Sentence three.");
//! assert_eq!(chunks, vec!["Sentence one.", "Sentence two.", "Sentence three."]);
//! ```

use std::collections::VecDeque;

use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use crate::models::{Chunk, Document};

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Create a splitter. `chunk_overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize, separators: Vec<String>) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be > 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(
            config.chunk_size,
            config.chunk_overlap,
            config.separators.clone(),
        )
    }

    /// Split one text into chunk strings, in text order.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.split_recursive(text, &self.separators, &mut out);
        out
    }

    /// Split every document, preserving input order. Each chunk carries a
    /// copy of its document's metadata and its index within that document.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.text)
                    .into_iter()
                    .enumerate()
                    .map(move |(i, text)| Chunk {
                        chunk_index: i as i64,
                        text,
                        metadata: doc.metadata.clone(),
                    })
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String], out: &mut Vec<String>) {
        let found = separators
            .iter()
            .position(|sep| !sep.is_empty() && text.contains(sep.as_str()));

        let Some(i) = found else {
            if char_len(text) <= self.chunk_size {
                push_trimmed(out, text);
            } else {
                self.hard_cut(text, out);
            }
            return;
        };

        let remaining = &separators[i + 1..];
        let mut fitting: Vec<&str> = Vec::new();

        for piece in text.split_inclusive(separators[i].as_str()) {
            if char_len(piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                self.merge(&fitting, out);
                fitting.clear();
            }
            self.split_recursive(piece, remaining, out);
        }

        if !fitting.is_empty() {
            self.merge(&fitting, out);
        }
    }

    /// Greedily pack pieces (each at most `chunk_size`) into chunks.
    fn merge(&self, pieces: &[&str], out: &mut Vec<String>) {
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(out, &join(&window));
                // Keep a tail of at most chunk_overlap chars that still
                // leaves room for the incoming piece.
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        if !window.is_empty() {
            push_trimmed(out, &join(&window));
        }
    }

    fn hard_cut(&self, text: &str, out: &mut Vec<String>) {
        let chars: Vec<char> = text.chars().collect();
        tracing::warn!(
            len = chars.len(),
            chunk_size = self.chunk_size,
            "no separator splits this text within bounds; cutting at character boundaries"
        );

        let step = self.chunk_size - self.chunk_overlap;
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(chars.len());
            let piece: String = chars[start..end].iter().collect();
            if !piece.trim().is_empty() {
                out.push(piece);
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join(window: &VecDeque<(&str, usize)>) -> String {
    window.iter().map(|(piece, _)| *piece).collect()
}

fn push_trimmed(out: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_separators() -> Vec<String> {
        ChunkingConfig::default().separators
    }

    fn splitter(size: usize, overlap: usize) -> TextSplitter {
        TextSplitter::new(size, overlap, default_separators()).unwrap()
    }

    #[test]
    fn sentences_split_on_periods() {
        let chunks = splitter(20, 5).split_text("Sentence one. Sentence two. Sentence three.");
        assert_eq!(
            chunks,
            vec!["Sentence one.", "Sentence two.", "Sentence three."]
        );
    }

    #[test]
    fn small_text_single_chunk() {
        let chunks = splitter(500, 100).split_text("Hello, world!");
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn empty_and_blank_text_produce_nothing() {
        assert!(splitter(50, 10).split_text("").is_empty());
        assert!(splitter(50, 10).split_text(" \n\n \n").is_empty());
    }

    #[test]
    fn overlap_carries_whole_trailing_pieces() {
        let chunks = splitter(9, 3).split_text("aa bb cc dd ee ff");
        assert_eq!(chunks, vec!["aa bb cc", "cc dd ee", "ee ff"]);
    }

    #[test]
    fn paragraphs_preferred_over_lines() {
        let chunks = splitter(15, 0).split_text("First para.\n\nSecond para.");
        assert_eq!(chunks, vec!["First para.", "Second para."]);
    }

    #[test]
    fn oversized_paragraph_falls_through_to_words() {
        let chunks = splitter(10, 0).split_text("one two three four five six\n\nseven");
        assert_eq!(chunks, vec!["one two", "three", "four five", "six", "seven"]);
    }

    #[test]
    fn hard_cut_when_no_separator_fits() {
        let chunks = splitter(10, 2).split_text("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(chunks, vec!["abcdefghij", "ijklmnopqr", "qrstuvwxyz"]);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().skip(8).collect();
            let head: String = pair[1].chars().take(2).collect();
            assert_eq!(tail, head, "hard-cut chunks overlap by exactly 2 chars");
        }
    }

    #[test]
    fn never_exceeds_chunk_size() {
        let text = (0..200)
            .map(|i| format!("Satz Nummer {} über Größe und Überlappung.", i))
            .collect::<Vec<_>>()
            .join(" ");
        for (size, overlap) in [(40, 10), (64, 0), (100, 30), (17, 16)] {
            let chunks = splitter(size, overlap).split_text(&text);
            assert!(!chunks.is_empty());
            for c in &chunks {
                assert!(
                    c.chars().count() <= size,
                    "chunk of {} chars exceeds {}: {:?}",
                    c.chars().count(),
                    size,
                    c
                );
            }
        }
    }

    #[test]
    fn multibyte_hard_cut_stays_on_char_boundaries() {
        let text = "┌──────────────────┐";
        let chunks = splitter(6, 1).split_text(text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 6);
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap_text() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let chunks = splitter(24, 8).split_text(text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(
                pair[1].starts_with(last_word),
                "{:?} should start with the tail of {:?}",
                pair[1],
                pair[0]
            );
        }
    }

    #[test]
    fn documents_keep_order_and_metadata() {
        let docs = vec![
            Document::new("Alpha one. Alpha two. Alpha three.", "a.pdf"),
            Document::new("Beta.", "https://example.com/b").with_metadata("title", "B"),
        ];
        let chunks = splitter(15, 0).split_documents(&docs);

        let sources: Vec<_> = chunks.iter().map(|c| c.source().unwrap()).collect();
        assert_eq!(sources, vec!["a.pdf", "a.pdf", "a.pdf", "https://example.com/b"]);

        let indices: Vec<_> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 0]);

        assert_eq!(chunks[3].metadata.get("title").map(String::as_str), Some("B"));
    }

    #[test]
    fn rejects_invalid_sizes() {
        assert!(TextSplitter::new(0, 0, default_separators()).is_err());
        assert!(TextSplitter::new(10, 10, default_separators()).is_err());
        assert!(TextSplitter::new(10, 9, default_separators()).is_ok());
    }
}
