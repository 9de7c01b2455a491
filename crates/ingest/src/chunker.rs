//! Sentence-aware text chunking.
//!
//! Long statutes are split into overlapping windows before embedding so each
//! vector covers a focused passage. Sizes are counted in characters, never
//! bytes, so multi-byte scripts are never cut mid-codepoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub enabled: bool,
    /// Target window length in characters.
    pub chunk_size: usize,
    /// Characters repeated at the start of the next window.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than zero".into());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }
        Ok(())
    }
}

/// One window of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Byte offset of the window start in the source text.
    pub start: usize,
    /// Byte offset one past the window end.
    pub end: usize,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            overlap: overlap.min(size - 1),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Splits `text` into trimmed, non-empty windows.
    ///
    /// Text no longer than the window comes back as a single chunk.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let n = chars.len();
        let byte_at = |pos: usize| chars.get(pos).map_or(text.len(), |&(b, _)| b);

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < n {
            let mut end = (start + self.size).min(n);
            if end < n {
                end = self.split_point(&chars, start, end);
            }

            let (from, to) = (byte_at(start), byte_at(end));
            let body = text[from..to].trim();
            if !body.is_empty() {
                chunks.push(Chunk {
                    text: body.to_string(),
                    start: from,
                    end: to,
                    index: chunks.len(),
                });
            }

            if end >= n {
                break;
            }
            start = end.saturating_sub(self.overlap).max(start + 1);
        }
        chunks
    }

    // Prefer a sentence end in the back half of the window, then whitespace,
    // then a hard cut at `end`.
    fn split_point(&self, chars: &[(usize, char)], start: usize, end: usize) -> usize {
        let floor = start + self.size / 2;
        let window = floor..end;
        let after = |pred: fn(char) -> bool| {
            window
                .clone()
                .rev()
                .find(|&i| pred(chars[i].1))
                .map(|i| i + 1)
        };
        after(|c| matches!(c, '.' | '?' | '!' | '\n'))
            .or_else(|| after(char::is_whitespace))
            .filter(|&cut| cut > start)
            .unwrap_or(end)
    }
}
