//! Overlapping-window splitter for long documents.

use crate::core::config::ChunkingConfig;

/// A window of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    /// Character offset in the original document.
    pub start_offset: usize,
    pub chunk_index: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
        }
    }

    /// `None` when chunking is switched off.
    pub fn from_config(config: &ChunkingConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.chunk_size, config.chunk_overlap))
    }

    pub fn needs_split(&self, text: &str) -> bool {
        text.chars().count() > self.chunk_size
    }

    /// Splits `text` into windows of at most `chunk_size` characters. A
    /// window is cut back to a sentence end when one falls in its last fifth,
    /// and the next window starts `chunk_overlap` characters before that cut,
    /// so every character lands in at least one window.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total_chars {
            let end = (start + self.chunk_size).min(total_chars);
            let kept = if end < total_chars {
                sentence_cut(&chars[start..end])
            } else {
                end - start
            };

            let window: String = chars[start..start + kept].iter().collect();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                chunks.push(TextChunk {
                    text: trimmed.to_string(),
                    start_offset: start,
                    chunk_index: chunks.len(),
                });
            }

            if end == total_chars {
                break;
            }
            start = (start + kept.saturating_sub(self.chunk_overlap)).max(start + 1);
        }

        chunks
    }
}

/// Number of leading characters of `window` to keep: up to and including the
/// last sentence end (punctuation followed by whitespace) in its last fifth,
/// or the whole window when there is none.
fn sentence_cut(window: &[char]) -> usize {
    let search_start = (window.len() * 80) / 100;

    (search_start..window.len().saturating_sub(1))
        .rev()
        .find(|&i| matches!(window[i], '.' | '!' | '?') && window[i + 1].is_whitespace())
        .map(|i| i + 2)
        .unwrap_or(window.len())
}
