use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::types::{Chunk, Document};

/// How the text is cut into pieces before chunks are assembled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Split on the configured separator and greedily merge the pieces.
    /// A single piece longer than `chunk_size` is kept whole.
    #[default]
    Separator,
    /// Fixed windows of `chunk_size` characters sharing exactly
    /// `chunk_overlap` characters with their neighbours.
    Characters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separator: String,
    pub mode: SplitMode,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            chunk_overlap: 20,
            separator: "\n\n".to_owned(),
            mode: SplitMode::Separator,
        }
    }
}

impl SplitterConfig {
    /// # Errors
    ///
    /// Returns `ConfigurationError` when `chunk_size` is zero or the overlap is
    /// not strictly smaller than the chunk size.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.chunk_size == 0 {
            return Err(ConfigurationError::ZeroChunkSize);
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigurationError::OverlapTooLarge {
                chunk_overlap: self.chunk_overlap,
                chunk_size: self.chunk_size,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})")]
    OverlapTooLarge {
        chunk_overlap: usize,
        chunk_size: usize,
    },
}

/// Splits text into overlapping chunks. Lengths are counted in `char`s.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns `ConfigurationError` if `config` fails [`SplitterConfig::validate`].
    pub fn new(config: SplitterConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        match self.config.mode {
            SplitMode::Separator => {
                let pieces: Vec<&str> = text
                    .split(self.config.separator.as_str())
                    .filter(|piece| !piece.is_empty())
                    .collect();
                self.merge_pieces(&pieces)
            }
            SplitMode::Characters => {
                split_chars(text, self.config.chunk_size, self.config.chunk_overlap)
            }
        }
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.content)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                content,
                metadata: document.metadata.clone(),
                chunk_index: i,
            })
            .collect()
    }

    /// Greedily joins pieces with the separator. When the next piece does not fit,
    /// the current window is emitted and pieces are dropped from its front until
    /// what remains is within the overlap and leaves room for the next piece.
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;
        let separator = self.config.separator.as_str();
        let sep_len = separator.chars().count();

        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = piece.chars().count();
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + len + joiner > size && !window.is_empty() {
                emit_window(&mut chunks, &window, separator, total, size);

                while total > overlap
                    || (total > 0
                        && total + len + if window.is_empty() { 0 } else { sep_len } > size)
                {
                    let Some((_, first_len)) = window.pop_front() else {
                        break;
                    };
                    total -= first_len + if window.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back((piece, len));
        }

        if !window.is_empty() {
            emit_window(&mut chunks, &window, separator, total, size);
        }

        chunks
    }
}

fn emit_window(
    chunks: &mut Vec<String>,
    window: &VecDeque<(&str, usize)>,
    separator: &str,
    total: usize,
    chunk_size: usize,
) {
    if total > chunk_size {
        tracing::warn!(
            chunk_len = total,
            chunk_size,
            "piece longer than chunk_size kept as an oversized chunk"
        );
    }
    let joined = window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_owned());
    }
}

fn split_chars(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
