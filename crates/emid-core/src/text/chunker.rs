//! Recursive character splitting into overlapping chunks.

use std::collections::VecDeque;

use tracing::{debug, warn};

/// Separators tried in order, coarsest first. The empty separator splits
/// into single characters and always succeeds.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text into chunks of at most `chunk_size` characters, with up to
/// `chunk_overlap` characters carried over between neighbours.
///
/// Lengths are counted in characters, not bytes.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text`. Blank input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chunks = self.split_with(text, &SEPARATORS);
        debug!(
            "Split {} chars into {} chunks (size={}, overlap={})",
            char_len(text),
            chunks.len(),
            self.chunk_size,
            self.chunk_overlap
        );
        chunks
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }

        chunks
    }

    /// Greedily pack pieces into chunks, keeping a tail of the previous chunk
    /// as the head of the next one.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { separator_len };

            if total + len + joiner > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of {} chars, longer than the configured {}",
                        total, self.chunk_size
                    );
                }

                if !window.is_empty() {
                    if let Some(chunk) = join(&window, separator) {
                        chunks.push(chunk);
                    }

                    while total > self.chunk_overlap
                        || (total > 0 && total + len + joiner > self.chunk_size)
                    {
                        let Some(front) = window.pop_front() else {
                            break;
                        };
                        let trailing = if window.is_empty() { 0 } else { separator_len };
                        total = total.saturating_sub(char_len(front) + trailing);
                    }
                }
            }

            window.push_back(piece);
            total += len;
            if window.len() > 1 {
                total += separator_len;
            }
        }

        if let Some(chunk) = join(&window, separator) {
            chunks.push(chunk);
        }

        chunks
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(512, 32)
    }
}

fn join(window: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = TextSplitter::default();
        let text = "Name: JOHN SMITH\nID Number: 784-1990-1234567-1";
        assert_eq!(splitter.split(text), vec![text.to_string()]);
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        let splitter = TextSplitter::default();
        assert!(splitter.split("").is_empty());
        assert!(splitter.split(" \n\n ").is_empty());
    }

    #[test]
    fn test_character_split_with_overlap() {
        let splitter = TextSplitter::new(10, 2);
        assert_eq!(
            splitter.split("abcdefghijklmnopqrstuvwxyz"),
            vec!["abcdefghij", "ijklmnopqr", "qrstuvwxyz"]
        );
    }

    #[test]
    fn test_prefers_line_breaks() {
        let splitter = TextSplitter::new(20, 0);
        let text = "Name: JOHN SMITH\nNationality: USA\nSponsor: ACME";
        assert_eq!(
            splitter.split(text),
            vec!["Name: JOHN SMITH", "Nationality: USA", "Sponsor: ACME"]
        );
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let splitter = TextSplitter::new(32, 8);
        let text = "Profession: SENIOR SOFTWARE ENGINEER Sponsor: EXAMPLE TRADING LLC Place of Issue: DUBAI";
        let chunks = splitter.split(text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 32, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let splitter = TextSplitter::new(4, 0);
        assert_eq!(splitter.split("éééééééé"), vec!["éééé", "éééé"]);
    }

    #[test]
    fn test_overlap_clamped_below_size() {
        let splitter = TextSplitter::new(8, 50);
        assert_eq!(splitter.chunk_overlap(), 7);
    }
}
