//! Page-aware chunking for Tier 1 requests.
//!
//! Whole pages are packed into chunks up to `max_chars`. A page that is
//! larger than the limit on its own is split recursively at paragraph,
//! line, sentence, and word boundaries, and only as a last resort
//! mid-word. Sizes are measured in characters.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default maximum characters per chunk.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 12_000;

/// `--- Page 12 ---` style markers emitted by the text extractor.
static PAGE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^[ \t]*-{2,}[ \t]*page[ \t]+\d+[ \t]*-{2,}[ \t]*$").unwrap());

/// A bounded slice of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// 1-based page range covered by this chunk.
    pub first_page: usize,
    pub last_page: usize,
}

/// Packs pages into chunks of at most `max_chars` characters.
pub struct PageChunker {
    pub max_chars: usize,
    separators: Vec<&'static str>,
}

impl PageChunker {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
            separators: vec!["\n\n", "\n", ". ", " "],
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let mut pieces: Vec<(String, usize, usize)> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_size = 0usize;
        let mut current_first = 1usize;
        let mut current_last = 1usize;
        let joiner = "\n\n";

        for (i, page) in split_pages(text).into_iter().enumerate() {
            let page_no = i + 1;
            let page = page.trim();
            if page.is_empty() {
                continue;
            }
            let size = char_len(page);

            if size > self.max_chars {
                if !current.is_empty() {
                    pieces.push((current.join(joiner), current_first, current_last));
                    current.clear();
                    current_size = 0;
                }
                for part in self.split_oversized(page, &self.separators) {
                    pieces.push((part, page_no, page_no));
                }
            } else if !current.is_empty() && current_size + joiner.len() + size > self.max_chars {
                pieces.push((current.join(joiner), current_first, current_last));
                current = vec![page];
                current_size = size;
                current_first = page_no;
                current_last = page_no;
            } else {
                if current.is_empty() {
                    current_first = page_no;
                    current_size = size;
                } else {
                    current_size += joiner.len() + size;
                }
                current.push(page);
                current_last = page_no;
            }
        }
        if !current.is_empty() {
            pieces.push((current.join(joiner), current_first, current_last));
        }

        let pieces: Vec<_> = pieces
            .into_iter()
            .filter(|(t, _, _)| !t.trim().is_empty())
            .collect();
        let total = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (text, first_page, last_page))| TextChunk {
                text,
                chunk_index,
                total_chunks: total,
                first_page,
                last_page: last_page.max(first_page),
            })
            .collect()
    }

    fn split_oversized(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        if char_len(text) <= self.max_chars {
            return vec![text.to_string()];
        }
        let Some((separator, remaining)) = separators.split_first() else {
            return hard_split(text, self.max_chars);
        };
        let separator: &str = separator;

        let mut chunks = Vec::new();
        let mut current_parts: Vec<&str> = Vec::new();
        let mut current_size = 0usize;
        let sep_len = separator.len();

        for split in text.split(separator) {
            let split_size = char_len(split);
            if split_size > self.max_chars {
                if !current_parts.is_empty() {
                    chunks.push(current_parts.join(separator));
                    current_parts.clear();
                    current_size = 0;
                }
                chunks.extend(self.split_oversized(split, remaining));
            } else if !current_parts.is_empty() && current_size + sep_len + split_size > self.max_chars {
                chunks.push(current_parts.join(separator));
                current_parts = vec![split];
                current_size = split_size;
            } else {
                if !current_parts.is_empty() {
                    current_size += sep_len;
                }
                current_parts.push(split);
                current_size += split_size;
            }
        }
        if !current_parts.is_empty() {
            chunks.push(current_parts.join(separator));
        }
        chunks.retain(|c| !c.trim().is_empty());
        chunks
    }
}

impl Default for PageChunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_CHARS)
    }
}

/// Split on form feeds and page markers. The marker stays at the top of
/// the page it introduces.
pub fn split_pages(text: &str) -> Vec<&str> {
    let mut pages = Vec::new();
    for sheet in text.split('\u{000C}') {
        let mut start = 0;
        for m in PAGE_MARKER.find_iter(sheet) {
            if m.start() > start {
                pages.push(&sheet[start..m.start()]);
            }
            start = m.start();
        }
        pages.push(&sheet[start..]);
    }
    pages
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect::<String>())
        .collect()
}
