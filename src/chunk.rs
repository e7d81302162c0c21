//! Paragraph-boundary text chunker.
//!
//! Splits document text into [`Chunk`]s of roughly `target_size` characters.
//! Paragraphs (separated by `\n\n`) are packed greedily into a buffer;
//! a paragraph that alone exceeds `target_size` is cut into fixed windows
//! that overlap by `overlap` characters. Overlap therefore only exists
//! between windows of the same oversized paragraph, never between packed
//! chunks.
//!
//! Any piece shorter than `min_chunk_chars` is discarded. Lengths are counted
//! in `char`s so Devanagari text is measured the same way as ASCII.
//!
//! Chunk ids are `{document_id}_chunk_{index}`, with indices contiguous over
//! the retained chunks.

use sha2::{Digest, Sha256};

use crate::config::ChunkingConfig;
use crate::models::Chunk;

const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Chunk `text` for `document_id` using the configured sizes.
pub fn chunk_text(document_id: &str, text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    split_text(
        text,
        config.target_size,
        config.overlap,
        config.min_chunk_chars,
    )
    .into_iter()
    .enumerate()
    .map(|(i, piece)| make_chunk(document_id, i as i64, piece))
    .collect()
}

/// Split text into pieces; see the module docs for the rules.
pub fn split_text(
    text: &str,
    target_size: usize,
    overlap: usize,
    min_chars: usize,
) -> Vec<String> {
    let step = target_size.saturating_sub(overlap).max(1);
    let mut pieces = Vec::new();
    let mut buffer = Buffer::default();

    for para in text.split(PARAGRAPH_SEPARATOR) {
        if para.trim().is_empty() {
            continue;
        }
        let para_len = para.chars().count();

        if para_len > target_size {
            buffer.flush_into(&mut pieces, min_chars);

            let chars: Vec<char> = para.chars().collect();
            let mut start = 0;
            while start < chars.len() {
                let end = (start + target_size).min(chars.len());
                if end - start >= min_chars {
                    pieces.push(chars[start..end].iter().collect());
                }
                start += step;
            }
        } else if buffer.len + para_len > target_size {
            // The separator is not counted here; packed chunks may run two
            // characters past target_size.
            buffer.flush_into(&mut pieces, min_chars);
            buffer.push(para, para_len);
        } else {
            buffer.push(para, para_len);
        }
    }

    buffer.flush_into(&mut pieces, min_chars);
    pieces
}

#[derive(Default)]
struct Buffer {
    text: String,
    len: usize,
}

impl Buffer {
    fn push(&mut self, para: &str, para_len: usize) {
        if !self.text.is_empty() {
            self.text.push_str(PARAGRAPH_SEPARATOR);
            self.len += PARAGRAPH_SEPARATOR.len();
        }
        self.text.push_str(para);
        self.len += para_len;
    }

    fn flush_into(&mut self, pieces: &mut Vec<String>, min_chars: usize) {
        if self.len >= min_chars {
            pieces.push(std::mem::take(&mut self.text));
        } else {
            self.text.clear();
        }
        self.len = 0;
    }
}

fn make_chunk(document_id: &str, index: i64, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: format!("{}_chunk_{}", document_id, index),
        document_id: document_id.to_string(),
        chunk_index: index,
        text,
        hash,
    }
}
