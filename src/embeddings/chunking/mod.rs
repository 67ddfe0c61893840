
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A slice of document text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// The chunk text
    pub content: String,
    /// Position of this chunk within the document
    pub chunk_index: usize,
    /// Character length of the chunk
    pub char_count: usize,
    /// Rough token estimate, stored alongside the chunk for budget accounting
    pub token_estimate: usize,
}

/// Configuration for splitting document text into chunks.
///
/// Sizes are in characters. Chunking is deterministic: the same text and
/// config always produce the same chunks, which is what makes re-ingestion
/// idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Preferred chunk size
    pub target_chars: usize,
    /// Hard ceiling before forced splitting
    pub max_chars: usize,
    /// Chunks smaller than this are merged into a neighbor when possible
    pub min_chars: usize,
    /// Characters of trailing context repeated at the start of the next chunk
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            target_chars: 900,
            max_chars: 1400,
            min_chars: 200,
            overlap_chars: 0,
        }
    }
}

/// Split document text into embedding-ready chunks.
///
/// Splits at paragraph boundaries first, falling back to sentences and then
/// words for oversized passages, then merges undersized trailing pieces.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<TextChunk> {
    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if char_len(paragraph) > config.max_chars {
            flush(&mut current, &mut pieces);
            for sentence_piece in split_oversized(paragraph, config) {
                append_piece(&mut current, &sentence_piece, config, &mut pieces);
            }
            continue;
        }

        append_piece(&mut current, paragraph, config, &mut pieces);
    }
    flush(&mut current, &mut pieces);

    let pieces = merge_small_pieces(pieces, config);
    let pieces = apply_overlap(pieces, config);

    let chunks: Vec<TextChunk> = pieces
        .into_iter()
        .enumerate()
        .map(|(chunk_index, content)| {
            let char_count = char_len(&content);
            let token_estimate = estimate_token_count(&content);
            TextChunk {
                content,
                chunk_index,
                char_count,
                token_estimate,
            }
        })
        .collect();

    debug!(
        "Chunked {} chars of text into {} chunks",
        char_len(text),
        chunks.len()
    );

    chunks
}

/// Rough token estimate: roughly one token per four characters of English text
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    char_len(text).div_ceil(4)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Append a paragraph-or-smaller piece to the running buffer, flushing the
/// buffer first when the addition would push it past the target size.
fn append_piece(current: &mut String, piece: &str, config: &ChunkingConfig, out: &mut Vec<String>) {
    let addition = char_len(piece) + if current.is_empty() { 0 } else { 2 };
    if !current.is_empty() && char_len(current) + addition > config.target_chars {
        flush(current, out);
    }

    if !current.is_empty() {
        current.push_str("\n\n");
    }
    current.push_str(piece);
}

fn flush(current: &mut String, out: &mut Vec<String>) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
    current.clear();
}

/// Break an oversized paragraph at sentence boundaries, then words
fn split_oversized(paragraph: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(paragraph) {
        if char_len(&sentence) > config.max_chars {
            flush(&mut current, &mut pieces);
            pieces.extend(split_words(&sentence, config));
            continue;
        }

        if !current.is_empty() && char_len(&current) + char_len(&sentence) + 1 > config.target_chars
        {
            flush(&mut current, &mut pieces);
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
    }
    flush(&mut current, &mut pieces);

    pieces
}

/// Simple sentence boundary detection on terminal punctuation
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

/// Last resort for pathological sentences: split on whitespace
fn split_words(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && char_len(&current) + char_len(word) + 1 > config.target_chars {
            pieces.push(current.clone());
            current.clear();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

/// Fold undersized pieces into their predecessor where the result stays under
/// the ceiling, so a document does not end in a fragment too small to retrieve
fn merge_small_pieces(pieces: Vec<String>, config: &ChunkingConfig) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(pieces.len());

    for piece in pieces {
        if char_len(&piece) < config.min_chars {
            if let Some(previous) = merged.last_mut() {
                if char_len(previous) + char_len(&piece) + 2 <= config.max_chars {
                    previous.push_str("\n\n");
                    previous.push_str(&piece);
                    continue;
                }
            }
        }
        merged.push(piece);
    }

    merged
}

/// Prepend the word-aligned tail of the previous chunk when overlap is enabled
fn apply_overlap(mut pieces: Vec<String>, config: &ChunkingConfig) -> Vec<String> {
    if config.overlap_chars == 0 || pieces.len() < 2 {
        return pieces;
    }

    for i in (1..pieces.len()).rev() {
        let tail = trailing_words(&pieces[i - 1], config.overlap_chars);
        if !tail.is_empty() {
            pieces[i] = format!("{}\n\n{}", tail, pieces[i]);
        }
    }

    pieces
}

fn trailing_words(text: &str, budget_chars: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut taken: Vec<&str> = Vec::new();
    let mut used = 0_usize;

    for word in words.iter().rev() {
        let cost = char_len(word) + usize::from(!taken.is_empty());
        if used + cost > budget_chars {
            break;
        }
        taken.push(word);
        used += cost;
    }

    if taken.len() == words.len() {
        // The whole chunk would repeat; overlap adds nothing here
        return String::new();
    }

    taken.reverse();
    taken.join(" ")
}
