//! Boundary-aware text chunking with overlap.
//!
//! Documents are split on blank lines into paragraphs, which are greedily
//! packed into chunks of at most `chunk_size` characters. Paragraphs that
//! cannot fit in any chunk are split into sentences and packed the same way.
//! Every flushed chunk seeds the next one with its trailing `chunk_overlap`
//! characters.
//!
//! All sizes are counted in characters (Unicode scalar values), an
//! approximation of token counts.

use crate::types::{Document, TextChunk};

pub use pitchsim_core::ChunkingSettings as ChunkOptions;

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const SENTENCE_SEPARATOR: &str = " ";

/// Chunk a single document.
///
/// Never fails: empty or whitespace-only input yields no chunks, and input
/// no longer than `chunk_size` yields exactly one chunk. A trailing buffer
/// shorter than `min_chunk_size` is dropped.
///
/// An overlap of `chunk_size` or more is clamped to `chunk_size - 1`.
pub fn chunk_text(text: &str, source: &str, options: &ChunkOptions) -> Vec<TextChunk> {
    let cleaned = normalize(text);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let mut sink = ChunkSink::new(source);

    if char_len(&cleaned) <= options.chunk_size {
        sink.emit(&cleaned);
        return sink.finish();
    }

    let overlap = options
        .chunk_overlap
        .min(options.chunk_size.saturating_sub(1));
    let mut buffer = Accumulator::new(PARAGRAPH_SEPARATOR);

    for paragraph in cleaned.split(PARAGRAPH_SEPARATOR) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let paragraph_len = char_len(paragraph);

        if buffer.would_overflow(paragraph_len, options.chunk_size)
            && buffer.len() >= options.min_chunk_size
        {
            buffer.flush_with_overlap(&mut sink, overlap);
        }

        if paragraph_len > options.chunk_size {
            chunk_sentences(paragraph, &mut sink, options, overlap);
            buffer.clear();
            continue;
        }

        buffer.push(paragraph);
    }

    if buffer.len() >= options.min_chunk_size {
        sink.emit(buffer.as_str());
    }

    let chunks = sink.finish();

    tracing::debug!(
        "Chunked '{}' into {} chunks (size: {}, overlap: {}, min: {})",
        source,
        chunks.len(),
        options.chunk_size,
        overlap,
        options.min_chunk_size
    );

    chunks
}

/// Chunk several documents independently and concatenate the results.
///
/// Each document restarts `chunk_index` at 0 and gets its own `total_chunks`.
pub fn chunk_documents(documents: &[Document], options: &ChunkOptions) -> Vec<TextChunk> {
    documents
        .iter()
        .flat_map(|doc| chunk_text(&doc.content, &doc.filename, options))
        .collect()
}

/// Pack the sentences of an over-long paragraph into chunks.
fn chunk_sentences(paragraph: &str, sink: &mut ChunkSink<'_>, options: &ChunkOptions, overlap: usize) {
    let mut buffer = Accumulator::new(SENTENCE_SEPARATOR);

    for sentence in split_sentences(paragraph) {
        if buffer.would_overflow(char_len(sentence), options.chunk_size)
            && buffer.len() >= options.min_chunk_size
        {
            buffer.flush_with_overlap(sink, overlap);
        }
        buffer.push(sentence);
    }

    if buffer.len() >= options.min_chunk_size {
        sink.emit(buffer.as_str());
    }
}

/// Split text after runs of sentence terminators (`.`, `!`, `?`).
///
/// Terminators stay attached to their sentence. Trailing text without a
/// terminator becomes the last sentence, so text with no terminator at all
/// comes back whole.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if !is_terminator(ch) {
            continue;
        }

        let mut end = idx + ch.len_utf8();
        while let Some(&(next_idx, next)) = chars.peek() {
            if !is_terminator(next) {
                break;
            }
            end = next_idx + next.len_utf8();
            chars.next();
        }

        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = end;
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }

    sentences
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

/// Unify line endings to `\n` and trim.
fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The last `count` characters of `text` (all of it if shorter).
fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match text.char_indices().rev().nth(count - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// Running chunk buffer joined by a fixed separator.
struct Accumulator {
    text: String,
    chars: usize,
    separator: &'static str,
}

impl Accumulator {
    fn new(separator: &'static str) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            separator,
        }
    }

    fn len(&self) -> usize {
        self.chars
    }

    fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether appending `piece_len` characters plus a separator exceeds `limit`.
    ///
    /// The separator is counted even for an empty buffer.
    fn would_overflow(&self, piece_len: usize, limit: usize) -> bool {
        self.chars + piece_len + char_len(self.separator) > limit
    }

    fn push(&mut self, piece: &str) {
        if !self.text.is_empty() {
            self.text.push_str(self.separator);
            self.chars += char_len(self.separator);
        }
        self.text.push_str(piece);
        self.chars += char_len(piece);
    }

    fn clear(&mut self) {
        self.text.clear();
        self.chars = 0;
    }

    /// Emit the buffer as a chunk and restart it with its own trimmed tail.
    fn flush_with_overlap(&mut self, sink: &mut ChunkSink<'_>, overlap: usize) {
        sink.emit(&self.text);
        let seed = tail_chars(&self.text, overlap).trim().to_string();
        self.chars = char_len(&seed);
        self.text = seed;
    }
}

/// Collects chunks for one source, numbering them in emission order.
struct ChunkSink<'a> {
    source: &'a str,
    chunks: Vec<TextChunk>,
}

impl<'a> ChunkSink<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chunks: Vec::new(),
        }
    }

    fn emit(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.chunks.push(TextChunk {
            text: text.to_string(),
            source: self.source.to_string(),
            chunk_index: self.chunks.len() as u32,
            total_chunks: 0,
        });
    }

    fn finish(mut self) -> Vec<TextChunk> {
        let total = self.chunks.len() as u32;
        for chunk in &mut self.chunks {
            chunk.total_chunks = total;
        }
        self.chunks
    }
}
