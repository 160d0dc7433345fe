//! Sentence chunking for streamed synthesis
//!
//! Responses are synthesized in 2-sentence chunks so playback can start
//! before generation finishes. A sentence ends at `.`, `!`, or `?`
//! followed by whitespace or end of text; a trailing fragment with no
//! terminator is flushed as its own chunk.

use std::sync::OnceLock;

use regex::Regex;

/// Sentences grouped per chunk
pub const SENTENCES_PER_CHUNK: usize = 2;

fn boundary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?](\s+|$)").unwrap())
}

/// Split `text` into sentences, terminators kept
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in boundary_regex().find_iter(text) {
        let sentence = text[start..m.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        start = m.end();
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Group sentences into playback chunks.
///
/// Full groups hold [`SENTENCES_PER_CHUNK`] sentences; the final group
/// holds whatever remains, including a bare fragment.
pub fn chunk_text(text: &str) -> Vec<String> {
    split_sentences(text)
        .chunks(SENTENCES_PER_CHUNK)
        .map(|group| group.join(" "))
        .collect()
}

/// Iterator over `(chunk, is_final)` pairs, terminated by `("", true)`.
///
/// The terminal marker always appears exactly once, even for empty input,
/// so consumers can rely on a two-phase completion signal.
pub struct ChunkStream {
    chunks: std::vec::IntoIter<String>,
    pending: Option<String>,
    done: bool,
}

impl ChunkStream {
    pub fn new(text: &str) -> Self {
        let mut chunks = chunk_text(text).into_iter();
        let pending = chunks.next();
        Self {
            chunks,
            pending,
            done: false,
        }
    }
}

impl Iterator for ChunkStream {
    type Item = (String, bool);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.pending.take() {
            Some(chunk) => {
                self.pending = self.chunks.next();
                Some((chunk, false))
            }
            None => {
                self.done = true;
                Some((String::new(), true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminators() {
        let sentences = split_sentences("Hello there. How are you? Great!");
        assert_eq!(sentences, vec!["Hello there.", "How are you?", "Great!"]);
    }

    #[test]
    fn decimal_points_do_not_split() {
        let sentences = split_sentences("It costs 3.50 dollars. Cheap!");
        assert_eq!(sentences, vec!["It costs 3.50 dollars.", "Cheap!"]);
    }

    #[test]
    fn groups_two_sentences_per_chunk() {
        let chunks = chunk_text("One. Two. Three. Four. Five.");
        assert_eq!(chunks, vec!["One. Two.", "Three. Four.", "Five."]);
    }

    #[test]
    fn flushes_trailing_fragment() {
        let chunks = chunk_text("Done. And then some trailing words");
        assert_eq!(chunks, vec!["Done. And then some trailing words"]);

        let chunks = chunk_text("A. B. and a tail");
        assert_eq!(chunks, vec!["A. B.", "and a tail"]);
    }

    #[test]
    fn stream_ends_with_terminal_marker() {
        let items: Vec<_> = ChunkStream::new("One. Two. Three.").collect();
        assert_eq!(
            items,
            vec![
                ("One. Two.".to_string(), false),
                ("Three.".to_string(), false),
                (String::new(), true),
            ]
        );
    }

    #[test]
    fn empty_input_still_terminates() {
        let items: Vec<_> = ChunkStream::new("").collect();
        assert_eq!(items, vec![(String::new(), true)]);
    }
}
