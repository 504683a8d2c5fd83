use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// Shards shorter than this are dropped by the loose splitter.
const MIN_LOOSE_CHARS: usize = 10;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid pattern"));
static BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid pattern"));
static LOOSE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.;:]\s+|\n{1,2}|[•▪●]\s+").expect("valid pattern"));

pub trait SentenceSplitter {
    fn split(&self, text: &str) -> Vec<String>;
}

/// UAX #29 sentence boundaries.
///
/// Line wraps are folded into spaces first; PDF text breaks lines mid-sentence
/// and a bare newline would otherwise end a sentence.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeSplitter;

impl SentenceSplitter for UnicodeSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        let flat = WHITESPACE_RUN.replace_all(text, " ");
        flat.unicode_sentences()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Aggressive splitter for badly extracted text: punctuation, line breaks and
/// bullet glyphs all end a shard.
#[derive(Debug, Clone, Copy, Default)]
pub struct LooseSplitter;

impl SentenceSplitter for LooseSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        let text = text.replace('\r', "\n");
        let text = BLANKS.replace_all(&text, " ");

        let mut shards = Vec::new();
        let mut start = 0;
        for m in LOOSE_BOUNDARY.find_iter(&text) {
            // sentence punctuation stays with the shard it ends
            let end = match m.as_str().chars().next() {
                Some(c @ ('.' | ';' | ':')) => m.start() + c.len_utf8(),
                _ => m.start(),
            };
            shards.push(&text[start..end]);
            start = m.end();
        }
        shards.push(&text[start..]);

        shards
            .into_iter()
            .map(str::trim)
            .filter(|s| s.chars().count() >= MIN_LOOSE_CHARS)
            .map(str::to_string)
            .collect()
    }
}
