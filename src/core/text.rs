use once_cell::sync::Lazy;
use regex::Regex;

static SPLIT_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)2\W*0\W*([0-9])\W*([0-9])").expect("valid year pattern"));

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w+(?:[-/]\w+)?\b").expect("valid word pattern"));

/// Join split-apart years ("2 0 3 0", "2-0-3-0") into "2030".
///
/// A candidate is only rewritten when it is not glued to another digit on
/// either side, so "12 030" or "2030 1" style runs are left alone.
pub fn normalize_year_tokens(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut pos = 0;

    while let Some(caps) = SPLIT_YEAR.captures_at(text, pos) {
        let Some(whole) = caps.get(0) else { break };
        let before = text[..whole.start()].chars().next_back();
        let after = text[whole.end()..].chars().next();

        if before.is_some_and(char::is_numeric) || after.is_some_and(char::is_numeric) {
            // retry one character further, as a look-behind scan would
            let step = text[whole.start()..].chars().next().map_or(1, char::len_utf8);
            pos = whole.start() + step;
            continue;
        }

        out.push_str(&text[copied..whole.start()]);
        out.push_str("20");
        out.push_str(&caps[1]);
        out.push_str(&caps[2]);
        copied = whole.end();
        pos = whole.end();
    }

    out.push_str(&text[copied..]);
    out
}

/// Word tokens, counting hyphen/slash compounds ("net-zero", "and/or") once.
pub fn word_count(text: &str) -> usize {
    WORD.find_iter(text).count()
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
