//! Typographic cleanup of extracted PDF text.
//! Folds ligatures such as "ﬁ" into plain letters and drops soft hyphens.
use unicode_normalization::UnicodeNormalization;

const SOFT_HYPHEN: char = '\u{00AD}';

/// Alphabetic presentation forms (ligatures) block.
fn is_presentation_form(c: char) -> bool {
    matches!(c as u32, 0xFB00..=0xFB4F)
}

/// Apply NFKC to presentation forms only; everything else is left untouched
/// so that superscripts, fractions and full-width digits keep their shape.
pub fn fold_presentation_forms(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        if c == SOFT_HYPHEN {
            continue;
        }
        if is_presentation_form(c) {
            result.extend(std::iter::once(c).nfkc());
        } else {
            result.push(c);
        }
    }
    result
}
