use serde::{Deserialize, Serialize};

use crate::core::config::VuiRules;
use crate::core::model::Sentence;
use crate::core::text::word_count;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VagueIndexResult {
    pub vui_hits: usize,
    pub words: usize,
    pub vui_per_1000: f64,
    pub vui_norm: f64,
}

/// Hedge and uncertainty density over a set of sentences.
///
/// Every match of every pattern counts, so one sentence can contribute
/// several hits. The per-1000-words rate is scaled by `divisor_per_1000` and
/// capped at 1.
pub fn compute_vui(sentences: &[Sentence], rules: &VuiRules) -> VagueIndexResult {
    let (words, hits) = sentences.iter().fold((0usize, 0usize), |(words, hits), s| {
        (
            words + word_count(&s.text),
            hits + rules.patterns.count_matches(&s.text),
        )
    });

    let per_1000 = (hits as f64 * 1000.0) / words.max(1) as f64;

    VagueIndexResult {
        vui_hits: hits,
        words,
        vui_per_1000: per_1000,
        vui_norm: (per_1000 / rules.divisor_per_1000).min(1.0),
    }
}
