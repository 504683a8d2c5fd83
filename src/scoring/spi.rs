use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::config::SpiRules;
use crate::core::model::Sentence;
use crate::core::text::normalize_year_tokens;

static DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").expect("valid digit pattern"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecificitySignals {
    pub num: bool,
    pub unit: bool,
    pub target: bool,
    pub baseline: bool,
}

impl SpecificitySignals {
    pub fn detect(sentence: &str, rules: &SpiRules) -> Self {
        let text = normalize_year_tokens(sentence);
        Self {
            num: DIGIT.is_match(&text),
            unit: rules.unit.any_match(&text),
            target: rules.target.any_match(&text),
            baseline: rules.baseline.any_match(&text),
        }
    }

    pub fn count(&self) -> usize {
        [self.num, self.unit, self.target, self.baseline]
            .iter()
            .filter(|&&s| s)
            .count()
    }
}

/// Rule-based specificity of a single sentence.
///
/// A number next to a strict-exclude construct (page refs, footnotes) is never
/// specific. Otherwise a number plus any unit/target/baseline cue is, and
/// failing that two of the four signals are required.
pub fn is_specific(sentence: &str, rules: &SpiRules) -> bool {
    let signals = SpecificitySignals::detect(sentence, rules);

    if signals.num {
        let text = normalize_year_tokens(sentence);
        if rules.strict_excludes.any_match(&text) {
            return false;
        }
        if signals.unit || signals.target || signals.baseline {
            return true;
        }
    }

    signals.count() >= 2
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecificityResult {
    pub specific: usize,
    pub total: usize,
    pub spi_rule: f64,
}

pub fn compute_spi_rule(sentences: &[Sentence], rules: &SpiRules) -> SpecificityResult {
    let total = sentences.len();
    let specific = sentences
        .iter()
        .filter(|s| is_specific(&s.text, rules))
        .count();

    SpecificityResult {
        specific,
        total,
        spi_rule: specific as f64 / total.max(1) as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::shipped_config;

    #[test]
    fn numeric_sentence_with_unit_is_specific() {
        let rules = shipped_config().spi;
        assert!(is_specific(
            "Revenue grew 15% in FY2023 compared to FY2022 baseline",
            &rules
        ));
    }

    #[test]
    fn aspirational_sentence_is_not_specific() {
        let rules = shipped_config().spi;
        assert!(!is_specific("We remain committed to sustainability", &rules));
    }

    #[test]
    fn strict_exclude_vetoes_numbers() {
        let rules = shipped_config().spi;
        assert!(!is_specific("Emissions fell 12% (see page 14)", &rules));
    }

    #[test]
    fn two_signals_without_number_suffice() {
        let rules = shipped_config().spi;
        // target ("net zero") + baseline ("compared to"), no digit
        let text = "Our net zero pathway is compared to peers each year";
        let signals = SpecificitySignals::detect(text, &rules);
        assert!(!signals.num);
        assert_eq!(signals.count(), 2);
        assert!(is_specific(text, &rules));
    }

    #[test]
    fn split_years_count_as_targets() {
        let rules = shipped_config().spi;
        let signals = SpecificitySignals::detect("We plan to be carbon neutral by 2 0 4 0", &rules);
        assert!(signals.num);
        assert!(signals.target);
    }

    #[test]
    fn number_alone_is_not_specific() {
        let rules = shipped_config().spi;
        assert!(!is_specific("We employ 1200 people", &rules));
    }

    #[test]
    fn empty_sentence_list_scores_zero() {
        let rules = shipped_config().spi;
        let result = compute_spi_rule(&[], &rules);
        assert_eq!(result.total, 0);
        assert_eq!(result.specific, 0);
        assert_eq!(result.spi_rule, 0.0);
    }

    #[test]
    fn ratio_over_all_sentences() {
        let rules = shipped_config().spi;
        let sentences = vec![
            Sentence::new("Scope 1 emissions fell 20% against the 2019 baseline."),
            Sentence::new("We strive to do better."),
            Sentence::new("Water use dropped to 3.2 m3 per tonne."),
            Sentence::new("Our people matter."),
        ];
        let result = compute_spi_rule(&sentences, &rules);
        assert_eq!(result.specific, 2);
        assert_eq!(result.total, 4);
        assert_eq!(result.spi_rule, 0.5);
    }
}
