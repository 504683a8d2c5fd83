//! Entailment-based specificity: a regex gate in front of an external
//! entailment model.

pub mod bridge;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::model::Sentence;
use crate::core::text::{normalize_year_tokens, truncate_chars};

pub use bridge::NliBridge;

/// Characters of sentence text kept in a gate-hit sample.
const GATE_SAMPLE_CHARS: usize = 300;
/// Gate hits kept in the diagnostic sample.
const GATE_SAMPLE_LIMIT: usize = 30;

/// Probability that a premise entails a hypothesis.
pub trait EntailmentScorer {
    fn entailment(&self, premise: &str, hypothesis: &str) -> Result<f64>;

    /// Scores many premises; results are in input order.
    fn entailment_batch(&self, premises: &[String], hypothesis: &str) -> Result<Vec<f64>> {
        premises
            .iter()
            .map(|premise| self.entailment(premise, hypothesis))
            .collect()
    }
}

impl<F> EntailmentScorer for F
where
    F: Fn(&str, &str) -> Result<f64>,
{
    fn entailment(&self, premise: &str, hypothesis: &str) -> Result<f64> {
        self(premise, hypothesis)
    }
}

/// One label of a classifier's output distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Score of the `entailment` label (any case), 0.0 when absent.
pub fn entailment_probability(scores: &[LabelScore]) -> f64 {
    scores
        .iter()
        .find(|s| s.label.eq_ignore_ascii_case("entailment"))
        .map_or(0.0, |s| s.score)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AiSpiResult {
    pub ai_spi: f64,
    pub positives: usize,
    pub evaluated: usize,
}

/// Fraction of gated sentences the entailment model accepts at `tau`.
///
/// Sentences are year-normalized and only those matching `gate` reach the
/// scorer, in a single order-preserving batch.
pub fn compute_ai_spi(
    sentences: &[Sentence],
    scorer: &dyn EntailmentScorer,
    hypothesis: &str,
    tau: f64,
    gate: &Regex,
) -> Result<AiSpiResult> {
    let gated: Vec<String> = sentences
        .iter()
        .map(|s| normalize_year_tokens(&s.text))
        .filter(|text| gate.is_match(text))
        .collect();

    if gated.is_empty() {
        return Ok(AiSpiResult::default());
    }

    let probs = scorer.entailment_batch(&gated, hypothesis)?;
    if probs.len() != gated.len() {
        anyhow::bail!(
            "entailment scorer returned {} probabilities for {} premises",
            probs.len(),
            gated.len()
        );
    }

    let positives = probs.iter().filter(|&&p| p >= tau).count();
    let evaluated = gated.len();
    tracing::debug!(evaluated, positives, tau, "entailment gate evaluated");

    Ok(AiSpiResult {
        ai_spi: positives as f64 / evaluated as f64,
        positives,
        evaluated,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateHit {
    pub page: Option<u32>,
    pub text: String,
}

/// Which sentences would be sent to the entailment model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateDiagnostics {
    pub total_sentences: usize,
    pub gate_hits_count: usize,
    pub gate_hits_sample: Vec<GateHit>,
}

pub fn gate_diagnostics(sentences: &[Sentence], gate: &Regex) -> GateDiagnostics {
    let hits: Vec<GateHit> = sentences
        .iter()
        .filter_map(|s| {
            let text = normalize_year_tokens(&s.text);
            gate.is_match(&text).then(|| GateHit {
                page: s.page,
                text: truncate_chars(&text, GATE_SAMPLE_CHARS).to_string(),
            })
        })
        .collect();

    GateDiagnostics {
        total_sentences: sentences.len(),
        gate_hits_count: hits.len(),
        gate_hits_sample: hits.into_iter().take(GATE_SAMPLE_LIMIT).collect(),
    }
}
