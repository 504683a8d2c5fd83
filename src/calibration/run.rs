use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::calibration::{calibrate_tau, cohen_kappa, confusion_at_tau, ConfusionMatrix};
use crate::core::config::ScoringConfig;
use crate::core::model::{Gating, LabeledExample};
use crate::core::text::normalize_year_tokens;
use crate::nli::EntailmentScorer;
use crate::scoring::spi::is_specific;

/// Persisted outcome of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub n_samples: usize,
    pub evaluated_by_nli: usize,
    pub auc: f64,
    pub tau: f64,
    pub tpr: f64,
    pub fpr: f64,
    pub confusion_at_tau: ConfusionMatrix,
    pub gating: Gating,
    /// Agreement between the rule-based classifier and the gold labels.
    pub rule_kappa: f64,
}

/// Score the gold set with the entailment model and calibrate tau.
///
/// With strict gating, sentences the gate rejects are never sent to the
/// model and enter the ROC sweep with probability 0.
pub fn run_calibration(
    gold: &[LabeledExample],
    config: &ScoringConfig,
    scorer: &dyn EntailmentScorer,
    gating: Gating,
) -> Result<CalibrationReport> {
    let texts: Vec<String> = gold.iter().map(|g| normalize_year_tokens(&g.text)).collect();

    let evaluated: Vec<usize> = texts
        .iter()
        .enumerate()
        .filter(|(_, text)| gating == Gating::Off || config.nli.gate.is_match(text))
        .map(|(i, _)| i)
        .collect();
    let premises: Vec<String> = evaluated.iter().map(|&i| texts[i].clone()).collect();

    tracing::info!(
        samples = gold.len(),
        evaluated = premises.len(),
        "scoring gold set with entailment model"
    );
    let scored = scorer.entailment_batch(&premises, &config.nli.hypothesis)?;
    anyhow::ensure!(
        scored.len() == premises.len(),
        "entailment scorer returned {} probabilities for {} premises",
        scored.len(),
        premises.len()
    );

    let mut probs = vec![0.0; gold.len()];
    for (&i, p) in evaluated.iter().zip(scored) {
        probs[i] = p;
    }
    let labels: Vec<u8> = gold.iter().map(|g| g.label).collect();

    let calibration = calibrate_tau(&probs, &labels)?;
    let confusion = confusion_at_tau(&probs, &labels, calibration.tau)?;

    let rule_predictions: Vec<u8> = gold
        .iter()
        .map(|g| is_specific(&g.text, &config.spi) as u8)
        .collect();
    let rule_kappa = cohen_kappa(&rule_predictions, &labels)?;

    tracing::info!(
        auc = calibration.auc,
        tau = calibration.tau,
        rule_kappa,
        "calibration finished"
    );

    Ok(CalibrationReport {
        n_samples: gold.len(),
        evaluated_by_nli: premises.len(),
        auc: calibration.auc,
        tau: calibration.tau,
        tpr: calibration.tpr,
        fpr: calibration.fpr,
        confusion_at_tau: confusion,
        gating,
        rule_kappa,
    })
}
