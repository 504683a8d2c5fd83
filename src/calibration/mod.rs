//! Decision-threshold calibration for the entailment gate.
//!
//! The ROC sweep follows the usual descending-threshold construction: one
//! point per distinct probability, collinear interior points dropped, and an
//! origin point whose threshold sits above every probability. Tau is the
//! first threshold maximizing Youden's J (`tpr - fpr`).

pub mod gold;
pub mod run;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use gold::{load_gold, parse_gold};
pub use run::{run_calibration, CalibrationReport};

/// Tau and AUC reported when the labels hold a single class.
pub const DEGENERATE_TAU: f64 = 0.5;
pub const DEGENERATE_AUC: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub auc: f64,
    pub tau: f64,
    pub tpr: f64,
    pub fpr: f64,
    pub thresholds: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn tpr(&self) -> f64 {
        rate(self.tp, self.tp + self.fn_)
    }

    pub fn fpr(&self) -> f64 {
        rate(self.fp, self.fp + self.tn)
    }
}

fn rate(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

fn class_counts(labels: &[u8]) -> (usize, usize) {
    let positives = labels.iter().filter(|&&l| l == 1).count();
    (positives, labels.len() - positives)
}

/// ROC curve over every distinct probability, highest threshold first.
///
/// `labels` must be as long as `probs`.
pub fn roc_curve(probs: &[f64], labels: &[u8]) -> RocCurve {
    if probs.is_empty() {
        return RocCurve {
            fpr: Vec::new(),
            tpr: Vec::new(),
            thresholds: Vec::new(),
        };
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));

    let mut tps = Vec::new();
    let mut fps = Vec::new();
    let mut thresholds = Vec::new();
    let (mut tp, mut fp) = (0usize, 0usize);
    for (k, &idx) in order.iter().enumerate() {
        if labels[idx] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_value = order
            .get(k + 1)
            .map_or(true, |&next| probs[next] != probs[idx]);
        if last_of_value {
            tps.push(tp);
            fps.push(fp);
            thresholds.push(probs[idx]);
        }
    }

    if tps.len() > 2 {
        let keep: Vec<usize> = (0..tps.len())
            .filter(|&i| {
                i == 0
                    || i == tps.len() - 1
                    || second_diff(&fps, i) != 0
                    || second_diff(&tps, i) != 0
            })
            .collect();
        tps = keep.iter().map(|&i| tps[i]).collect();
        fps = keep.iter().map(|&i| fps[i]).collect();
        thresholds = keep.iter().map(|&i| thresholds[i]).collect();
    }

    let sentinel = thresholds[0] + 1.0;
    tps.insert(0, 0);
    fps.insert(0, 0);
    thresholds.insert(0, sentinel);

    let (positives, negatives) = class_counts(labels);
    RocCurve {
        fpr: fps.iter().map(|&f| rate(f, negatives)).collect(),
        tpr: tps.iter().map(|&t| rate(t, positives)).collect(),
        thresholds,
    }
}

fn second_diff(counts: &[usize], i: usize) -> i64 {
    counts[i + 1] as i64 - 2 * counts[i] as i64 + counts[i - 1] as i64
}

/// Trapezoidal area under a curve with non-decreasing `x`.
pub fn auc(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[1] + ys[0]) / 2.0)
        .sum()
}

/// Pick the entailment threshold that best separates the gold labels.
pub fn calibrate_tau(probs: &[f64], labels: &[u8]) -> Result<CalibrationResult> {
    anyhow::ensure!(
        probs.len() == labels.len(),
        "got {} probabilities for {} labels",
        probs.len(),
        labels.len()
    );

    let curve = roc_curve(probs, labels);
    let (positives, negatives) = class_counts(labels);

    if positives == 0 || negatives == 0 {
        tracing::warn!(
            positives,
            negatives,
            "calibration labels hold a single class; falling back to tau={DEGENERATE_TAU}"
        );
        let cm = confusion_at_tau(probs, labels, DEGENERATE_TAU)?;
        return Ok(CalibrationResult {
            auc: DEGENERATE_AUC,
            tau: DEGENERATE_TAU,
            tpr: cm.tpr(),
            fpr: cm.fpr(),
            thresholds: curve.thresholds,
        });
    }

    let mut best = 0;
    let mut best_j = f64::NEG_INFINITY;
    for (i, (tpr, fpr)) in curve.tpr.iter().zip(&curve.fpr).enumerate() {
        let j = tpr - fpr;
        if j > best_j {
            best_j = j;
            best = i;
        }
    }

    Ok(CalibrationResult {
        auc: auc(&curve.fpr, &curve.tpr),
        tau: curve.thresholds[best],
        tpr: curve.tpr[best],
        fpr: curve.fpr[best],
        thresholds: curve.thresholds,
    })
}

/// Tabulate `prob >= tau` predictions against the labels.
pub fn confusion_at_tau(probs: &[f64], labels: &[u8], tau: f64) -> Result<ConfusionMatrix> {
    anyhow::ensure!(
        probs.len() == labels.len(),
        "got {} probabilities for {} labels",
        probs.len(),
        labels.len()
    );

    let mut cm = ConfusionMatrix::default();
    for (&p, &label) in probs.iter().zip(labels) {
        match (p >= tau, label == 1) {
            (true, true) => cm.tp += 1,
            (true, false) => cm.fp += 1,
            (false, false) => cm.tn += 1,
            (false, true) => cm.fn_ += 1,
        }
    }
    Ok(cm)
}

/// Chance-corrected agreement between two binary labelings.
pub fn cohen_kappa(a: &[u8], b: &[u8]) -> Result<f64> {
    anyhow::ensure!(a.len() == b.len(), "label sequences differ in length");
    if a.is_empty() {
        return Ok(0.0);
    }

    let n = a.len() as f64;
    let agree = a.iter().zip(b).filter(|(x, y)| x == y).count() as f64;
    let po = agree / n;
    let p1 = a.iter().filter(|&&x| x == 1).count() as f64 / n;
    let q1 = b.iter().filter(|&&x| x == 1).count() as f64 / n;
    let pe = p1 * q1 + (1.0 - p1) * (1.0 - q1);
    Ok((po - pe) / (1.0 - pe + 1e-12))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn perfect_separation() {
        let probs = [0.9, 0.8, 0.3, 0.1];
        let labels = [1, 1, 0, 0];
        let result = calibrate_tau(&probs, &labels).unwrap();

        assert!(approx(result.auc, 1.0));
        assert_eq!(result.tau, 0.8);
        assert_eq!(result.tpr, 1.0);
        assert_eq!(result.fpr, 0.0);
        // 0.3 lies on the segment between 0.8 and 0.1 and is dropped
        assert!(approx(result.thresholds[0], 1.9));
        assert_eq!(result.thresholds[1..], [0.9, 0.8, 0.1]);
    }

    #[test]
    fn mixed_ranking() {
        let probs = [0.9, 0.7, 0.6, 0.4, 0.2];
        let labels = [1, 0, 1, 0, 0];

        let curve = roc_curve(&probs, &labels);
        assert_eq!(curve.thresholds[1..], [0.9, 0.7, 0.6, 0.2]);
        assert_eq!(curve.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);

        let result = calibrate_tau(&probs, &labels).unwrap();
        assert!(approx(result.auc, 5.0 / 6.0));
        assert_eq!(result.tau, 0.6);
        assert_eq!(result.tpr, 1.0);
        assert!(approx(result.fpr, 1.0 / 3.0));

        let cm = confusion_at_tau(&probs, &labels, result.tau).unwrap();
        assert_eq!(
            cm,
            ConfusionMatrix {
                tp: 2,
                fp: 1,
                tn: 2,
                fn_: 0
            }
        );
    }

    #[test]
    fn ties_resolve_to_first_threshold() {
        let probs = [0.8, 0.8, 0.5, 0.5];
        let labels = [1, 0, 1, 0];
        let result = calibrate_tau(&probs, &labels).unwrap();

        assert!(approx(result.auc, 0.5));
        assert!(approx(result.tau, 1.8));
        assert_eq!(result.tpr, 0.0);
        assert_eq!(result.fpr, 0.0);
    }

    #[test]
    fn single_class_falls_back() {
        let probs = [0.9, 0.4, 0.6];
        let labels = [1, 1, 1];
        let result = calibrate_tau(&probs, &labels).unwrap();

        assert_eq!(result.auc, DEGENERATE_AUC);
        assert_eq!(result.tau, DEGENERATE_TAU);
        assert!(approx(result.tpr, 2.0 / 3.0));
        assert_eq!(result.fpr, 0.0);
        assert_eq!(result.thresholds.len(), 3);
    }

    #[test]
    fn empty_input_falls_back() {
        let result = calibrate_tau(&[], &[]).unwrap();
        assert_eq!(result.tau, DEGENERATE_TAU);
        assert!(result.thresholds.is_empty());
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert!(calibrate_tau(&[0.1, 0.2], &[1]).is_err());
        assert!(confusion_at_tau(&[0.1], &[1, 0], 0.5).is_err());
    }

    #[test]
    fn confusion_threshold_is_inclusive() {
        let cm = confusion_at_tau(&[0.5, 0.49, 0.5], &[1, 1, 0], 0.5).unwrap();
        assert_eq!(cm.tp, 1);
        assert_eq!(cm.fn_, 1);
        assert_eq!(cm.fp, 1);
        assert_eq!(cm.tn, 0);
        assert_eq!(cm.total(), 3);
    }

    #[test]
    fn confusion_serializes_fn_key() {
        let json = serde_json::to_value(ConfusionMatrix {
            tp: 1,
            fp: 2,
            tn: 3,
            fn_: 4,
        })
        .unwrap();
        assert_eq!(json["fn"], 4);
    }

    /// Deterministic pseudo-random probabilities and labels.
    fn synthetic(seed: u64, n: usize) -> (Vec<f64>, Vec<u8>) {
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 33) as f64 / (1u64 << 31) as f64
        };
        let mut probs = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let label = (i % 3 == 0) as u8;
            // coarse grid so ties occur
            let noise = (next() * 10.0).floor() / 10.0;
            probs.push(((noise + 0.3 * label as f64) / 1.3).min(1.0));
            labels.push(label);
        }
        (probs, labels)
    }

    #[test]
    fn tau_maximizes_youden_and_round_trips() {
        for seed in 1..20 {
            let (probs, labels) = synthetic(seed, 60);
            let result = calibrate_tau(&probs, &labels).unwrap();

            let best_j = result.tpr - result.fpr;
            for &threshold in &result.thresholds {
                let cm = confusion_at_tau(&probs, &labels, threshold).unwrap();
                assert!(cm.tpr() - cm.fpr() <= best_j + 1e-12, "seed {seed}");
            }

            let cm = confusion_at_tau(&probs, &labels, result.tau).unwrap();
            assert!(approx(cm.tpr(), result.tpr), "seed {seed}");
            assert!(approx(cm.fpr(), result.fpr), "seed {seed}");
            assert!((0.0..=1.0).contains(&result.auc));
        }
    }

    #[test]
    fn kappa_agreement() {
        assert!(approx(cohen_kappa(&[1, 0, 1, 0], &[1, 0, 1, 0]).unwrap(), 1.0));
        // po = 0.5, pe = 0.5
        assert!(approx(cohen_kappa(&[1, 0, 1, 0], &[1, 1, 0, 0]).unwrap(), 0.0));
        assert_eq!(cohen_kappa(&[], &[]).unwrap(), 0.0);
        assert!(cohen_kappa(&[1], &[]).is_err());
    }
}
