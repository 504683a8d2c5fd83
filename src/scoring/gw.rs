use serde::{Deserialize, Serialize};

use crate::core::model::Band;

/// Blend weight of the rule-based SPI in the hybrid SPI.
pub const RULE_SPI_WEIGHT: f64 = 0.6;
/// Blend weight of the entailment-based SPI in the hybrid SPI.
pub const AI_SPI_WEIGHT: f64 = 0.4;

/// Aggregation weights, also reported back as the effective weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub vui: f64,
    pub r_spi: f64,
    pub r_ci: f64,
}

/// Upper (inclusive) edges of the low and medium bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    pub low: f64,
    pub med: f64,
}

impl Bands {
    pub fn classify(&self, gw: f64) -> Band {
        if gw <= self.low {
            Band::Low
        } else if gw <= self.med {
            Band::Medium
        } else {
            Band::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GwResult {
    pub gw: f64,
    pub band: Band,
    pub effective_weights: Weights,
}

pub fn hybrid_spi(spi_rule: f64, ai_spi: f64) -> f64 {
    RULE_SPI_WEIGHT * spi_rule + AI_SPI_WEIGHT * ai_spi
}

/// Weighted greenwashing-risk score.
///
/// Specificity and consistency enter as risks (`1 - spi`, `1 - ci`). Without
/// a CI value the VUI and SPI weights are rescaled to sum to one, keeping
/// their configured ratio.
pub fn aggregate_gw(
    vui_norm: f64,
    spi_hybrid: f64,
    ci: Option<f64>,
    weights: &Weights,
    bands: &Bands,
) -> GwResult {
    let r_spi = 1.0 - spi_hybrid;

    let (gw, effective_weights) = match ci {
        None => {
            let wsum = weights.vui + weights.r_spi;
            let (vw, sw) = if wsum > 0.0 {
                (weights.vui / wsum, weights.r_spi / wsum)
            } else {
                (0.5, 0.5)
            };
            let effective = Weights {
                vui: vw,
                r_spi: sw,
                r_ci: 0.0,
            };
            (vw * vui_norm + sw * r_spi, effective)
        }
        Some(ci) => {
            let r_ci = 1.0 - ci;
            let gw = weights.vui * vui_norm + weights.r_spi * r_spi + weights.r_ci * r_ci;
            (gw, *weights)
        }
    };

    GwResult {
        gw,
        band: bands.classify(gw),
        effective_weights,
    }
}
