//! Scoring configuration.
//!
//! The YAML file is deserialized into plain serde structs (`ConfigFile`) and
//! then compiled into a [`ScoringConfig`], which owns every regex the scorers
//! need. Missing keys are fatal; only the handful of optional keys below have
//! defaults.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::error::ConfigError;
use crate::scoring::gw::{Bands, Weights};

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub nli: NliSection,
    pub spi: SpiSection,
    pub vui: VuiSection,
    pub ci: CiSection,
    pub weights: Weights,
    pub bands: Bands,
    pub sectioning: SectioningSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NliSection {
    pub model: String,
    pub hypothesis: String,
    pub gated_regex: String,
    #[serde(default)]
    pub tau: Option<f64>,
    #[serde(default)]
    pub device: Device,
    #[serde(default = "default_bridge_script")]
    pub bridge_script: PathBuf,
}

fn default_bridge_script() -> PathBuf {
    PathBuf::from("nli/bridge/nli_bridge.py")
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpiSection {
    pub unit_patterns: Vec<String>,
    pub target_patterns: Vec<String>,
    pub baseline_patterns: Vec<String>,
    pub strict_excludes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VuiSection {
    pub lm_uncertainty: Vec<String>,
    pub hedges: Vec<String>,
    pub divisor_per_1000: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CiSection {
    pub winsor_pct: (f64, f64),
    #[serde(default)]
    pub unit_map: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SectioningSection {
    pub target_sections: Vec<String>,
    pub min_words_per_section: usize,
    pub heading_aliases: OrderedPatternMap,
    pub keyword_fallback: OrderedPatternMap,
    pub min_density: f64,
}

/// Accelerator the entailment bridge should run on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Auto,
    Cpu,
    Cuda,
    Mps,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Mps => "mps",
        }
    }
}

/// Section name -> pattern list, in file order.
///
/// The first section whose patterns match wins during sectioning, so the
/// mapping cannot go through a `HashMap`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedPatternMap(pub Vec<(String, Vec<String>)>);

impl<'de> Deserialize<'de> for OrderedPatternMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = OrderedPatternMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of section name to a list of patterns")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, patterns)) = map.next_entry::<String, Vec<String>>()? {
                    entries.push((name, patterns));
                }
                Ok(OrderedPatternMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Ordered list of compiled patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    pub fn compile(
        field: &str,
        sources: &[String],
        verbose: bool,
    ) -> std::result::Result<Self, ConfigError> {
        let patterns = sources
            .iter()
            .map(|source| compile_pattern(field, source, verbose))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn any_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }

    /// Total non-overlapping matches of every pattern.
    pub fn count_matches(&self, text: &str) -> usize {
        self.patterns.iter().map(|p| p.find_iter(text).count()).sum()
    }
}

/// Compile one configured pattern, case-insensitive.
pub fn compile_pattern(
    field: &str,
    source: &str,
    verbose: bool,
) -> std::result::Result<Regex, ConfigError> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .ignore_whitespace(verbose)
        .build()
        .map_err(|source_err| ConfigError::Pattern {
            field: field.to_string(),
            pattern: source.to_string(),
            source: source_err,
        })
}

#[derive(Debug, Clone)]
pub struct NliSettings {
    pub model: String,
    pub hypothesis: String,
    pub gated_regex: String,
    pub gate: Regex,
    pub tau: Option<f64>,
    pub device: Device,
    pub bridge_script: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SpiRules {
    pub unit: PatternSet,
    pub target: PatternSet,
    pub baseline: PatternSet,
    pub strict_excludes: PatternSet,
}

#[derive(Debug, Clone)]
pub struct VuiRules {
    /// `lm_uncertainty` followed by `hedges`.
    pub patterns: PatternSet,
    pub divisor_per_1000: f64,
}

#[derive(Debug, Clone)]
pub struct CiSettings {
    pub winsor_pct: (f64, f64),
    /// Keys are lowercased.
    pub unit_map: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct SectioningRules {
    pub target_sections: Vec<String>,
    pub min_words_per_section: usize,
    pub heading_aliases: Vec<(String, PatternSet)>,
    pub keyword_fallback: Vec<(String, PatternSet)>,
    pub min_density: f64,
}

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub nli: NliSettings,
    pub spi: SpiRules,
    pub vui: VuiRules,
    pub ci: CiSettings,
    pub weights: Weights,
    pub bands: Bands,
    pub sectioning: SectioningRules,
}

impl ScoringConfig {
    /// Loads and compiles configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml_str(&contents)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_yaml::from_str(yaml).context("failed to parse configuration YAML")?;
        Ok(Self::compile(file)?)
    }

    pub fn compile(file: ConfigFile) -> std::result::Result<Self, ConfigError> {
        validate_numbers(&file)?;

        let nli = NliSettings {
            gate: compile_pattern("nli.gated_regex", &file.nli.gated_regex, true)?,
            gated_regex: file.nli.gated_regex,
            model: file.nli.model,
            hypothesis: file.nli.hypothesis,
            tau: file.nli.tau,
            device: file.nli.device,
            bridge_script: file.nli.bridge_script,
        };

        let spi = SpiRules {
            unit: PatternSet::compile("spi.unit_patterns", &file.spi.unit_patterns, false)?,
            target: PatternSet::compile("spi.target_patterns", &file.spi.target_patterns, true)?,
            baseline: PatternSet::compile(
                "spi.baseline_patterns",
                &file.spi.baseline_patterns,
                false,
            )?,
            strict_excludes: PatternSet::compile(
                "spi.strict_excludes",
                &file.spi.strict_excludes,
                false,
            )?,
        };

        let vui_sources: Vec<String> = file
            .vui
            .lm_uncertainty
            .iter()
            .chain(file.vui.hedges.iter())
            .cloned()
            .collect();
        let vui = VuiRules {
            patterns: PatternSet::compile("vui", &vui_sources, false)?,
            divisor_per_1000: file.vui.divisor_per_1000,
        };

        let ci = CiSettings {
            winsor_pct: file.ci.winsor_pct,
            unit_map: file
                .ci
                .unit_map
                .into_iter()
                .map(|(unit, factor)| (unit.to_lowercase(), factor))
                .collect(),
        };

        let sectioning = SectioningRules {
            heading_aliases: compile_section_map(
                "sectioning.heading_aliases",
                &file.sectioning.heading_aliases,
            )?,
            keyword_fallback: compile_section_map(
                "sectioning.keyword_fallback",
                &file.sectioning.keyword_fallback,
            )?,
            target_sections: file.sectioning.target_sections,
            min_words_per_section: file.sectioning.min_words_per_section,
            min_density: file.sectioning.min_density,
        };

        Ok(Self {
            nli,
            spi,
            vui,
            ci,
            weights: file.weights,
            bands: file.bands,
            sectioning,
        })
    }
}

fn compile_section_map(
    field: &str,
    map: &OrderedPatternMap,
) -> std::result::Result<Vec<(String, PatternSet)>, ConfigError> {
    map.0
        .iter()
        .map(|(section, sources)| {
            let set = PatternSet::compile(&format!("{field}.{section}"), sources, false)?;
            Ok((section.clone(), set))
        })
        .collect()
}

fn validate_numbers(file: &ConfigFile) -> std::result::Result<(), ConfigError> {
    let divisor = file.vui.divisor_per_1000;
    if !(divisor.is_finite() && divisor > 0.0) {
        return Err(ConfigError::value(
            "vui.divisor_per_1000",
            format!("must be a positive number, got {divisor}"),
        ));
    }

    let w = &file.weights;
    for (name, value) in [("vui", w.vui), ("r_spi", w.r_spi), ("r_ci", w.r_ci)] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(ConfigError::value(
                format!("weights.{name}"),
                format!("must be a non-negative number, got {value}"),
            ));
        }
    }
    if w.vui + w.r_spi <= 0.0 {
        return Err(ConfigError::value(
            "weights",
            "vui + r_spi must be positive so weights can be renormalized without CI",
        ));
    }

    let b = &file.bands;
    if !(b.low.is_finite() && b.med.is_finite() && 0.0 <= b.low && b.low <= b.med) {
        return Err(ConfigError::value(
            "bands",
            format!("expected 0 <= low <= med, got low={} med={}", b.low, b.med),
        ));
    }

    let (lo, hi) = file.ci.winsor_pct;
    if !(0.0 <= lo && lo <= hi && hi <= 100.0) {
        return Err(ConfigError::value(
            "ci.winsor_pct",
            format!("expected 0 <= low <= high <= 100, got [{lo}, {hi}]"),
        ));
    }
    for (unit, factor) in &file.ci.unit_map {
        if !factor.is_finite() {
            return Err(ConfigError::value(
                format!("ci.unit_map.{unit}"),
                "conversion factor must be finite",
            ));
        }
    }

    let density = file.sectioning.min_density;
    if !(density.is_finite() && density >= 0.0) {
        return Err(ConfigError::value(
            "sectioning.min_density",
            format!("must be a non-negative number, got {density}"),
        ));
    }

    if let Some(tau) = file.nli.tau {
        if !tau.is_finite() {
            return Err(ConfigError::value("nli.tau", "must be finite"));
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) fn shipped_config() -> ScoringConfig {
    ScoringConfig::from_yaml_str(include_str!("../../config.yml")).expect("shipped config.yml")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHIPPED: &str = include_str!("../../config.yml");

    #[test]
    fn loads_shipped_config() {
        let config = shipped_config();
        assert_eq!(config.spi.unit.len(), 9);
        assert_eq!(config.vui.patterns.len(), 22);
        assert_eq!(config.nli.tau, Some(0.5));
        assert_eq!(config.nli.device, Device::Auto);
        assert_eq!(config.ci.winsor_pct, (1.0, 99.0));
        assert_eq!(config.ci.unit_map.get("kt"), Some(&1000.0));
        assert_eq!(
            config.sectioning.target_sections,
            vec!["environment", "climate", "governance"]
        );
    }

    #[test]
    fn section_maps_keep_file_order() {
        let config = shipped_config();
        let names: Vec<&str> = config
            .sectioning
            .heading_aliases
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, vec!["climate", "environment", "governance"]);
    }

    #[test]
    fn gate_is_verbose_and_case_insensitive() {
        let config = shipped_config();
        assert!(config.nli.gate.is_match("We will reach NET ZERO by 2040"));
        assert!(config.nli.gate.is_match("a 12 % drop"));
        assert!(!config.nli.gate.is_match("Our people are our strength"));
    }

    #[test]
    fn missing_key_is_fatal() {
        let yaml = SHIPPED.replace("  divisor_per_1000: 25.0\n", "");
        let err = ScoringConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(format!("{err:#}").contains("divisor_per_1000"));
    }

    #[test]
    fn invalid_pattern_reports_field() {
        let yaml = SHIPPED.replace("    - '\\bfootnote\\b'", "    - '(unclosed'");
        let err = ScoringConfig::from_yaml_str(&yaml).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::Pattern { field, pattern, .. }) => {
                assert_eq!(field, "spi.strict_excludes");
                assert_eq!(pattern, "(unclosed");
            }
            other => panic!("expected pattern error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_weights_that_cannot_renormalize() {
        let yaml = SHIPPED
            .replace("  vui: 0.4\n", "  vui: 0.0\n")
            .replace("  r_spi: 0.4\n", "  r_spi: 0.0\n");
        let err = ScoringConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Value { field, .. }) if field == "weights"
        ));
    }

    #[test]
    fn rejects_inverted_bands() {
        let yaml = SHIPPED.replace("  low: 0.33\n", "  low: 0.9\n");
        assert!(ScoringConfig::from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn optional_nli_keys_default() {
        let yaml = SHIPPED
            .replace("  tau: 0.5\n", "")
            .replace("  device: auto\n", "")
            .replace("  bridge_script: nli/bridge/nli_bridge.py\n", "");
        let config = ScoringConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.nli.tau, None);
        assert_eq!(config.nli.device, Device::Auto);
        assert_eq!(
            config.nli.bridge_script,
            PathBuf::from("nli/bridge/nli_bridge.py")
        );
    }
}
