use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::config::ScoringConfig;
use crate::core::error::ConfigError;
use crate::core::model::{Band, Page, Sentence};
use crate::core::text::word_count;
use crate::export::json_export::JsonExporter;
use crate::export::text_export::TextExporter;
use crate::export::Exporter;
use crate::nli::{
    compute_ai_spi, gate_diagnostics, AiSpiResult, EntailmentScorer, GateDiagnostics, NliBridge,
};
use crate::parser::{self, PdfReader};
use crate::scoring::ci::{parse_ci_values, parse_restated};
use crate::scoring::{
    aggregate_gw, ci_light, compute_spi_rule, compute_vui, hybrid_spi, ConsistencyResult,
    GwResult, SpecificityResult, VagueIndexResult,
};
use crate::sectioning::{collect_section_sentences, sectionize, summarize_buckets, SectionSummary};

/// Options of one scoring run (one document-year).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub pdf: PathBuf,
    pub output: PathBuf,
    pub year: i32,
    pub rule_only: bool,
    pub enable_nli: bool,
    /// Overrides `nli.tau` from the configuration file.
    pub tau: Option<f64>,
    /// `"2021:2694,2022:2194"`, optionally with a unit per entry.
    pub ci_values: Option<String>,
    /// `"2022,2023"`
    pub restated: Option<String>,
    pub loose_sentences: bool,
}

impl PipelineConfig {
    pub fn new(pdf: PathBuf, output: PathBuf, year: i32) -> Self {
        Self {
            pdf,
            output,
            year,
            rule_only: false,
            enable_nli: false,
            tau: None,
            ci_values: None,
            restated: None,
            loose_sentences: false,
        }
    }

    /// Threshold for the entailment step, or `None` when the step is skipped.
    ///
    /// A command-line tau must be finite, like `nli.tau` in the config file.
    pub fn nli_tau(&self, scoring: &ScoringConfig) -> Result<Option<f64>, ConfigError> {
        if let Some(tau) = self.tau.filter(|tau| !tau.is_finite()) {
            return Err(ConfigError::value("--tau", format!("must be finite, got {tau}")));
        }
        if !self.enable_nli || self.rule_only {
            return Ok(None);
        }
        Ok(self.tau.or(scoring.nli.tau))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionMetrics {
    pub words: usize,
    pub count_sentences: usize,
    pub vui: VagueIndexResult,
    pub spi_rule: SpecificityResult,
}

/// Full record of a scoring run, persisted as `run_<year>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub year: i32,
    pub included_sections: Vec<String>,
    pub section_wordcounts: BTreeMap<String, usize>,
    pub vui: VagueIndexResult,
    pub spi_rule: SpecificityResult,
    pub ai_spi: AiSpiResult,
    pub spi_hybrid: f64,
    pub ci_value: Option<f64>,
    pub ci_meta: Option<ConsistencyResult>,
    pub gw: GwResult,
    pub per_section: BTreeMap<String, SectionMetrics>,
    pub section_map: BTreeMap<String, SectionSummary>,
}

/// Compact stdout view of a run; floats rounded to 4 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub year: i32,
    pub vui_norm: f64,
    pub spi_rule: f64,
    pub spi_hybrid: f64,
    pub ci_value: Option<f64>,
    pub gw: f64,
    pub band: Band,
    pub included_sections: Vec<String>,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            year: self.year,
            vui_norm: round4(self.vui.vui_norm),
            spi_rule: round4(self.spi_rule.spi_rule),
            spi_hybrid: round4(self.spi_hybrid),
            ci_value: self.ci_value.map(round4),
            gw: round4(self.gw.gw),
            band: self.gw.band,
            included_sections: self.included_sections.clone(),
        }
    }
}

/// Everything a run produces, held back until the run has fully succeeded.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub report: RunReport,
    pub regex_hits: GateDiagnostics,
}

/// Extract the PDF and score it.
pub fn score_document(run: &PipelineConfig, scoring: &ScoringConfig) -> Result<RunArtifacts> {
    let reader = PdfReader::new(run.pdf.clone())?;
    let pages = reader
        .extract_pages()
        .with_context(|| format!("failed to extract text from {}", run.pdf.display()))?;

    let bridge = run
        .nli_tau(scoring)?
        .map(|_| NliBridge::from_settings(run.output.join("nli"), &scoring.nli));
    let scorer = bridge.as_ref().map(|b| b as &dyn EntailmentScorer);

    score_pages(&pages, run, scoring, scorer)
}

/// Section, filter and score already extracted pages.
///
/// `scorer` is only consulted when the entailment step is enabled and a tau
/// is available.
pub fn score_pages(
    pages: &[Page],
    run: &PipelineConfig,
    scoring: &ScoringConfig,
    scorer: Option<&dyn EntailmentScorer>,
) -> Result<RunArtifacts> {
    let rules = &scoring.sectioning;
    let buckets = sectionize(pages, rules);
    let section_map = summarize_buckets(&buckets);
    let splitter = parser::splitter(run.loose_sentences);

    let mut included_sections = Vec::new();
    let mut section_wordcounts = BTreeMap::new();
    let mut section_sentences: Vec<(String, Vec<Sentence>)> = Vec::new();
    for section in &rules.target_sections {
        let Some(section_pages) = buckets.get(section).filter(|p| !p.is_empty()) else {
            continue;
        };

        let raw = section_pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let words = word_count(&raw);
        section_wordcounts.insert(section.clone(), words);

        if words < rules.min_words_per_section {
            tracing::info!(
                section = section.as_str(),
                words,
                min_words = rules.min_words_per_section,
                "section below word minimum, skipped"
            );
            continue;
        }

        let sentences = collect_section_sentences(section_pages, splitter.as_ref());
        tracing::info!(
            section = section.as_str(),
            words,
            pages = section_pages.len(),
            sentences = sentences.len(),
            "section included"
        );
        included_sections.push(section.clone());
        section_sentences.push((section.clone(), sentences));
    }

    let all_sentences: Vec<Sentence> = section_sentences
        .iter()
        .flat_map(|(_, sentences)| sentences.iter().cloned())
        .collect();

    let regex_hits = gate_diagnostics(&all_sentences, &scoring.nli.gate);
    tracing::info!(
        total = regex_hits.total_sentences,
        hits = regex_hits.gate_hits_count,
        "gate diagnostics"
    );

    let vui = compute_vui(&all_sentences, &scoring.vui);
    let spi_rule = compute_spi_rule(&all_sentences, &scoring.spi);

    let (ai_spi, spi_hybrid) = match run.nli_tau(scoring)? {
        Some(tau) => {
            let scorer = scorer.context("entailment scoring enabled without a scorer")?;
            let ai = compute_ai_spi(
                &all_sentences,
                scorer,
                &scoring.nli.hypothesis,
                tau,
                &scoring.nli.gate,
            )?;
            (ai, hybrid_spi(spi_rule.spi_rule, ai.ai_spi))
        }
        None => {
            if run.enable_nli && !run.rule_only {
                tracing::warn!("no tau on the command line or in config, entailment step skipped");
            }
            (AiSpiResult::default(), spi_rule.spi_rule)
        }
    };

    let ci_meta = match run.ci_values.as_deref() {
        Some(raw) => {
            let series = parse_ci_values(raw, &scoring.ci.unit_map)?;
            let restated = run.restated.as_deref().map(parse_restated).unwrap_or_default();
            if series.is_empty() {
                tracing::warn!(raw, "no usable entries in CI values");
                None
            } else {
                Some(ci_light(&series, scoring.ci.winsor_pct, &restated))
            }
        }
        None => None,
    };
    let ci_value = ci_meta
        .as_ref()
        .and_then(|meta| meta.ci_by_year.get(&run.year).copied());

    let gw = aggregate_gw(
        vui.vui_norm,
        spi_hybrid,
        ci_value,
        &scoring.weights,
        &scoring.bands,
    );

    let per_section = section_sentences
        .iter()
        .filter(|(_, sentences)| !sentences.is_empty())
        .map(|(section, sentences)| {
            let metrics = SectionMetrics {
                words: sentences.iter().map(|s| word_count(&s.text)).sum(),
                count_sentences: sentences.len(),
                vui: compute_vui(sentences, &scoring.vui),
                spi_rule: compute_spi_rule(sentences, &scoring.spi),
            };
            (section.clone(), metrics)
        })
        .collect();

    let report = RunReport {
        year: run.year,
        included_sections,
        section_wordcounts,
        vui,
        spi_rule,
        ai_spi,
        spi_hybrid,
        ci_value,
        ci_meta,
        gw,
        per_section,
        section_map,
    };

    Ok(RunArtifacts { report, regex_hits })
}

pub fn export_run(artifacts: &RunArtifacts, output: &Path) -> Result<()> {
    let json_exporter = JsonExporter::new(output.to_path_buf());
    json_exporter.export(artifacts)?;

    let text_exporter = TextExporter::new(output.to_path_buf());
    text_exporter.export(artifacts)?;

    Ok(())
}
