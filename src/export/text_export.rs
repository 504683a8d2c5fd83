use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::export::Exporter;
use crate::pipeline::RunArtifacts;

/// Human-readable `summary_<year>.txt`.
#[derive(Debug, Clone)]
pub struct TextExporter {
    out_dir: PathBuf,
}

impl TextExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    fn format_summary(run: &RunArtifacts) -> String {
        let report = &run.report;
        let mut text = String::new();

        let title = format!("Greenwashing risk summary, {}", report.year);
        text.push_str(&format!("{title}\n{}\n\n", "=".repeat(title.len())));

        let included = if report.included_sections.is_empty() {
            "(none)".to_string()
        } else {
            report.included_sections.join(", ")
        };
        text.push_str(&format!("Included sections: {included}\n"));
        let wordcounts = report
            .section_wordcounts
            .iter()
            .map(|(section, words)| format!("{section}={words}"))
            .collect::<Vec<_>>()
            .join(", ");
        text.push_str(&format!("Section words:     {wordcounts}\n\n"));

        text.push_str(&format!(
            "VUI         {:.4}  ({} hits / {} words, {:.2} per 1000)\n",
            report.vui.vui_norm, report.vui.vui_hits, report.vui.words, report.vui.vui_per_1000
        ));
        text.push_str(&format!(
            "SPI (rule)  {:.4}  ({} of {} sentences)\n",
            report.spi_rule.spi_rule, report.spi_rule.specific, report.spi_rule.total
        ));
        text.push_str(&format!(
            "SPI (AI)    {:.4}  ({} of {} gated sentences)\n",
            report.ai_spi.ai_spi, report.ai_spi.positives, report.ai_spi.evaluated
        ));
        text.push_str(&format!("SPI hybrid  {:.4}\n", report.spi_hybrid));
        match report.ci_value {
            Some(ci) => text.push_str(&format!("CI          {ci:.4}\n")),
            None => text.push_str("CI          n/a\n"),
        }
        let weights = &report.gw.effective_weights;
        text.push_str(&format!(
            "GW          {:.4}  band: {}\n",
            report.gw.gw, report.gw.band
        ));
        text.push_str(&format!(
            "Weights     vui={:.3} r_spi={:.3} r_ci={:.3}\n\n",
            weights.vui, weights.r_spi, weights.r_ci
        ));

        if !report.per_section.is_empty() {
            text.push_str("Per section:\n");
            for (section, metrics) in &report.per_section {
                text.push_str(&format!(
                    "  {section}: {} sentences, {} words, VUI {:.4}, SPI {:.4}\n",
                    metrics.count_sentences,
                    metrics.words,
                    metrics.vui.vui_norm,
                    metrics.spi_rule.spi_rule
                ));
            }
            text.push('\n');
        }

        text.push_str(&format!(
            "Gate hits: {} of {} sentences\n",
            run.regex_hits.gate_hits_count, run.regex_hits.total_sentences
        ));
        text
    }
}

impl Exporter for TextExporter {
    fn export(&self, run: &RunArtifacts) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;
        let path = self
            .out_dir
            .join(format!("summary_{}.txt", run.report.year));
        fs::write(&path, Self::format_summary(run))
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
