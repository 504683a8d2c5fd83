use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

use gwscan::calibration::{load_gold, run_calibration};
use gwscan::core::config::ScoringConfig;
use gwscan::core::model::{Band, Gating, Page};
use gwscan::export::write_json_file;
use gwscan::nli::EntailmentScorer;
use gwscan::parser::PdfReader;
use gwscan::pipeline::{export_run, score_document, score_pages, PipelineConfig};

fn shipped_config() -> Result<ScoringConfig> {
    ScoringConfig::load(Path::new(env!("CARGO_MANIFEST_DIR")).join("config.yml").as_path())
}

fn report_pages() -> Vec<Page> {
    let mut climate = String::from("Climate change and our strategy.\n");
    for _ in 0..8 {
        climate.push_str("Scope 1 and 2 emissions fell 12% compared to the 2019 baseline. ");
        climate.push_str("We target net zero by 2 0 4 0 across all sites.\n");
    }

    let mut environment = String::from("Environmental performance.\n");
    for _ in 0..15 {
        environment.push_str("We may potentially strive to reduce waste where possible. ");
    }

    vec![
        Page::new(1, "Annual sustainability report"),
        Page::new(2, climate),
        Page::new(4, environment),
        Page::new(5, "Corporate governance. The board oversees climate risk."),
    ]
}

/// Scripted entailment model: confident on sentences carrying a year.
fn year_scorer(premise: &str, _hypothesis: &str) -> Result<f64> {
    Ok(if premise.contains("2040") || premise.contains("2019") {
        0.92
    } else {
        0.1
    })
}

/// Integration test: synthetic pages through scoring and export
#[test]
fn test_scoring_run_with_synthetic_pages() -> Result<()> {
    let config = shipped_config()?;
    let output = tempfile::tempdir()?;
    let outdir = output.path().join("outputs");

    let mut run = PipelineConfig::new(PathBuf::from("synthetic.pdf"), outdir.clone(), 2023);
    run.enable_nli = true;
    run.ci_values = Some("2021:2694,2022:2194,2023:2126".to_string());

    let scorer: &dyn EntailmentScorer = &year_scorer;
    let artifacts = score_pages(&report_pages(), &run, &config, Some(scorer))?;
    let report = &artifacts.report;

    assert_eq!(report.included_sections, vec!["environment", "climate"]);
    assert!(!report.section_wordcounts.is_empty());
    assert!(report.section_map.contains_key("governance"));

    // every climate sentence is specific, no environment sentence is
    assert_eq!(report.per_section["climate"].spi_rule.spi_rule, 16.0 / 17.0);
    assert_eq!(report.per_section["environment"].spi_rule.spi_rule, 0.0);
    assert_eq!(report.per_section["environment"].vui.vui_norm, 1.0);

    // gated: 16 climate sentences plus 15 "reduce waste" sentences
    assert_eq!(report.ai_spi.evaluated, 31);
    assert_eq!(report.ai_spi.positives, 16);
    assert!(report.ci_value.is_some());
    assert_eq!(report.gw.effective_weights, config.weights);
    assert!((0.0..=1.0).contains(&report.gw.gw));

    export_run(&artifacts, &outdir)?;
    for name in [
        "run_2023.json",
        "section_map_2023.json",
        "regex_hits_2023.json",
        "summary_2023.txt",
    ] {
        assert!(outdir.join(name).exists(), "{name} should exist");
    }

    let regex_hits: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(outdir.join("regex_hits_2023.json"))?)?;
    assert_eq!(regex_hits["gate_hits_count"], 31);
    let first = regex_hits["gate_hits_sample"][0]["text"].as_str().unwrap_or_default();
    assert!(!first.is_empty());

    Ok(())
}

/// Integration test: short sections are dropped and scores fall back to defaults
#[test]
fn test_scoring_run_without_eligible_sections() -> Result<()> {
    let config = shipped_config()?;
    let run = PipelineConfig::new(PathBuf::from("empty.pdf"), PathBuf::from("unused"), 2022);
    let pages = vec![Page::new(1, "Climate strategy. Too short to count.")];

    let artifacts = score_pages(&pages, &run, &config, None)?;
    let report = &artifacts.report;

    assert!(report.included_sections.is_empty());
    assert_eq!(report.spi_rule.spi_rule, 0.0);
    assert_eq!(report.vui.vui_norm, 0.0);
    // no specificity at all: r_spi = 1 under renormalized 0.5/0.5 weights
    assert!((report.gw.gw - 0.5).abs() < 1e-12);
    assert_eq!(report.gw.band, Band::Medium);
    assert_eq!(artifacts.regex_hits.total_sentences, 0);
    Ok(())
}

/// Integration test: gold CSV through calibration to the tau artifact
#[test]
fn test_calibration_run_from_gold_file() -> Result<()> {
    let config = shipped_config()?;
    let dir = tempfile::tempdir()?;
    let gold_path = dir.path().join("gold.csv");
    fs::write(
        &gold_path,
        "sentence,text_section,label_specific_target(0/1)\n\
         \"Cut emissions 30% by 2 0 4 0, versus 2019\",climate,1\n\
         Water withdrawal fell 8% against the 2019 baseline.,environment,1\n\
         We are committed to a sustainable future.,climate,0\n\
         Our people are our greatest asset.,governance,0\n",
    )?;

    let gold = load_gold(&gold_path)?;
    assert_eq!(gold.len(), 4);

    let report = run_calibration(&gold, &config, &year_scorer, Gating::Strict)?;
    assert_eq!(report.n_samples, 4);
    assert_eq!(report.evaluated_by_nli, 3);
    assert_eq!(report.tau, 0.92);
    assert_eq!(report.auc, 1.0);
    assert_eq!(report.confusion_at_tau.tp, 2);
    assert_eq!(report.confusion_at_tau.tn, 2);

    let tau_out = dir.path().join("outputs/tau_calibration.json");
    write_json_file(&tau_out, &report)?;
    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(&tau_out)?)?;
    assert_eq!(saved["gating"], "strict");
    assert_eq!(saved["confusion_at_tau"]["fn"], 0);
    Ok(())
}

/// Integration test: Score a real report when one is available
#[test]
fn test_score_real_report() -> Result<()> {
    let test_pdf = PathBuf::from("test/sample_report.pdf");

    if !test_pdf.exists() {
        eprintln!("Skipping test: test/sample_report.pdf not found");
        return Ok(());
    }

    let reader = PdfReader::new(test_pdf.clone())?;
    let page_count = reader.page_count()?;
    assert!(page_count > 0, "sample_report.pdf should have at least one page");

    let config = shipped_config()?;
    let output = tempfile::tempdir()?;
    let run = PipelineConfig::new(test_pdf, output.path().to_path_buf(), 2023);
    let artifacts = score_document(&run, &config)?;
    assert!((0.0..=1.0).contains(&artifacts.report.gw.gw));

    export_run(&artifacts, output.path())?;
    assert!(output.path().join("run_2023.json").exists());
    Ok(())
}
