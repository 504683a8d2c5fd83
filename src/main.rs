use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use gwscan::calibration::{load_gold, run_calibration};
use gwscan::core::config::ScoringConfig;
use gwscan::core::model::Gating;
use gwscan::export::write_json_file;
use gwscan::nli::NliBridge;
use gwscan::parser::PdfReader;
use gwscan::pipeline::{export_run, score_document, PipelineConfig};
use gwscan::sectioning::{sectionize, summarize_buckets};

#[derive(Parser, Debug)]
#[command(name = "gwscan")]
#[command(version, about = "Vagueness and specificity scoring of sustainability reports", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Score one report for one year
    Score {
        /// Input PDF file path
        #[arg(long)]
        pdf: PathBuf,

        /// Reporting year of the document
        #[arg(long)]
        year: i32,

        /// Scoring configuration
        #[arg(long, default_value = "config.yml")]
        config: PathBuf,

        /// Output directory for run artifacts
        #[arg(long, default_value = "outputs")]
        outdir: PathBuf,

        /// Skip the entailment model even if enabled
        #[arg(long)]
        rule_only: bool,

        /// Corroborate specificity with the entailment model
        #[arg(long)]
        enable_nli: bool,

        /// Entailment threshold (overrides nli.tau)
        #[arg(long)]
        tau: Option<f64>,

        /// Disclosed series, e.g. "2021:2694,2022:2194,2023:2126"
        #[arg(long)]
        ci_values: Option<String>,

        /// Restated years, e.g. "2022,2023"
        #[arg(long)]
        restated: Option<String>,

        /// Split on punctuation, newlines and bullets (messy PDFs)
        #[arg(long)]
        loose_sentences: bool,
    },

    /// Calibrate the entailment threshold against a labeled gold set
    Calibrate {
        /// Gold CSV file
        #[arg(long)]
        gold: PathBuf,

        /// Scoring configuration
        #[arg(long, default_value = "config.yml")]
        config: PathBuf,

        /// Where to write the calibration result
        #[arg(long, default_value = "outputs/tau_calibration.json")]
        tau_out: PathBuf,

        /// Only send gate-matching sentences to the model
        #[arg(long)]
        strict_gating: bool,
    },

    /// Show page count and section map of a PDF file
    Info {
        /// Input PDF file path
        #[arg(long)]
        pdf: PathBuf,

        /// Scoring configuration
        #[arg(long, default_value = "config.yml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Score {
            pdf,
            year,
            config,
            outdir,
            rule_only,
            enable_nli,
            tau,
            ci_values,
            restated,
            loose_sentences,
        } => {
            let run = PipelineConfig {
                rule_only,
                enable_nli,
                tau,
                ci_values,
                restated,
                loose_sentences,
                ..PipelineConfig::new(pdf, outdir, year)
            };
            score(&run, &config)
        }
        Commands::Calibrate {
            gold,
            config,
            tau_out,
            strict_gating,
        } => calibrate(&gold, &config, &tau_out, strict_gating),
        Commands::Info { pdf, config } => show_info(pdf, &config),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries the JSON result
    fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn score(run: &PipelineConfig, config_path: &Path) -> Result<()> {
    if !run.pdf.is_file() {
        anyhow::bail!("Input file does not exist: {}", run.pdf.display());
    }
    let config = ScoringConfig::load(config_path)?;

    eprintln!("[*] Processing: {}", run.pdf.display());
    eprintln!("[*] Output: {}", run.output.display());

    let artifacts = score_document(run, &config)
        .with_context(|| format!("Failed to score PDF: {}", run.pdf.display()))?;

    export_run(&artifacts, &run.output)
        .with_context(|| format!("Failed to export to: {}", run.output.display()))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&artifacts.report.summary())?
    );
    eprintln!("[✓] Done! Results saved to: {}", run.output.display());

    Ok(())
}

fn calibrate(
    gold_path: &Path,
    config_path: &Path,
    tau_out: &Path,
    strict_gating: bool,
) -> Result<()> {
    let config = ScoringConfig::load(config_path)?;
    let gold = load_gold(gold_path)?;
    if gold.is_empty() {
        anyhow::bail!("Gold file has no rows: {}", gold_path.display());
    }

    let gating = if strict_gating {
        Gating::Strict
    } else {
        Gating::Off
    };
    eprintln!("[*] Calibrating on {} labeled sentences", gold.len());

    let work_dir = tau_out
        .parent()
        .map_or_else(|| PathBuf::from("nli"), |dir| dir.join("nli"));
    let bridge = NliBridge::from_settings(work_dir, &config.nli);
    let report = run_calibration(&gold, &config, &bridge, gating)?;

    write_json_file(tau_out, &report)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!("[✓] Saved: {}", tau_out.display());

    Ok(())
}

fn show_info(input: PathBuf, config_path: &Path) -> Result<()> {
    let reader = PdfReader::new(input.clone())
        .with_context(|| format!("Failed to open PDF: {}", input.display()))?;
    let page_count = reader.page_count()?;

    println!("PDF Information");
    println!("===============");
    println!("File: {}", input.display());
    println!("Pages: {}", page_count);

    let config = ScoringConfig::load(config_path)?;
    let pages = reader.extract_pages()?;
    let section_map = summarize_buckets(&sectionize(&pages, &config.sectioning));

    println!("Pages with text: {}", pages.len());
    println!();
    println!("Sections");
    println!("========");
    if section_map.is_empty() {
        println!("(no section headings or keywords found)");
    }
    for (section, summary) in &section_map {
        let pages: Vec<String> = summary.pages.iter().map(u32::to_string).collect();
        println!(
            "{section}: {} page(s) [{}] ({} by heading, {} by keywords)",
            summary.count_pages,
            pages.join(", "),
            summary.heading_pages,
            summary.fallback_pages
        );
    }

    Ok(())
}
