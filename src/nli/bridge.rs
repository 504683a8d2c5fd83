use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::config::{Device, NliSettings};
use crate::nli::{entailment_probability, EntailmentScorer, LabelScore};

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    model: &'a str,
    hypothesis: &'a str,
    device: &'a str,
    premises: &'a [String],
}

/// Runs the entailment model through a Python bridge script.
///
/// The script reads a JSON request file and prints, for each premise, the
/// label distribution as a list of `{label, score}` objects.
#[derive(Debug, Clone)]
pub struct NliBridge {
    work_dir: PathBuf,
    script_path: PathBuf,
    model: String,
    device: Device,
}

impl NliBridge {
    pub fn new(work_dir: PathBuf, model: String) -> Self {
        Self {
            work_dir,
            script_path: PathBuf::from("nli/bridge/nli_bridge.py"),
            model,
            device: Device::Auto,
        }
    }

    pub fn from_settings(work_dir: PathBuf, settings: &NliSettings) -> Self {
        Self::new(work_dir, settings.model.clone())
            .with_script(settings.bridge_script.clone())
            .with_device(settings.device)
    }

    pub fn with_script(mut self, script_path: PathBuf) -> Self {
        self.script_path = script_path;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn run(&self, premises: &[String], hypothesis: &str) -> Result<Vec<Vec<LabelScore>>> {
        fs::create_dir_all(&self.work_dir)?;
        let request_path = self.work_dir.join("nli_request.json");
        let request = BridgeRequest {
            model: &self.model,
            hypothesis,
            device: self.device.as_str(),
            premises,
        };
        fs::write(&request_path, serde_json::to_string(&request)?)
            .with_context(|| format!("failed to write {}", request_path.display()))?;

        let output = Command::new("python3")
            .arg(&self.script_path)
            .arg("--request")
            .arg(&request_path)
            .output()
            .with_context(|| "failed to invoke python NLI bridge")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("NLI bridge failed: {stderr}");
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_response(&stdout, premises.len())
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }
}

/// Decode bridge stdout, checking one distribution per premise.
pub fn parse_response(stdout: &str, expected: usize) -> Result<Vec<Vec<LabelScore>>> {
    let scores: Vec<Vec<LabelScore>> =
        serde_json::from_str(stdout).with_context(|| "failed to parse NLI bridge JSON response")?;
    if scores.len() != expected {
        anyhow::bail!(
            "NLI bridge returned {} results for {} premises",
            scores.len(),
            expected
        );
    }
    Ok(scores)
}

impl EntailmentScorer for NliBridge {
    fn entailment(&self, premise: &str, hypothesis: &str) -> Result<f64> {
        let probs = self.entailment_batch(&[premise.to_string()], hypothesis)?;
        Ok(probs.first().copied().unwrap_or(0.0))
    }

    fn entailment_batch(&self, premises: &[String], hypothesis: &str) -> Result<Vec<f64>> {
        if premises.is_empty() {
            return Ok(Vec::new());
        }
        let scores = self.run(premises, hypothesis)?;
        Ok(scores.iter().map(|s| entailment_probability(s)).collect())
    }
}
