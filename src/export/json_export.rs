use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::export::Exporter;
use crate::pipeline::RunArtifacts;

/// Writes `run_<year>.json`, `section_map_<year>.json` and
/// `regex_hits_<year>.json`.
#[derive(Debug, Clone)]
pub struct JsonExporter {
    out_dir: PathBuf,
}

impl JsonExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }
}

impl Exporter for JsonExporter {
    fn export(&self, run: &RunArtifacts) -> Result<()> {
        let year = run.report.year;
        write_json_file(
            &self.out_dir.join(format!("section_map_{year}.json")),
            &run.report.section_map,
        )?;
        write_json_file(
            &self.out_dir.join(format!("regex_hits_{year}.json")),
            &run.regex_hits,
        )?;
        write_json_file(&self.out_dir.join(format!("run_{year}.json")), &run.report)?;
        Ok(())
    }
}

/// Pretty-printed JSON, creating parent directories as needed.
pub fn write_json_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(value)?;
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
