use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::model::Page;
use crate::parser::normalize::fold_presentation_forms;

#[derive(Debug, Clone)]
pub struct PdfReader {
    path: PathBuf,
}

impl PdfReader {
    pub fn new(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("PDF not found: {}", path.display());
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> Result<usize> {
        get_page_count(&self.path)
    }

    /// Text of every non-empty page, in order.
    pub fn extract_pages(&self) -> Result<Vec<Page>> {
        let output = Command::new("pdftotext")
            .arg("-enc")
            .arg("UTF-8")
            .arg(&self.path)
            .arg("-")
            .output()
            .with_context(|| format!("failed to invoke pdftotext on {}", self.path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("pdftotext failed with status {}: {stderr}", output.status);
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let pages = split_pages(&fold_presentation_forms(&raw));
        tracing::info!(pdf = %self.path.display(), pages = pages.len(), "extracted page text");
        Ok(pages)
    }
}

/// Split form-feed delimited text into 1-based pages.
///
/// Blank pages are dropped; when every page is blank the whole text becomes
/// page 1.
pub fn split_pages(raw: &str) -> Vec<Page> {
    let pages: Vec<Page> = raw
        .split('\x0c')
        .enumerate()
        .map(|(i, text)| (i, text.trim()))
        .filter(|(_, text)| !text.is_empty())
        .map(|(i, text)| Page::new(i as u32 + 1, text))
        .collect();

    if pages.is_empty() {
        vec![Page::new(1, raw.trim())]
    } else {
        pages
    }
}

fn get_page_count(pdf_path: &Path) -> Result<usize> {
    let output = Command::new("pdfinfo")
        .arg(pdf_path)
        .output()
        .with_context(|| format!("failed to invoke pdfinfo on {}", pdf_path.display()))?;

    if !output.status.success() {
        anyhow::bail!("pdfinfo failed with status: {}", output.status);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_page_count(&stdout)
        .with_context(|| format!("unreadable pdfinfo output for {}", pdf_path.display()))
}

fn parse_page_count(pdfinfo: &str) -> Result<usize> {
    for line in pdfinfo.lines() {
        if let Some(rest) = line.strip_prefix("Pages:") {
            let num_str = rest.trim();
            let pages: usize = num_str.parse().with_context(|| {
                format!("failed to parse page count from 'Pages:' line: {num_str}")
            })?;
            return Ok(pages);
        }
    }

    anyhow::bail!("pdfinfo output did not contain a 'Pages:' line");
}
