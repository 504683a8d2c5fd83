//! Page-level sectioning: heading aliases first, keyword density for the rest.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::config::SectioningRules;
use crate::core::model::{Page, SectionPage, Sentence};
use crate::parser::SentenceSplitter;

pub const UNASSIGNED: &str = "unassigned";

/// Section name -> pages assigned to it.
pub type Buckets = BTreeMap<String, Vec<SectionPage>>;

/// Assign each page to the first section (config order) whose heading alias
/// matches anywhere on the page.
pub fn section_by_headings(pages: &[Page], rules: &SectioningRules) -> Buckets {
    let mut buckets = Buckets::new();
    for page in pages {
        let section = rules
            .heading_aliases
            .iter()
            .find(|(_, aliases)| aliases.any_match(&page.text))
            .map_or(UNASSIGNED, |(name, _)| name.as_str());
        buckets
            .entry(section.to_string())
            .or_default()
            .push(SectionPage::from(page.clone()));
    }
    buckets
}

/// Place unassigned pages by keyword density.
///
/// A page goes to the section with the strictly highest hit density, provided
/// that density reaches `min_density`. Pages with no keyword hits stay out.
pub fn keyword_fallback(unassigned: &[SectionPage], rules: &SectioningRules) -> Buckets {
    let mut out = Buckets::new();
    for page in unassigned {
        let words = page.text.split_whitespace().count().max(1) as f64;

        let mut best: Option<(&str, f64)> = None;
        for (section, keywords) in &rules.keyword_fallback {
            let score = keywords.count_matches(&page.text) as f64 / words;
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((section.as_str(), score));
            }
        }

        if let Some((section, score)) = best {
            if score >= rules.min_density {
                out.entry(section.to_string()).or_default().push(SectionPage {
                    fallback: true,
                    score: Some(score),
                    ..page.clone()
                });
            }
        }
    }
    out
}

/// Headings, then keyword fallback merged into the same buckets.
///
/// Pages rescued by the fallback also remain listed under `unassigned`.
pub fn sectionize(pages: &[Page], rules: &SectioningRules) -> Buckets {
    let mut buckets = section_by_headings(pages, rules);
    let rescued = buckets
        .get(UNASSIGNED)
        .map(|unassigned| keyword_fallback(unassigned, rules))
        .unwrap_or_default();
    for (section, pages) in rescued {
        buckets.entry(section).or_default().extend(pages);
    }
    tracing::debug!(sections = buckets.len(), "pages sectioned");
    buckets
}

/// Split every page and tag each sentence with its page number.
pub fn collect_section_sentences(
    pages: &[SectionPage],
    splitter: &dyn SentenceSplitter,
) -> Vec<Sentence> {
    pages
        .iter()
        .flat_map(|page| {
            splitter
                .split(&page.text)
                .into_iter()
                .map(move |text| Sentence::on_page(text, page.page))
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub pages: Vec<u32>,
    pub count_pages: usize,
    pub fallback_pages: usize,
    pub heading_pages: usize,
}

/// Audit view of the buckets, without `unassigned`.
pub fn summarize_buckets(buckets: &Buckets) -> BTreeMap<String, SectionSummary> {
    buckets
        .iter()
        .filter(|(section, _)| section.as_str() != UNASSIGNED)
        .map(|(section, pages)| {
            let unique: BTreeSet<u32> = pages.iter().map(|p| p.page).collect();
            let fallback_pages = pages.iter().filter(|p| p.fallback).count();
            let summary = SectionSummary {
                count_pages: unique.len(),
                pages: unique.into_iter().collect(),
                fallback_pages,
                heading_pages: pages.len() - fallback_pages,
            };
            (section.clone(), summary)
        })
        .collect()
}
