//! Triage report for pages where no strategy produced records.
//!
//! The inspector only reads the document. It never fails: anything it
//! cannot find is reported as missing.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Common product container patterns, most specific last
const COMMON_CONTAINER_PATTERNS: &[&str] = &[
    "div[class*=\"product\"]",
    "div[class*=\"item\"]",
    "div[class*=\"grid\"]",
    "article",
    "li[class*=\"product\"]",
    ".product-card",
    ".product-item",
    ".grid-item",
];

const SAMPLE_CHARS: usize = 200;
const MAX_MARKERS: usize = 3;

static NO_RESULTS_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)no products|no results|0 products|empty").unwrap());

static COMPILED_PATTERNS: Lazy<Vec<(&'static str, Selector)>> = Lazy::new(|| {
    COMMON_CONTAINER_PATTERNS
        .iter()
        .filter_map(|pattern| Selector::parse(pattern).ok().map(|s| (*pattern, s)))
        .collect()
});

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// First common container pattern that matched, with a truncated sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSample {
    pub pattern: String,
    pub count: usize,
    pub sample: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub url: String,
    pub page_title: Option<String>,
    /// Serialized size of the body element in bytes, 0 without a body
    pub body_size: usize,
    pub container_sample: Option<ContainerSample>,
    /// Up to three text fragments that look like an empty result page
    pub no_results_markers: Vec<String>,
}

impl DiagnosticReport {
    /// Short single-line form for event payloads
    pub fn summary(&self) -> String {
        let containers = match &self.container_sample {
            Some(sample) => format!("{} x '{}'", sample.count, sample.pattern),
            None => "no common containers".to_string(),
        };
        format!(
            "title={:?} body={}B containers={} no_results_markers={}",
            self.page_title.as_deref().unwrap_or("None"),
            self.body_size,
            containers,
            self.no_results_markers.len()
        )
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Diagnostics for {}:", self.url)?;
        writeln!(f, "  - Page title: {}", self.page_title.as_deref().unwrap_or("None"))?;
        writeln!(f, "  - Body length: {}", self.body_size)?;
        match &self.container_sample {
            Some(sample) => {
                writeln!(f, "  - Found {} elements with selector: {}", sample.count, sample.pattern)?;
                writeln!(f, "  - Sample: {}...", sample.sample)?;
            }
            None => writeln!(f, "  - No common product containers found")?,
        }
        if !self.no_results_markers.is_empty() {
            writeln!(f, "  - Found 'no results' indicators: {:?}", self.no_results_markers)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DiagnosticInspector;

impl DiagnosticInspector {
    pub fn inspect(html: &Html, url: &str) -> DiagnosticReport {
        let page_title = html
            .select(&TITLE)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());

        let body_size = html.select(&BODY).next().map_or(0, |body| body.html().len());

        let container_sample = COMPILED_PATTERNS.iter().find_map(|(pattern, selector)| {
            let mut matches = html.select(selector);
            let first = matches.next()?;
            Some(ContainerSample {
                pattern: (*pattern).to_string(),
                count: 1 + matches.count(),
                sample: first.html().chars().take(SAMPLE_CHARS).collect(),
            })
        });

        let no_results_markers = html
            .root_element()
            .text()
            .map(str::trim)
            .filter(|text| NO_RESULTS_MARKER.is_match(text))
            .take(MAX_MARKERS)
            .map(str::to_string)
            .collect();

        DiagnosticReport {
            url: url.to_string(),
            page_title,
            body_size,
            container_sample,
            no_results_markers,
        }
    }
}
