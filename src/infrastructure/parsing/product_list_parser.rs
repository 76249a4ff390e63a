//! Product list parser: the strategy cascade over one listing page
//!
//! Strategies are tried in catalog order. A strategy whose container
//! locator matches nothing is skipped; a strategy that finds containers but
//! keeps no record is skipped too. The first strategy that keeps at least
//! one record wins and no later strategy is evaluated. If none does, the
//! page is handed to the [`DiagnosticInspector`] and the outcome is empty.

#![allow(clippy::uninlined_format_args)]

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use super::{ContextualParser, DiagnosticInspector, DiagnosticReport, ParseContext, ParsingError, ParsingResult};
use crate::domain::events::StrategyAttempt;
use crate::domain::product::ProductRecord;
use crate::domain::services::field_normalizer::{
    classify_category, contains_out_of_stock_phrase, infer_specs, parse_price, rejection_reason,
};
use crate::domain::strategy::{StrategyCatalog, StructuralStrategy};

/// Generic title locators tried when the strategy's own title locator misses
const TITLE_FALLBACKS: &[&str] = &[
    "[class*=\"title\"] a",
    "[class*=\"title\"]",
    "h3 a",
    "h3",
    "h2",
    "h4",
    "a[href*=\"/products\"]",
];

/// Generic price locators tried when the strategy's own price locator misses
const PRICE_FALLBACKS: &[&str] = &[".money", ".price", "[class*=\"price\"]", "span[class*=\"money\"]", "[data-price]"];

/// Image attributes in lookup order
const IMAGE_ATTRIBUTES: &[&str] = &["src", "data-src", "data-original"];

static TITLE_FALLBACK_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| compile_list(TITLE_FALLBACKS));
static PRICE_FALLBACK_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| compile_list(PRICE_FALLBACKS));

fn compile_list(selectors: &[&str]) -> Vec<Selector> {
    selectors.iter().filter_map(|s| Selector::parse(s).ok()).collect()
}

fn compile(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::invalid_selector(selector, e))
}

/// Split a selector group on top-level commas. Commas inside brackets,
/// parentheses or quoted strings belong to the enclosing alternative.
fn split_selector_group(group: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in group.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(group[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(group[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

/// Alternatives of one locator, tried in the order they were written
#[derive(Debug, Clone)]
struct Locator(Vec<Selector>);

impl Locator {
    fn compile(group: &str) -> ParsingResult<Self> {
        let alternatives = split_selector_group(group)
            .into_iter()
            .map(compile)
            .collect::<ParsingResult<Vec<_>>>()?;
        if alternatives.is_empty() {
            return Err(ParsingError::invalid_selector(group, "empty selector"));
        }
        Ok(Self(alternatives))
    }

    fn alternatives(&self) -> impl Iterator<Item = &Selector> {
        self.0.iter()
    }

    /// First matching element (in alternative order) for which `f` yields a value
    fn find_map<'a, T>(&self, element: &ElementRef<'a>, mut f: impl FnMut(ElementRef<'a>) -> Option<T>) -> Option<T> {
        self.0
            .iter()
            .find_map(|selector| element.select(selector).find_map(&mut f))
    }
}

/// A strategy with its locators compiled
#[derive(Debug, Clone)]
struct CompiledStrategy {
    name: String,
    container: Selector,
    title: Locator,
    price: Locator,
    link: Locator,
    image: Locator,
    description: Option<Locator>,
    stock: Option<Locator>,
}

impl CompiledStrategy {
    fn compile(strategy: &StructuralStrategy) -> ParsingResult<Self> {
        Ok(Self {
            name: strategy.name.clone(),
            container: compile(&strategy.container)?,
            title: Locator::compile(&strategy.title)?,
            price: Locator::compile(&strategy.price)?,
            link: Locator::compile(&strategy.link)?,
            image: Locator::compile(&strategy.image)?,
            description: strategy.description.as_deref().map(Locator::compile).transpose()?,
            stock: strategy.stock.as_deref().map(Locator::compile).transpose()?,
        })
    }
}

/// Result of running the cascade over one document
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub records: Vec<ProductRecord>,
    /// Name of the strategy that produced `records`
    pub winning_strategy: Option<String>,
    /// One entry per strategy evaluated, in order
    pub attempts: Vec<StrategyAttempt>,
    /// Present only when no strategy kept a record
    pub diagnostics: Option<DiagnosticReport>,
}

impl ExtractionOutcome {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fields pulled from one container before validation
struct Candidate {
    title: String,
    price_text: String,
    product_url: Option<String>,
    image_url: Option<String>,
    description: String,
    stock_text: Option<String>,
    sold_out_marker: bool,
}

/// Parser for retailer listing pages, built from a [`StrategyCatalog`]
#[derive(Debug, Clone)]
pub struct ProductListParser {
    strategies: Vec<CompiledStrategy>,
    sold_out_indicators: Option<Selector>,
}

/// The extraction engine is the product list parser
pub type ExtractionEngine = ProductListParser;

impl ProductListParser {
    /// Compile a catalog. Strategies with an invalid locator are dropped
    /// with a warning; a catalog with no valid strategy is an error.
    pub fn new(catalog: &StrategyCatalog) -> ParsingResult<Self> {
        let mut strategies = Vec::with_capacity(catalog.strategies.len());
        let mut tried = Vec::new();

        for strategy in &catalog.strategies {
            tried.push(strategy.name.clone());
            match CompiledStrategy::compile(strategy) {
                Ok(compiled) => strategies.push(compiled),
                Err(e) => warn!("Dropping strategy '{}': {}", strategy.name, e),
            }
        }

        if strategies.is_empty() {
            return Err(ParsingError::NoUsableStrategy { tried });
        }

        let sold_out_indicators = match compile(&catalog.sold_out_indicators) {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!("Ignoring sold-out indicators: {}", e);
                None
            }
        };

        Ok(Self {
            strategies,
            sold_out_indicators,
        })
    }

    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    /// Parse `html` and run the cascade. The document never outlives this call.
    pub fn extract(&self, html: &str, context: &ParseContext) -> ExtractionOutcome {
        let document = Html::parse_document(html);
        self.run_cascade(&document, context)
    }

    fn run_cascade(&self, document: &Html, context: &ParseContext) -> ExtractionOutcome {
        let mut outcome = ExtractionOutcome::default();

        for strategy in &self.strategies {
            let containers: Vec<ElementRef> = document.select(&strategy.container).collect();
            let mut attempt = StrategyAttempt {
                strategy: strategy.name.clone(),
                containers_found: containers.len(),
                ..Default::default()
            };

            if containers.is_empty() {
                debug!("No containers for strategy '{}' on {}", strategy.name, context.page_url);
                outcome.attempts.push(attempt);
                continue;
            }

            debug!("Found {} containers with strategy '{}'", containers.len(), strategy.name);
            let records = self.extract_records(strategy, &containers, context, &mut attempt);
            outcome.attempts.push(attempt);

            if !records.is_empty() {
                info!(
                    "Strategy '{}' kept {} records from {}",
                    strategy.name,
                    records.len(),
                    context.page_url
                );
                outcome.records = records;
                outcome.winning_strategy = Some(strategy.name.clone());
                return outcome;
            }
        }

        let report = DiagnosticInspector::inspect(document, &context.page_url);
        warn!("No strategy produced records for {}", context.page_url);
        debug!("{}", report);
        outcome.diagnostics = Some(report);
        outcome
    }

    fn extract_records(
        &self,
        strategy: &CompiledStrategy,
        containers: &[ElementRef],
        context: &ParseContext,
        attempt: &mut StrategyAttempt,
    ) -> Vec<ProductRecord> {
        let mut records = Vec::new();

        for (index, container) in containers.iter().enumerate() {
            let candidate = match self.extract_candidate(strategy, container, context) {
                Ok(candidate) => candidate,
                Err(e) => {
                    debug!("Skipping container {} on {}: {}", index, context.page_url, e);
                    continue;
                }
            };
            attempt.candidates_extracted += 1;

            let price = parse_price(&candidate.price_text).amount();
            if let Some(reason) = rejection_reason(&candidate.title, price) {
                debug!("Rejected '{}': {}", candidate.title, reason);
                continue;
            }
            attempt.validated += 1;

            let derived = classify_category(&candidate.title, &[], candidate.product_url.as_deref().unwrap_or(""));
            if !context.admission.admits(&candidate.title, derived, context.target) {
                debug!(
                    "Dropped '{}': classified as {} while harvesting {}",
                    candidate.title, derived, context.target
                );
                continue;
            }

            records.push(Self::build_record(candidate, price, context));
        }

        attempt.kept = records.len();
        records
    }

    fn build_record(candidate: Candidate, price: Decimal, context: &ParseContext) -> ProductRecord {
        let specs = infer_specs(
            &candidate.title,
            &candidate.description,
            candidate.product_url.as_deref().unwrap_or(""),
        );
        let price_text = candidate.price_text.to_lowercase();
        let unavailable = candidate.sold_out_marker
            || candidate.stock_text.as_deref().is_some_and(contains_out_of_stock_phrase)
            || price_text.contains("sold out")
            || price_text.contains("unavailable");

        let mut record = ProductRecord::new(candidate.title, context.target, price, context.retailer.clone());
        record.product_url = candidate.product_url;
        record.image_url = candidate.image_url;
        record.specs = specs;
        record.availability = !unavailable;
        record.normalize_availability();
        record
    }

    /// Extract one container. A missing title or price fails the container.
    fn extract_candidate(
        &self,
        strategy: &CompiledStrategy,
        container: &ElementRef,
        context: &ParseContext,
    ) -> ParsingResult<Candidate> {
        let title = first_text(container, strategy.title.alternatives().chain(TITLE_FALLBACK_SELECTORS.iter()))
            .ok_or_else(|| ParsingError::required_field_missing("title", Some(&strategy.name)))?;

        let price_text = first_text(container, strategy.price.alternatives().chain(PRICE_FALLBACK_SELECTORS.iter()))
            .ok_or_else(|| ParsingError::required_field_missing("price", Some(&strategy.name)))?;

        let product_url = strategy
            .link
            .find_map(container, |link| link.value().attr("href"))
            .and_then(|href| self.resolve_optional(href, &context.page_url));

        let image_url = strategy
            .image
            .find_map(container, image_source)
            .and_then(|src| self.resolve_optional(src, &context.page_url));

        let description = strategy
            .description
            .as_ref()
            .and_then(|locator| first_text(container, locator.alternatives()))
            .unwrap_or_default();

        let stock_text = strategy
            .stock
            .as_ref()
            .and_then(|locator| first_text(container, locator.alternatives()));

        let sold_out_marker = self
            .sold_out_indicators
            .as_ref()
            .is_some_and(|selector| container.select(selector).next().is_some());

        Ok(Candidate {
            title,
            price_text,
            product_url,
            image_url,
            description,
            stock_text,
            sold_out_marker,
        })
    }

    fn resolve_optional(&self, href: &str, base_url: &str) -> Option<String> {
        match self.resolve_url(href, base_url) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    /// Resolve a possibly relative link against the page URL
    fn resolve_url(&self, href: &str, base_url: &str) -> ParsingResult<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return Err(ParsingError::url_resolution_failed(href, "not a navigable link", Some(base_url)));
        }

        let base = Url::parse(base_url)
            .map_err(|e| ParsingError::url_resolution_failed(base_url, format!("Invalid base URL: {}", e), None))?;

        base.join(href)
            .map(String::from)
            .map_err(|e| ParsingError::url_resolution_failed(href, format!("Failed to join URL: {}", e), Some(base_url)))
    }
}

impl ContextualParser for ProductListParser {
    type Output = ExtractionOutcome;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output> {
        Ok(self.run_cascade(html, context))
    }
}

/// First non-empty trimmed text among the selectors, in order
fn first_text<'a>(element: &ElementRef, selectors: impl IntoIterator<Item = &'a Selector>) -> Option<String> {
    selectors.into_iter().find_map(|selector| {
        element
            .select(selector)
            .map(|e| e.text().collect::<Vec<_>>().join(" "))
            .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
            .find(|text| !text.is_empty())
    })
}

fn is_placeholder_image(src: &str) -> bool {
    let lowered = src.to_lowercase();
    lowered.starts_with("data:") || lowered.contains("placeholder") || lowered.contains("blank.gif") || lowered.contains("lazy")
}

/// First image attribute that is not a lazy-load placeholder
fn image_source<'a>(img: ElementRef<'a>) -> Option<&'a str> {
    IMAGE_ATTRIBUTES
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .map(str::trim)
        .find(|src| !src.is_empty() && !is_placeholder_image(src))
}
