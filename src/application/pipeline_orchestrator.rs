//! Per-unit pipeline: fallback URLs, strategy cascade, deduplication
//!
//! One unit is one (retailer, category). Within a URL plan the first URL
//! that yields records ends the plan. When a retailer supplies several
//! plans for a category their records are unioned, then deduplicated.
//! Fetch failures and empty pages only advance the plan; a unit that runs
//! out of URLs is `Exhausted`, never an error.

#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::application::events::EventSink;
use crate::domain::events::{HarvestEvent, UnitKey, UnitState};
use crate::domain::product::{Category, ProductRecord};
use crate::domain::services::{Deduplicator, FetchPolicy, Fetcher};
use crate::domain::strategy::RetailerProfile;
use crate::infrastructure::parsing::{ParseContext, ParsingError, ParsingResult, ProductListParser};

/// Final state of one unit
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub unit: UnitKey,
    pub state: UnitState,
    pub records: Vec<ProductRecord>,
    /// Every absolute URL handed to the fetcher, in order
    pub urls_tried: Vec<String>,
}

impl UnitOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == UnitState::Succeeded
    }
}

pub struct PipelineOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    events: Arc<dyn EventSink>,
    policy: FetchPolicy,
    deduplicator: Deduplicator,
}

impl PipelineOrchestrator {
    pub fn new(fetcher: Arc<dyn Fetcher>, events: Arc<dyn EventSink>, policy: FetchPolicy) -> Self {
        Self {
            fetcher,
            events,
            policy,
            deduplicator: Deduplicator::new(),
        }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    async fn transition(&self, unit: &UnitKey, state: UnitState) {
        self.events
            .emit_event(HarvestEvent::UnitStateChanged {
                unit: unit.clone(),
                state,
            })
            .await;
    }

    /// Drive one unit to a terminal state
    pub async fn run_unit(&self, profile: &RetailerProfile, parser: &ProductListParser, category: Category) -> UnitOutcome {
        let unit = UnitKey::new(profile.name.clone(), category);
        let plans = profile.plans_for(category);
        let urls_planned: usize = plans.iter().map(|p| p.len()).sum();

        self.events
            .emit_event(HarvestEvent::UnitStarted {
                unit: unit.clone(),
                urls_planned,
            })
            .await;
        self.transition(&unit, UnitState::Pending).await;

        if plans.is_empty() {
            warn!("Category '{}' not supported for {}", category, profile.name);
        }

        let mut collected = Vec::new();
        let mut urls_tried = Vec::new();
        let mut index = 0;

        for plan in plans {
            for path in plan.urls() {
                let position = index;
                index += 1;
                self.transition(&unit, UnitState::TryingUrl(position)).await;

                let url = match resolve_plan_url(&profile.base_url, path) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!("Skipping plan URL: {}", e);
                        continue;
                    }
                };
                urls_tried.push(url.clone());

                let records = self.try_url(&unit, profile, parser, &url).await;
                if !records.is_empty() {
                    info!("Found {} {} products from {}", records.len(), category, url);
                    collected.extend(records);
                    break;
                }
            }
        }

        let before = collected.len();
        let records = self.deduplicator.dedupe(collected);
        self.events
            .emit_event(HarvestEvent::UnitDeduplicated {
                unit: unit.clone(),
                before,
                after: records.len(),
            })
            .await;

        let state = if records.is_empty() {
            UnitState::Exhausted
        } else {
            UnitState::Succeeded
        };
        self.transition(&unit, state).await;
        self.events
            .emit_event(HarvestEvent::UnitFinished {
                unit: unit.clone(),
                state,
                records: records.len(),
            })
            .await;

        UnitOutcome {
            unit,
            state,
            records,
            urls_tried,
        }
    }

    /// Fetch and extract one URL. Empty on any failure.
    async fn try_url(&self, unit: &UnitKey, profile: &RetailerProfile, parser: &ProductListParser, url: &str) -> Vec<ProductRecord> {
        let Some(page) = self.fetcher.fetch(url, &self.policy).await else {
            self.events
                .emit_event(HarvestEvent::FetchFailed {
                    unit: unit.clone(),
                    url: url.to_string(),
                })
                .await;
            return Vec::new();
        };

        let context = ParseContext::new(page.url.clone(), profile.name.clone(), unit.category).with_admission(profile.admission);
        let outcome = parser.extract(&page.html, &context);

        for attempt in outcome.attempts {
            self.events
                .emit_event(HarvestEvent::StrategyEvaluated {
                    unit: unit.clone(),
                    url: page.url.clone(),
                    attempt,
                })
                .await;
        }
        if let Some(report) = outcome.diagnostics {
            self.events
                .emit_event(HarvestEvent::DiagnosticsCaptured {
                    unit: unit.clone(),
                    url: page.url.clone(),
                    summary: report.summary(),
                })
                .await;
        }

        outcome.records
    }
}

/// Plan paths may be absolute or relative to the retailer base URL
fn resolve_plan_url(base_url: &str, path: &str) -> ParsingResult<String> {
    if let Ok(absolute) = Url::parse(path) {
        return Ok(absolute.to_string());
    }
    Url::parse(base_url)
        .and_then(|base| base.join(path))
        .map(String::from)
        .map_err(|e| ParsingError::url_resolution_failed(path, e, Some(base_url)))
}
