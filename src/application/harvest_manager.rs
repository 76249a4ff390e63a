//! Run-level harvest over retailers and categories
//!
//! Units run one after another: every selected category of a retailer, then
//! the next retailer. Cancellation is only observed between units. After
//! each unit the records are upserted and one price-history entry is
//! appended per record.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::events::EventSink;
use crate::application::pipeline_orchestrator::{PipelineOrchestrator, UnitOutcome};
use crate::domain::events::{HarvestEvent, UnitKey, UnitState};
use crate::domain::product::{Category, ProductRecord};
use crate::domain::repositories::CatalogStore;
use crate::domain::services::Fetcher;
use crate::domain::strategy::RetailerProfile;
use crate::infrastructure::catalog_export::export_catalog;
use crate::infrastructure::config::HarvestConfig;
use crate::infrastructure::parsing::ProductListParser;
use crate::infrastructure::retailer_profiles::all_profiles;

/// Per-run selection
#[derive(Debug, Clone, Default)]
pub struct HarvestOptions {
    /// Use the dev category list and skip cooldowns
    pub dev_mode: bool,
    pub category: Option<Category>,
    /// Retailer key or display name
    pub retailer: Option<String>,
    /// Overrides the configured export path
    pub export_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitSummary {
    pub unit: UnitKey,
    pub state: UnitState,
    pub records: usize,
    pub saved: usize,
    pub urls_tried: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestSummary {
    pub units: Vec<UnitSummary>,
    pub total_records: usize,
    pub total_saved: usize,
    pub cancelled: bool,
    pub export_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HarvestSummary {
    pub fn succeeded_units(&self) -> usize {
        self.units.iter().filter(|u| u.state == UnitState::Succeeded).count()
    }
}

pub struct HarvestManager {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn CatalogStore>,
    events: Arc<dyn EventSink>,
    config: HarvestConfig,
    profiles: Vec<RetailerProfile>,
}

impl HarvestManager {
    pub fn new(fetcher: Arc<dyn Fetcher>, store: Arc<dyn CatalogStore>, events: Arc<dyn EventSink>, config: HarvestConfig) -> Self {
        Self {
            fetcher,
            store,
            events,
            config,
            profiles: all_profiles(),
        }
    }

    /// Replace the built-in retailer profiles
    pub fn with_profiles(mut self, profiles: Vec<RetailerProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Retailers selected by the option filter, then by the configured list
    fn selected_profiles(&self, options: &HarvestOptions) -> Result<Vec<&RetailerProfile>> {
        let matches = |profile: &RetailerProfile, wanted: &str| {
            let wanted = wanted.trim().to_lowercase();
            profile.key == wanted || profile.name.to_lowercase() == wanted
        };

        let selected: Vec<&RetailerProfile> = self
            .profiles
            .iter()
            .filter(|p| options.retailer.as_deref().is_none_or(|r| matches(p, r)))
            .filter(|p| options.retailer.is_some() || self.config.retailers.is_empty() || self.config.retailers.iter().any(|r| matches(p, r)))
            .collect();

        if selected.is_empty() {
            anyhow::bail!(
                "No retailer matches {:?}",
                options.retailer.as_deref().unwrap_or("the configured retailer list")
            );
        }
        Ok(selected)
    }

    fn selected_categories(&self, options: &HarvestOptions) -> Vec<Category> {
        match options.category {
            Some(category) => vec![category],
            None => self.config.categories_for(options.dev_mode).to_vec(),
        }
    }

    pub async fn run(&self, options: &HarvestOptions, cancel: &CancellationToken) -> Result<HarvestSummary> {
        let started_at = Utc::now();
        let profiles = self.selected_profiles(options)?;
        let categories = self.selected_categories(options);
        let orchestrator = PipelineOrchestrator::new(self.fetcher.clone(), self.events.clone(), self.config.fetch_policy());

        let units_planned = profiles.len() * categories.len();
        info!(
            "Starting harvest: {} retailers x {} categories{}",
            profiles.len(),
            categories.len(),
            if options.dev_mode { " (dev mode)" } else { "" }
        );
        self.events
            .emit_event(HarvestEvent::RunStarted {
                units_planned,
                timestamp: started_at,
            })
            .await;

        let mut units = Vec::with_capacity(units_planned);
        let mut cancelled = false;
        let mut first_unit = true;

        'retailers: for profile in profiles {
            let parser = match ProductListParser::new(&profile.catalog) {
                Ok(parser) => parser,
                Err(e) => {
                    warn!("Skipping {}: {}", profile.name, e);
                    continue;
                }
            };

            for &category in &categories {
                if cancel.is_cancelled() {
                    info!("Harvest cancelled after {} units", units.len());
                    cancelled = true;
                    break 'retailers;
                }

                if !first_unit && !options.dev_mode {
                    self.fetcher.cooldown(self.config.category_cooldown()).await;
                }
                first_unit = false;

                let outcome = orchestrator.run_unit(profile, &parser, category).await;
                let saved = self.persist(&outcome).await?;
                units.push(UnitSummary {
                    unit: outcome.unit,
                    state: outcome.state,
                    records: outcome.records.len(),
                    saved,
                    urls_tried: outcome.urls_tried.len(),
                });
            }
        }

        let total_records = units.iter().map(|u| u.records).sum();
        let total_saved = units.iter().map(|u| u.saved).sum();

        let export_path = options.export_path.clone().unwrap_or_else(|| self.config.export_path.clone());
        let export_path = Some(export_catalog(self.store.as_ref(), &export_path).await?);

        let finished_at = Utc::now();
        self.events
            .emit_event(HarvestEvent::RunFinished {
                units_completed: units.len(),
                total_records,
                cancelled,
                timestamp: finished_at,
            })
            .await;

        Ok(HarvestSummary {
            units,
            total_records,
            total_saved,
            cancelled,
            export_path,
            started_at,
            finished_at,
        })
    }

    /// Upsert every record and append its price. A failing record is
    /// skipped; an unreachable store aborts the run.
    async fn persist(&self, outcome: &UnitOutcome) -> Result<usize> {
        let recorded_at = Utc::now();
        let mut saved = 0;

        for record in &outcome.records {
            match self.save_record(record, recorded_at).await {
                Ok(()) => saved += 1,
                Err(e) => warn!("Error saving product '{}': {:#}", record.name, e),
            }
        }

        if !outcome.records.is_empty() {
            self.store
                .count_products()
                .await
                .context("Catalog store is unavailable")?;
        }

        info!("Saved {}/{} products for {}", saved, outcome.records.len(), outcome.unit);
        self.events
            .emit_event(HarvestEvent::UnitPersisted {
                unit: outcome.unit.clone(),
                saved,
                total: outcome.records.len(),
            })
            .await;
        Ok(saved)
    }

    async fn save_record(&self, record: &ProductRecord, recorded_at: DateTime<Utc>) -> Result<()> {
        let id = self.store.upsert(record).await?;
        self.store.append_price_history(&id, record.price, recorded_at).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::CollectingEventSink;
    use crate::infrastructure::memory_catalog_store::InMemoryCatalogStore;
    use crate::test_utils::MockFetcher;

    fn manager(config: HarvestConfig) -> HarvestManager {
        HarvestManager::new(
            Arc::new(MockFetcher::new()),
            Arc::new(InMemoryCatalogStore::new()),
            Arc::new(CollectingEventSink::new()),
            config,
        )
    }

    #[test]
    fn test_retailer_filter() {
        let manager = manager(HarvestConfig::default());
        let options = HarvestOptions {
            retailer: Some("NovelKeys".into()),
            ..Default::default()
        };
        let selected = manager.selected_profiles(&options).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].key, "novelkeys");

        let unknown = HarvestOptions {
            retailer: Some("amazon".into()),
            ..Default::default()
        };
        assert!(manager.selected_profiles(&unknown).is_err());
    }

    #[test]
    fn test_configured_retailers_limit_default_run() {
        let config = HarvestConfig {
            retailers: vec!["kbdfans".into(), "mechanicalkeyboards".into()],
            ..Default::default()
        };
        let manager = manager(config);
        let keys: Vec<&str> = manager
            .selected_profiles(&HarvestOptions::default())
            .unwrap()
            .iter()
            .map(|p| p.key.as_str())
            .collect();
        assert_eq!(keys, vec!["kbdfans", "mechanicalkeyboards"]);
    }

    #[test]
    fn test_category_selection() {
        let manager = manager(HarvestConfig::default());
        assert_eq!(manager.selected_categories(&HarvestOptions::default()).len(), 5);
        let dev = HarvestOptions {
            dev_mode: true,
            ..Default::default()
        };
        assert_eq!(manager.selected_categories(&dev), vec![Category::Switches, Category::Keycaps]);
        let single = HarvestOptions {
            category: Some(Category::Pcb),
            ..Default::default()
        };
        assert_eq!(manager.selected_categories(&single), vec![Category::Pcb]);
    }
}
