//! End-to-end harvest tests against scripted listing pages

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use keycraft_harvester_lib::application::{
    CollectingEventSink, EventSink, HarvestManager, HarvestOptions, PipelineOrchestrator,
};
use keycraft_harvester_lib::domain::events::{HarvestEvent, StrategyAttempt, UnitState};
use keycraft_harvester_lib::domain::product::Category;
use keycraft_harvester_lib::domain::repositories::CatalogStore;
use keycraft_harvester_lib::domain::services::FetchPolicy;
use keycraft_harvester_lib::domain::strategy::{
    CategoryAdmission, CategoryUrlPlan, RetailerProfile, StrategyCatalog, StructuralStrategy,
};
use keycraft_harvester_lib::infrastructure::config::HarvestConfig;
use keycraft_harvester_lib::infrastructure::{read_export, DatabaseConnection, InMemoryCatalogStore, ProductListParser, SqliteCatalogStore};
use keycraft_harvester_lib::test_utils::{listing_page, product_card, MockFetcher};

const BASE: &str = "https://shop.test";

fn test_profile() -> RetailerProfile {
    let mut category_plans = BTreeMap::new();
    category_plans.insert(
        Category::Switches,
        vec![CategoryUrlPlan::with_alternatives(
            "/collections/switches-old",
            ["/collections/switches", "/collections/all"],
        )],
    );
    category_plans.insert(Category::Keycaps, vec![CategoryUrlPlan::single("/collections/keycaps")]);

    RetailerProfile {
        key: "testshop".into(),
        name: "TestShop".into(),
        base_url: BASE.into(),
        catalog: StrategyCatalog::new(vec![
            StructuralStrategy::new("card", "div.card", "h3", ".price", "a", "img"),
            StructuralStrategy::new("tile", "li.tile", "h3", ".price", "a", "img"),
        ]),
        category_plans,
        admission: CategoryAdmission::Strict,
    }
}

/// Five containers: three valid switches, one gift card, one keycap set
fn switches_page() -> String {
    listing_page(&[
        product_card("card", "Gateron Yellow Linear Switch", "$4.50"),
        product_card("card", "Digital Gift Card", "$25.00"),
        product_card("card", "Kailh Box Jade Clicky", "$5.00"),
        product_card("card", "GMK Olivia Keycaps", "$129.00"),
        product_card("card", "Holy Panda Tactile Switches", "$8.00"),
    ])
}

fn keycaps_page() -> String {
    listing_page(&[
        product_card("card", "GMK Olivia Keycaps", "$129.00"),
        product_card("card", "PBT Cream Keycaps", "Sold Out"),
        product_card("card", "DSA Granite Keycaps", "$85.00"),
    ])
}

fn scripted_fetcher() -> MockFetcher {
    MockFetcher::new()
        .with_page(format!("{BASE}/collections/switches"), switches_page())
        .with_page(format!("{BASE}/collections/all"), switches_page())
        .with_page(format!("{BASE}/collections/keycaps"), keycaps_page())
}

fn harvest_config(export_dir: &std::path::Path) -> HarvestConfig {
    HarvestConfig {
        categories: vec![Category::Switches, Category::Keycaps],
        request_delay_ms: 0,
        max_retries: 1,
        category_cooldown_ms: 25,
        export_path: export_dir.join("latest-export.json"),
        ..Default::default()
    }
}

#[tokio::test]
async fn failed_primary_url_falls_back_and_stops_at_first_success() {
    let fetcher = Arc::new(scripted_fetcher());
    let sink = Arc::new(CollectingEventSink::new());
    let orchestrator = PipelineOrchestrator::new(fetcher.clone(), sink.clone(), FetchPolicy::new(Duration::ZERO, 1));
    let profile = test_profile();
    let parser = ProductListParser::new(&profile.catalog).unwrap();

    let outcome = orchestrator.run_unit(&profile, &parser, Category::Switches).await;

    assert_eq!(outcome.state, UnitState::Succeeded);
    let names: Vec<&str> = outcome.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Gateron Yellow Linear Switch", "Kailh Box Jade Clicky", "Holy Panda Tactile Switches"]
    );
    assert!(outcome.records.iter().all(|r| r.category == Category::Switches && r.retailer == "TestShop"));
    assert_eq!(
        fetcher.requests(),
        vec![format!("{BASE}/collections/switches-old"), format!("{BASE}/collections/switches")]
    );

    let events = sink.events().await;
    let states: Vec<UnitState> = events
        .iter()
        .filter_map(|e| match e {
            HarvestEvent::UnitStateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![UnitState::Pending, UnitState::TryingUrl(0), UnitState::TryingUrl(1), UnitState::Succeeded]
    );

    let attempts: Vec<&StrategyAttempt> = events
        .iter()
        .filter_map(|e| match e {
            HarvestEvent::StrategyEvaluated { attempt, .. } => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(attempts.len(), 1);
    assert_eq!(
        *attempts[0],
        StrategyAttempt {
            strategy: "card".into(),
            containers_found: 5,
            candidates_extracted: 5,
            validated: 4,
            kept: 3,
        }
    );
}

#[tokio::test]
async fn harvest_persists_units_and_exports() {
    let dir = tempdir().unwrap();
    let fetcher = Arc::new(scripted_fetcher());
    let store = Arc::new(InMemoryCatalogStore::new());
    let sink = Arc::new(CollectingEventSink::new());
    let manager = HarvestManager::new(fetcher.clone(), store.clone(), sink.clone(), harvest_config(dir.path()))
        .with_profiles(vec![test_profile()]);

    let summary = assert_ok!(manager.run(&HarvestOptions::default(), &CancellationToken::new()).await);

    assert!(!summary.cancelled);
    assert_eq!(summary.units.len(), 2);
    assert_eq!(summary.succeeded_units(), 2);
    assert_eq!(summary.total_records, 5);
    assert_eq!(summary.total_saved, 5);
    assert_eq!(store.count_products().await.unwrap(), 5);

    // one cooldown between the two categories
    assert_eq!(fetcher.cooldowns(), vec![Duration::from_millis(25)]);

    let keycaps = store.query_by_category(Some(Category::Keycaps)).await.unwrap();
    let prices: Vec<Decimal> = keycaps.iter().map(|p| p.record.price).collect();
    assert_eq!(prices, vec![Decimal::new(8500, 2), Decimal::new(12900, 2)]);

    let exported = read_export(summary.export_path.as_deref().unwrap()).await.unwrap();
    assert_eq!(exported.len(), 5);
    assert!(exported.iter().all(|p| p.availability == 1));

    let names = sink.names().await;
    assert_eq!(names.first(), Some(&"run-started"));
    assert_eq!(names.last(), Some(&"run-finished"));
    assert_eq!(names.iter().filter(|n| **n == "unit-persisted").count(), 2);
}

#[tokio::test]
async fn dev_mode_skips_cooldown_and_category_filter_applies() {
    let dir = tempdir().unwrap();
    let fetcher = Arc::new(scripted_fetcher());
    let manager = HarvestManager::new(
        fetcher.clone(),
        Arc::new(InMemoryCatalogStore::new()),
        Arc::new(CollectingEventSink::new()),
        harvest_config(dir.path()),
    )
    .with_profiles(vec![test_profile()]);

    let options = HarvestOptions {
        dev_mode: true,
        ..Default::default()
    };
    manager.run(&options, &CancellationToken::new()).await.unwrap();
    assert!(fetcher.cooldowns().is_empty());

    let keycaps_only = HarvestOptions {
        category: Some(Category::Keycaps),
        ..Default::default()
    };
    let summary = assert_ok!(manager.run(&keycaps_only, &CancellationToken::new()).await);
    assert_eq!(summary.units.len(), 1);
    assert_eq!(summary.units[0].unit.category, Category::Keycaps);
}

/// Cancels the run as soon as the first unit finishes
struct CancelAfterFirstUnit {
    token: CancellationToken,
}

#[async_trait]
impl EventSink for CancelAfterFirstUnit {
    async fn emit_event(&self, event: HarvestEvent) {
        if matches!(event, HarvestEvent::UnitFinished { .. }) {
            self.token.cancel();
        }
    }
}

#[tokio::test]
async fn cancellation_is_observed_between_units() {
    let dir = tempdir().unwrap();
    let token = CancellationToken::new();
    let fetcher = Arc::new(scripted_fetcher());
    let store = Arc::new(InMemoryCatalogStore::new());
    let manager = HarvestManager::new(
        fetcher.clone(),
        store.clone(),
        Arc::new(CancelAfterFirstUnit { token: token.clone() }),
        harvest_config(dir.path()),
    )
    .with_profiles(vec![test_profile()]);

    let summary = assert_ok!(manager.run(&HarvestOptions::default(), &token).await);

    assert!(summary.cancelled);
    assert_eq!(summary.units.len(), 1);
    // the finished unit is still persisted
    assert_eq!(summary.units[0].saved, 3);
    assert_eq!(store.count_products().await.unwrap(), 3);
    assert!(!fetcher.requests().iter().any(|url| url.ends_with("/collections/keycaps")));
}

#[tokio::test]
async fn already_cancelled_run_does_nothing() {
    let dir = tempdir().unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let fetcher = Arc::new(scripted_fetcher());
    let manager = HarvestManager::new(
        fetcher.clone(),
        Arc::new(InMemoryCatalogStore::new()),
        Arc::new(CollectingEventSink::new()),
        harvest_config(dir.path()),
    )
    .with_profiles(vec![test_profile()]);

    let summary = assert_ok!(manager.run(&HarvestOptions::default(), &token).await);
    assert!(summary.cancelled);
    assert!(summary.units.is_empty());
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn repeated_runs_upsert_and_accumulate_price_history() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("keyboard_parts.db");
    let db = DatabaseConnection::new(&format!("sqlite:{}", db_path.display())).await.unwrap();
    db.migrate().await.unwrap();
    let store = Arc::new(SqliteCatalogStore::new(db.pool().clone()));

    let manager = HarvestManager::new(
        Arc::new(scripted_fetcher()),
        store.clone(),
        Arc::new(CollectingEventSink::new()),
        harvest_config(dir.path()),
    )
    .with_profiles(vec![test_profile()]);

    let options = HarvestOptions {
        category: Some(Category::Switches),
        ..Default::default()
    };
    manager.run(&options, &CancellationToken::new()).await.unwrap();
    manager.run(&options, &CancellationToken::new()).await.unwrap();

    assert_eq!(store.count_products().await.unwrap(), 3);
    let switches = store.query_by_category(Some(Category::Switches)).await.unwrap();
    assert_eq!(switches[0].record.name, "Gateron Yellow Linear Switch");
    assert_eq!(switches[0].record.specs.switch_type.as_deref(), Some("linear"));

    let history = store.price_history(&switches[0].id).await.unwrap();
    assert_eq!(history.len(), 2);
}
