//! Application layer
//!
//! Orchestrates the domain logic: per-unit pipelines, whole harvest runs,
//! progress events and maintenance of exported data.

pub mod catalog_maintenance;
pub mod events;
pub mod harvest_manager;
pub mod pipeline_orchestrator;

pub use catalog_maintenance::{analyze_records, clean_records, CatalogAnalysis, CleaningReport, MaintenanceThresholds};
pub use events::{ChannelEventSink, CollectingEventSink, EventSink, TracingEventSink};
pub use harvest_manager::{HarvestManager, HarvestOptions, HarvestSummary, UnitSummary};
pub use pipeline_orchestrator::{PipelineOrchestrator, UnitOutcome};
