//! Keycraft Harvester - resilient product harvesting for mechanical keyboard retailers
//!
//! Listing pages are fetched per (retailer, category) unit, run through an
//! ordered cascade of structural strategies, normalized, deduplicated and
//! stored with price history.

pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use application::{HarvestManager, HarvestOptions, HarvestSummary, PipelineOrchestrator};
pub use domain::product::{Category, ProductRecord};
