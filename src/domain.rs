//! Domain module - products, strategies, events and the pure services
//! that operate on them.

pub mod events;
pub mod product;
pub mod repositories;
pub mod services;
pub mod strategy;

pub use events::{HarvestEvent, StrategyAttempt, UnitKey, UnitState};
pub use product::{Category, ExportedProduct, ProductRecord, ProductSpecs, StoredProduct};
pub use repositories::CatalogStore;
pub use strategy::{CategoryAdmission, CategoryUrlPlan, RetailerProfile, StrategyCatalog, StructuralStrategy};
