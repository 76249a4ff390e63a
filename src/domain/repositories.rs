//! Repository interfaces for the product catalog
//!
//! The catalog is written after each unit completes. Implementations must
//! make a single `upsert` atomic; callers serialize writes per product key.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::product::{Category, StoredProduct};
use crate::domain::product::ProductRecord;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert or replace a record, keyed by `ProductRecord::product_id`.
    /// Returns the record id.
    async fn upsert(&self, record: &ProductRecord) -> Result<String>;

    /// Append one price observation. History grows by one entry per call,
    /// even when the price is unchanged.
    async fn append_price_history(&self, record_id: &str, price: Decimal, recorded_at: DateTime<Utc>) -> Result<()>;

    /// Records ordered by price ascending; with `None`, by category then price.
    async fn query_by_category(&self, category: Option<Category>) -> Result<Vec<StoredProduct>>;

    /// Price observations for one record, oldest first
    async fn price_history(&self, record_id: &str) -> Result<Vec<(Decimal, DateTime<Utc>)>>;

    async fn count_products(&self) -> Result<u64>;
}
