//! In-memory catalog store with the same ordering rules as the SQLite one.
//! Used by `harvest --dry-run` and by tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::product::{Category, ProductRecord, StoredProduct};
use crate::domain::repositories::CatalogStore;

#[derive(Default)]
pub struct InMemoryCatalogStore {
    products: RwLock<HashMap<String, StoredProduct>>,
    history: RwLock<HashMap<String, Vec<(Decimal, DateTime<Utc>)>>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sort_key(product: &StoredProduct) -> (&'static str, Decimal, &str) {
    (product.record.category.as_str(), product.record.price, product.record.name.as_str())
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn upsert(&self, record: &ProductRecord) -> Result<String> {
        let id = record.product_id();
        let now = Utc::now();
        let mut products = self.products.write().await;

        let created_at = products.get(&id).map_or(now, |existing| existing.created_at);
        products.insert(
            id.clone(),
            StoredProduct {
                id: id.clone(),
                record: record.clone(),
                created_at,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn append_price_history(&self, record_id: &str, price: Decimal, recorded_at: DateTime<Utc>) -> Result<()> {
        self.history
            .write()
            .await
            .entry(record_id.to_string())
            .or_default()
            .push((price, recorded_at));
        Ok(())
    }

    async fn query_by_category(&self, category: Option<Category>) -> Result<Vec<StoredProduct>> {
        let products = self.products.read().await;
        let mut selected: Vec<StoredProduct> = products
            .values()
            .filter(|p| category.map_or(true, |c| p.record.category == c))
            .cloned()
            .collect();
        selected.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        Ok(selected)
    }

    async fn price_history(&self, record_id: &str) -> Result<Vec<(Decimal, DateTime<Utc>)>> {
        Ok(self.history.read().await.get(record_id).cloned().unwrap_or_default())
    }

    async fn count_products(&self) -> Result<u64> {
        Ok(self.products.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_keeps_created_at() -> Result<()> {
        let store = InMemoryCatalogStore::new();
        let record = ProductRecord::new("KBD67 Lite", Category::Case, Decimal::new(10900, 2), "KBDfans");

        let id = store.upsert(&record).await?;
        let first = store.query_by_category(None).await?.remove(0);
        store.upsert(&record).await?;
        let second = store.query_by_category(None).await?.remove(0);

        assert_eq!(store.count_products().await?, 1);
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.id, id);
        Ok(())
    }

    #[tokio::test]
    async fn test_category_filter_and_order() -> Result<()> {
        let store = InMemoryCatalogStore::new();
        for (name, category, cents) in [
            ("Yellow", Category::Switches, 450),
            ("Red", Category::Switches, 300),
            ("Olivia", Category::Keycaps, 12000),
        ] {
            store.upsert(&ProductRecord::new(name, category, Decimal::new(cents, 2), "Shop")).await?;
        }

        let switches = store.query_by_category(Some(Category::Switches)).await?;
        let names: Vec<&str> = switches.iter().map(|p| p.record.name.as_str()).collect();
        assert_eq!(names, vec!["Red", "Yellow"]);

        let all = store.query_by_category(None).await?;
        assert_eq!(all[0].record.category, Category::Keycaps);
        Ok(())
    }
}
