//! SQLite catalog store
//!
//! Products are keyed by `ProductRecord::product_id`. Prices are stored as
//! REAL and read back rounded to cents.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use crate::domain::product::{Category, ProductRecord, ProductSpecs, StoredProduct};
use crate::domain::repositories::CatalogStore;

const SELECT_PRODUCTS: &str = r#"
    SELECT id, name, category, price, currency, availability, image_url, product_url,
           retailer, specs, created_at, updated_at
    FROM products
"#;

#[derive(Clone)]
pub struct SqliteCatalogStore {
    pool: Arc<SqlitePool>,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

fn price_to_real(price: Decimal) -> f64 {
    price.to_f64().unwrap_or_default()
}

fn price_from_real(value: f64) -> Decimal {
    Decimal::from_f64(value).map(|d| d.round_dp(2)).unwrap_or_default()
}

fn row_to_stored(row: &SqliteRow) -> Result<StoredProduct> {
    let category: String = row.try_get("category")?;
    let category = category
        .parse::<Category>()
        .map_err(|e| anyhow::anyhow!("Corrupt category in catalog: {}", e))?;
    let specs: String = row.try_get("specs")?;
    let specs: ProductSpecs = serde_json::from_str(&specs).context("Corrupt specs JSON in catalog")?;
    let availability: i64 = row.try_get("availability")?;

    Ok(StoredProduct {
        id: row.try_get("id")?,
        record: ProductRecord {
            name: row.try_get("name")?,
            category,
            price: price_from_real(row.try_get("price")?),
            currency: row.try_get("currency")?,
            availability: availability != 0,
            product_url: row.try_get("product_url")?,
            image_url: row.try_get("image_url")?,
            retailer: row.try_get("retailer")?,
            specs,
        },
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn upsert(&self, record: &ProductRecord) -> Result<String> {
        let id = record.product_id();
        let now = Utc::now();
        let specs = serde_json::to_string(&record.specs).context("Failed to serialize specs")?;

        sqlx::query(
            r#"
            INSERT INTO products
            (id, name, category, price, currency, availability, image_url, product_url,
             retailer, specs, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                price = excluded.price,
                currency = excluded.currency,
                availability = excluded.availability,
                image_url = excluded.image_url,
                product_url = excluded.product_url,
                retailer = excluded.retailer,
                specs = excluded.specs,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&record.name)
        .bind(record.category.as_str())
        .bind(price_to_real(record.price))
        .bind(&record.currency)
        .bind(i64::from(record.availability))
        .bind(&record.image_url)
        .bind(&record.product_url)
        .bind(&record.retailer)
        .bind(specs)
        .bind(now)
        .bind(now)
        .execute(&*self.pool)
        .await
        .with_context(|| format!("Failed to upsert product {}", id))?;

        Ok(id)
    }

    async fn append_price_history(&self, record_id: &str, price: Decimal, recorded_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("INSERT INTO price_history (product_id, price, recorded_at) VALUES (?, ?, ?)")
            .bind(record_id)
            .bind(price_to_real(price))
            .bind(recorded_at)
            .execute(&*self.pool)
            .await
            .with_context(|| format!("Failed to record price history for {}", record_id))?;
        Ok(())
    }

    async fn query_by_category(&self, category: Option<Category>) -> Result<Vec<StoredProduct>> {
        let rows = match category {
            Some(category) => {
                let sql = format!("{} WHERE category = ? ORDER BY price ASC, name ASC", SELECT_PRODUCTS);
                sqlx::query(&sql)
                    .bind(category.as_str())
                    .fetch_all(&*self.pool)
                    .await?
            }
            None => {
                let sql = format!("{} ORDER BY category ASC, price ASC, name ASC", SELECT_PRODUCTS);
                sqlx::query(&sql).fetch_all(&*self.pool).await?
            }
        };

        rows.iter().map(row_to_stored).collect()
    }

    async fn price_history(&self, record_id: &str) -> Result<Vec<(Decimal, DateTime<Utc>)>> {
        let rows = sqlx::query("SELECT price, recorded_at FROM price_history WHERE product_id = ? ORDER BY recorded_at ASC, id ASC")
            .bind(record_id)
            .fetch_all(&*self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<(Decimal, DateTime<Utc>)> {
                Ok((price_from_real(row.try_get("price")?), row.try_get("recorded_at")?))
            })
            .collect()
    }

    async fn count_products(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&*self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;

    async fn store() -> Result<SqliteCatalogStore> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(SqliteCatalogStore::new(db.pool().clone()))
    }

    fn record(name: &str, category: Category, cents: i64) -> ProductRecord {
        ProductRecord::new(name, category, Decimal::new(cents, 2), "KBDfans")
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_by_key() -> Result<()> {
        let store = store().await?;
        let mut first = record("Tofu60 Case", Category::Case, 9900);
        first.specs.layout = Some("60%".into());

        let id = store.upsert(&first).await?;
        let mut second = first.clone();
        second.price = Decimal::new(8900, 2);
        assert_eq!(store.upsert(&second).await?, id);

        assert_eq!(store.count_products().await?, 1);
        let stored = store.query_by_category(Some(Category::Case)).await?;
        assert_eq!(stored[0].record.price, Decimal::new(8900, 2));
        assert_eq!(stored[0].record.specs.layout.as_deref(), Some("60%"));
        assert!(stored[0].created_at <= stored[0].updated_at);
        Ok(())
    }

    #[tokio::test]
    async fn test_price_history_accumulates() -> Result<()> {
        let store = store().await?;
        let rec = record("Gateron Yellow", Category::Switches, 450);
        let id = store.upsert(&rec).await?;
        store.append_price_history(&id, rec.price, Utc::now()).await?;
        store.append_price_history(&id, rec.price, Utc::now()).await?;

        let history = store.price_history(&id).await?;
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|(price, _)| *price == Decimal::new(450, 2)));
        Ok(())
    }

    #[tokio::test]
    async fn test_query_ordering() -> Result<()> {
        let store = store().await?;
        store.upsert(&record("Switch B", Category::Switches, 700)).await?;
        store.upsert(&record("Switch A", Category::Switches, 300)).await?;
        store.upsert(&record("Plate", Category::Case, 5000)).await?;

        let switches: Vec<String> = store
            .query_by_category(Some(Category::Switches))
            .await?
            .into_iter()
            .map(|p| p.record.name)
            .collect();
        assert_eq!(switches, vec!["Switch A", "Switch B"]);

        let all: Vec<Category> = store.query_by_category(None).await?.iter().map(|p| p.record.category).collect();
        assert_eq!(all, vec![Category::Case, Category::Switches, Category::Switches]);
        Ok(())
    }
}
