//! JSON export of the catalog
//!
//! The file is a JSON array of [`ExportedProduct`] objects, the same shape
//! `clean` and `analyze` read back.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use crate::domain::product::ExportedProduct;
use crate::domain::repositories::CatalogStore;

/// Write every stored product to `path`, ordered by category then price
pub async fn export_catalog(store: &dyn CatalogStore, path: &Path) -> Result<PathBuf> {
    let products: Vec<ExportedProduct> = store
        .query_by_category(None)
        .await?
        .iter()
        .map(|stored| ExportedProduct::from(&stored.record))
        .collect();

    write_export(path, &products).await?;
    info!("Exported {} products to {:?}", products.len(), path);
    Ok(path.to_path_buf())
}

pub async fn write_export(path: &Path, products: &[ExportedProduct]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create export directory {:?}", parent))?;
    }
    let content = serde_json::to_string_pretty(products).context("Failed to serialize export")?;
    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write export {:?}", path))
}

pub async fn read_export(path: &Path) -> Result<Vec<ExportedProduct>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read export {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Export {:?} is not a product array", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{Category, ProductRecord};
    use crate::infrastructure::memory_catalog_store::InMemoryCatalogStore;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_export_then_read() -> Result<()> {
        let store = InMemoryCatalogStore::new();
        let mut record = ProductRecord::new("Tofu65", Category::Case, Decimal::ZERO, "KBDfans");
        record.normalize_availability();
        store.upsert(&record).await?;
        store
            .upsert(&ProductRecord::new("Gateron Yellow", Category::Switches, Decimal::new(450, 2), "KBDfans"))
            .await?;

        let dir = tempdir()?;
        let path = dir.path().join("exports").join("latest-export.json");
        export_catalog(&store, &path).await?;

        let raw: serde_json::Value = serde_json::from_str(&tokio::fs::read_to_string(&path).await?)?;
        assert_eq!(raw[0]["category"], "case");
        assert_eq!(raw[0]["availability"], 0);
        assert_eq!(raw[1]["price"], 4.5);

        let products = read_export(&path).await?;
        assert_eq!(products.len(), 2);
        assert_eq!(products[1].name, "Gateron Yellow");
        Ok(())
    }

    #[tokio::test]
    async fn test_read_rejects_non_array() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, r#"{"name": "x"}"#).await?;
        assert!(read_export(&path).await.is_err());
        Ok(())
    }
}
