//! Cleaning and analysis of exported catalog data

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::domain::product::ExportedProduct;
use crate::domain::services::infer_specs;
use crate::infrastructure::config::MaintenanceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceThresholds {
    /// Prices above this are treated as parse errors and removed
    pub suspicious_price: Decimal,
    pub expensive_price: Decimal,
    pub expensive_listed: usize,
}

impl Default for MaintenanceThresholds {
    fn default() -> Self {
        Self::from(&MaintenanceConfig::default())
    }
}

impl From<&MaintenanceConfig> for MaintenanceThresholds {
    fn from(config: &MaintenanceConfig) -> Self {
        Self {
            suspicious_price: Decimal::from_f64(config.suspicious_price_threshold).unwrap_or(Decimal::new(5000, 0)),
            expensive_price: Decimal::from_f64(config.expensive_price_threshold).unwrap_or(Decimal::new(1000, 0)),
            expensive_listed: config.expensive_items_listed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub original: usize,
    pub cleaned: usize,
    pub removed: usize,
    pub price_fixes: usize,
    pub spec_enhancements: usize,
}

impl fmt::Display for CleaningReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cleaning summary:")?;
        writeln!(f, "  original products:  {}", self.original)?;
        writeln!(f, "  cleaned products:   {}", self.cleaned)?;
        writeln!(f, "  removed products:   {}", self.removed)?;
        writeln!(f, "  price fixes:        {}", self.price_fixes)?;
        write!(f, "  spec enhancements:  {}", self.spec_enhancements)
    }
}

/// Drop suspicious prices, zero out non-positive ones and fill missing specs
/// from the product name. Existing spec fields are never overwritten.
pub fn clean_records(records: Vec<ExportedProduct>, thresholds: &MaintenanceThresholds) -> (Vec<ExportedProduct>, CleaningReport) {
    let mut report = CleaningReport {
        original: records.len(),
        ..Default::default()
    };
    let mut cleaned = Vec::with_capacity(records.len());

    for mut product in records {
        if product.price > thresholds.suspicious_price {
            warn!("Removing product with suspicious price: {} - ${}", product.name, product.price);
            report.removed += 1;
            continue;
        }

        if product.price <= Decimal::ZERO && (product.price != Decimal::ZERO || product.availability != 0) {
            product.price = Decimal::ZERO;
            product.availability = 0;
            report.price_fixes += 1;
        }

        if product.specs.fill_missing_from(infer_specs(&product.name, "", "")) {
            report.spec_enhancements += 1;
        }

        cleaned.push(product);
    }

    report.cleaned = cleaned.len();
    (cleaned, report)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceStats {
    pub min: Decimal,
    pub max: Decimal,
    pub average: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogAnalysis {
    pub total: usize,
    /// Over priced products only
    pub prices: Option<PriceStats>,
    pub expensive_threshold: Decimal,
    pub expensive_total: usize,
    /// At most `expensive_listed` entries, in file order
    pub expensive: Vec<(String, Decimal)>,
    pub layouts: BTreeMap<String, usize>,
    pub without_layout: usize,
    pub categories: BTreeMap<String, usize>,
}

pub fn analyze_records(records: &[ExportedProduct], thresholds: &MaintenanceThresholds) -> CatalogAnalysis {
    let priced: Vec<Decimal> = records.iter().map(|p| p.price).filter(|p| *p > Decimal::ZERO).collect();
    let prices = match (priced.iter().min(), priced.iter().max()) {
        (Some(min), Some(max)) => Some(PriceStats {
            min: *min,
            max: *max,
            average: (priced.iter().sum::<Decimal>() / Decimal::from(priced.len())).round_dp(2),
        }),
        _ => None,
    };

    let expensive_all: Vec<&ExportedProduct> = records.iter().filter(|p| p.price > thresholds.expensive_price).collect();

    let mut layouts = BTreeMap::new();
    let mut without_layout = 0;
    let mut categories = BTreeMap::new();
    for product in records {
        match &product.specs.layout {
            Some(layout) => *layouts.entry(layout.clone()).or_insert(0) += 1,
            None => without_layout += 1,
        }
        *categories.entry(product.category.as_str().to_string()).or_insert(0) += 1;
    }

    CatalogAnalysis {
        total: records.len(),
        prices,
        expensive_threshold: thresholds.expensive_price,
        expensive_total: expensive_all.len(),
        expensive: expensive_all
            .iter()
            .take(thresholds.expensive_listed)
            .map(|p| (p.name.clone(), p.price))
            .collect(),
        layouts,
        without_layout,
        categories,
    }
}

impl fmt::Display for CatalogAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total products: {}", self.total)?;
        if let Some(prices) = &self.prices {
            writeln!(f, "\nPrice analysis:")?;
            writeln!(f, "  min price:     ${:.2}", prices.min)?;
            writeln!(f, "  max price:     ${:.2}", prices.max)?;
            writeln!(f, "  average price: ${:.2}", prices.average)?;
        }
        if !self.expensive.is_empty() {
            writeln!(f, "\nExpensive items (>${}, {} total):", self.expensive_threshold, self.expensive_total)?;
            for (name, price) in &self.expensive {
                writeln!(f, "  {name}: ${price}")?;
            }
        }
        writeln!(f, "\nLayout analysis:")?;
        writeln!(f, "  products without layout: {}", self.without_layout)?;
        for (layout, count) in &self.layouts {
            writeln!(f, "  {layout}: {count}")?;
        }
        writeln!(f, "\nCategory analysis:")?;
        for (category, count) in &self.categories {
            writeln!(f, "  {category}: {count}")?;
        }
        Ok(())
    }
}
