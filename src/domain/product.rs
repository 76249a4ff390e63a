//! Product records harvested from retailer listing pages
//!
//! A `ProductRecord` is created once per listing container by the extraction
//! engine, re-categorized once, and treated as immutable after that.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Keyboard component category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Case,
    Pcb,
    Switches,
    Keycaps,
    Stabilizers,
    Unknown,
}

impl Category {
    /// Categories a harvest can target (everything except `Unknown`)
    pub const HARVESTABLE: [Category; 5] = [
        Category::Switches,
        Category::Keycaps,
        Category::Case,
        Category::Pcb,
        Category::Stabilizers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Case => "case",
            Category::Pcb => "pcb",
            Category::Switches => "switches",
            Category::Keycaps => "keycaps",
            Category::Stabilizers => "stabilizers",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "case" | "cases" => Ok(Category::Case),
            "pcb" | "pcbs" => Ok(Category::Pcb),
            "switches" | "switch" => Ok(Category::Switches),
            "keycaps" | "keycap" => Ok(Category::Keycaps),
            "stabilizers" | "stabilizer" | "stabs" => Ok(Category::Stabilizers),
            "unknown" => Ok(Category::Unknown),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// Specification attributes inferred from free text.
///
/// Every field is independently optional; serialized as a JSON object that
/// only contains the keys that were found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSpecs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pins: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
}

impl ProductSpecs {
    pub fn is_empty(&self) -> bool {
        self.layout.is_none()
            && self.switch_type.is_none()
            && self.pins.is_none()
            && self.facing.is_none()
            && self.material.is_none()
    }

    /// Fill fields that are missing here from `other`, never overwriting.
    /// Returns true when at least one field was added.
    pub fn fill_missing_from(&mut self, other: ProductSpecs) -> bool {
        let before = self.clone();
        if self.layout.is_none() {
            self.layout = other.layout;
        }
        if self.switch_type.is_none() {
            self.switch_type = other.switch_type;
        }
        if self.pins.is_none() {
            self.pins = other.pins;
        }
        if self.facing.is_none() {
            self.facing = other.facing;
        }
        if self.material.is_none() {
            self.material = other.material;
        }
        *self != before
    }
}

pub const DEFAULT_CURRENCY: &str = "USD";

/// One harvested product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub category: Category,
    /// In `[0.01, 10000.00]`, or exactly zero for "unparseable/unavailable"
    pub price: Decimal,
    pub currency: String,
    pub availability: bool,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    pub retailer: String,
    pub specs: ProductSpecs,
}

impl ProductRecord {
    pub fn new(name: impl Into<String>, category: Category, price: Decimal, retailer: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            category,
            price,
            currency: DEFAULT_CURRENCY.to_string(),
            availability: !price.is_zero(),
            product_url: None,
            image_url: None,
            retailer: retailer.into(),
            specs: ProductSpecs::default(),
        }
    }

    /// Stable store key derived from retailer and name.
    ///
    /// Lowercased, spaces and slashes become dashes, anything other than
    /// alphanumerics, `-` and `_` is dropped, capped at 50 characters.
    pub fn product_id(&self) -> String {
        let raw = format!("{}-{}", self.retailer.to_lowercase(), self.name.to_lowercase())
            .replace([' ', '/'], "-");
        raw.chars()
            .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
            .take(50)
            .collect()
    }

    /// Enforce the zero-price invariant: a record without a price is never available.
    pub fn normalize_availability(&mut self) {
        if self.price.is_zero() {
            self.availability = false;
        }
    }
}

/// Record as stored by the catalog, with persistence metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredProduct {
    pub id: String,
    pub record: ProductRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Exported JSON shape, one object per product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedProduct {
    pub name: String,
    pub category: Category,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub retailer: String,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub specs: ProductSpecs,
    pub availability: u8,
}

impl From<&ProductRecord> for ExportedProduct {
    fn from(record: &ProductRecord) -> Self {
        Self {
            name: record.name.clone(),
            category: record.category,
            price: record.price,
            retailer: record.retailer.clone(),
            product_url: record.product_url.clone(),
            image_url: record.image_url.clone(),
            specs: record.specs.clone(),
            availability: u8::from(record.availability),
        }
    }
}

impl From<ExportedProduct> for ProductRecord {
    fn from(exported: ExportedProduct) -> Self {
        Self {
            name: exported.name,
            category: exported.category,
            price: exported.price,
            currency: DEFAULT_CURRENCY.to_string(),
            availability: exported.availability != 0,
            product_url: exported.product_url,
            image_url: exported.image_url,
            retailer: exported.retailer,
            specs: exported.specs,
        }
    }
}
