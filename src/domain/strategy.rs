//! Structural strategies and fallback URL plans
//!
//! A retailer is described entirely by data: an ordered list of candidate
//! page layouts plus, per category, ordered lists of URLs to try. Retailer
//! differences that cannot be expressed as data are limited to the
//! [`CategoryAdmission`] rule.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::product::Category;

/// Locators for one candidate page layout.
///
/// Locators are CSS selectors. Comma separated alternatives are tried in
/// the order written, not in document order. The container locator is the
/// exception: it is one group matched in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralStrategy {
    pub name: String,
    pub container: String,
    pub title: String,
    pub price: String,
    pub link: String,
    pub image: String,
    /// Optional free-text description fed into spec inference
    #[serde(default)]
    pub description: Option<String>,
    /// Optional stock/availability label
    #[serde(default)]
    pub stock: Option<String>,
}

impl StructuralStrategy {
    pub fn new(
        name: impl Into<String>,
        container: impl Into<String>,
        title: impl Into<String>,
        price: impl Into<String>,
        link: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            container: container.into(),
            title: title.into(),
            price: price.into(),
            link: link.into(),
            image: image.into(),
            description: None,
            stock: None,
        }
    }

    pub fn with_description(mut self, locator: impl Into<String>) -> Self {
        self.description = Some(locator.into());
        self
    }

    pub fn with_stock(mut self, locator: impl Into<String>) -> Self {
        self.stock = Some(locator.into());
        self
    }
}

/// Ordered strategies for one retailer, tried in priority order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyCatalog {
    pub strategies: Vec<StructuralStrategy>,
    /// Elements inside a container that mark the product as sold out
    pub sold_out_indicators: String,
}

pub const DEFAULT_SOLD_OUT_INDICATORS: &str = ".sold-out, .unavailable, [class*=\"sold\"]";

impl StrategyCatalog {
    pub fn new(strategies: Vec<StructuralStrategy>) -> Self {
        Self {
            strategies,
            sold_out_indicators: DEFAULT_SOLD_OUT_INDICATORS.to_string(),
        }
    }
}

/// Primary URL plus ordered alternatives for one category.
///
/// URLs may be relative to the retailer base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUrlPlan {
    pub primary: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

impl CategoryUrlPlan {
    pub fn single(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            alternatives: Vec::new(),
        }
    }

    pub fn with_alternatives<I, S>(primary: impl Into<String>, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            primary: primary.into(),
            alternatives: alternatives.into_iter().map(Into::into).collect(),
        }
    }

    /// Primary first, then alternatives in order
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.alternatives.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        1 + self.alternatives.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Decides whether a candidate whose text-derived category is `derived`
/// belongs to a scrape unit targeting `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryAdmission {
    /// Keep when the derived category equals the target, or nothing was derived
    #[default]
    Strict,
    /// Strict, plus PCBs listed with cases and anything named "stab" on a
    /// stabilizer scan (NovelKeys lists both in shared collections)
    SharedCollections,
}

impl CategoryAdmission {
    pub fn admits(&self, name: &str, derived: Category, target: Category) -> bool {
        if derived == target || derived == Category::Unknown {
            return true;
        }
        match self {
            CategoryAdmission::Strict => false,
            CategoryAdmission::SharedCollections => {
                (target == Category::Case && derived == Category::Pcb)
                    || (target == Category::Stabilizers && name.to_lowercase().contains("stab"))
            }
        }
    }
}

/// Everything needed to harvest one retailer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetailerProfile {
    /// Short lowercase key used on the command line
    pub key: String,
    /// Display name stored on records
    pub name: String,
    pub base_url: String,
    pub catalog: StrategyCatalog,
    /// Per category, one or more plans. Records from several plans are
    /// unioned and deduplicated; within a plan the first URL that yields
    /// records wins.
    pub category_plans: BTreeMap<Category, Vec<CategoryUrlPlan>>,
    #[serde(default)]
    pub admission: CategoryAdmission,
}

impl RetailerProfile {
    pub fn plans_for(&self, category: Category) -> &[CategoryUrlPlan] {
        self.category_plans.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn supports(&self, category: Category) -> bool {
        !self.plans_for(category).is_empty()
    }
}

impl fmt::Display for RetailerProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.base_url)
    }
}
