//! Built-in retailer profiles
//!
//! Each retailer is plain data: a strategy catalog plus per-category URL
//! plans. Paths are relative to the retailer's base URL.

use std::collections::BTreeMap;

use crate::domain::product::Category;
use crate::domain::strategy::{CategoryAdmission, CategoryUrlPlan, RetailerProfile, StrategyCatalog, StructuralStrategy};

fn plans(entries: Vec<(Category, Vec<CategoryUrlPlan>)>) -> BTreeMap<Category, Vec<CategoryUrlPlan>> {
    entries.into_iter().collect()
}

pub fn kbdfans() -> RetailerProfile {
    let catalog = StrategyCatalog::new(vec![
        StructuralStrategy::new(
            "product-item",
            "div.product-item",
            "h3.product-item__title, a.grid-product__title, h3, a",
            "span.price, span.money, div.price",
            "a",
            "img",
        ),
        StructuralStrategy::new(
            "grid-product",
            "div.grid-product",
            "a.grid-product__title, h3.product-item__title, h3, a",
            "span.price, span.money, div.price",
            "a",
            "img",
        ),
        StructuralStrategy::new(
            "product-block",
            ".product-block",
            ".product-block__title, h3, a",
            ".price, .money",
            "a",
            "img",
        ),
    ]);

    RetailerProfile {
        key: "kbdfans".to_string(),
        name: "KBDfans".to_string(),
        base_url: "https://kbdfans.com".to_string(),
        catalog,
        category_plans: plans(vec![
            (Category::Switches, vec![CategoryUrlPlan::single("/collections/switches")]),
            (Category::Keycaps, vec![CategoryUrlPlan::single("/collections/keycaps")]),
            (Category::Case, vec![CategoryUrlPlan::single("/collections/case")]),
            (Category::Pcb, vec![CategoryUrlPlan::single("/collections/pcb")]),
            (Category::Stabilizers, vec![CategoryUrlPlan::single("/collections/stabilizers")]),
        ]),
        admission: CategoryAdmission::Strict,
    }
}

pub fn novelkeys() -> RetailerProfile {
    let catalog = StrategyCatalog::new(vec![
        StructuralStrategy::new(
            "product-card",
            ".product-card, .grid-product, .product-item",
            ".product-card__title, .grid-product__title, h3, h4",
            ".price, .money, .product-card__price",
            "a",
            "img",
        ),
        StructuralStrategy::new(
            "data-product",
            "div[data-product-id], article, .product",
            ".product-title, .title, h2, h3",
            ".price, .cost, [class*=\"price\"]",
            "a",
            "img",
        ),
        StructuralStrategy::new(
            "shopify-grid",
            ".grid__item, .collection-product, li[class*=\"product\"]",
            ".product-name, .grid-product__title, h3, h4",
            ".price, .money, [data-price]",
            "a",
            "img",
        ),
    ]);

    RetailerProfile {
        key: "novelkeys".to_string(),
        name: "NovelKeys".to_string(),
        base_url: "https://novelkeys.com".to_string(),
        catalog,
        category_plans: plans(vec![
            (Category::Switches, vec![CategoryUrlPlan::single("/collections/switches")]),
            (Category::Keycaps, vec![CategoryUrlPlan::single("/collections/keycaps")]),
            (
                Category::Case,
                vec![CategoryUrlPlan::with_alternatives(
                    "/collections/keyboards",
                    ["/collections/diy", "/collections/kits"],
                )],
            ),
            (
                Category::Pcb,
                vec![CategoryUrlPlan::with_alternatives(
                    "/collections/pcbs",
                    ["/collections/keyboards", "/collections/diy"],
                )],
            ),
            // stabilizers are listed with accessories and inside switch collections
            (
                Category::Stabilizers,
                vec![
                    CategoryUrlPlan::with_alternatives("/collections/accessories", ["/collections/parts"]),
                    CategoryUrlPlan::single("/collections/switches"),
                ],
            ),
        ]),
        admission: CategoryAdmission::SharedCollections,
    }
}

pub fn mechanicalkeyboards() -> RetailerProfile {
    let list = |id: u32| CategoryUrlPlan::single(format!("/shop/index.php?l=product_list&c={id}"));

    let catalog = StrategyCatalog::new(vec![
        StructuralStrategy::new(
            "product-listing",
            "div.product_listing_container",
            "a.product_listing_name, h3, h4, a",
            "span.product_listing_price, span.price, div.price",
            "a.product_listing_name, a",
            "img",
        )
        .with_description(".product_listing_description")
        .with_stock("span.product_listing_stock"),
        StructuralStrategy::new(
            "product",
            "div.product",
            "h3, h4, a",
            "span.price, div.price",
            "a",
            "img",
        )
        .with_description(".product_listing_description")
        .with_stock("span.product_listing_stock"),
        StructuralStrategy::new(
            "generic",
            ".product-item, .item, [class*=\"product\"]",
            "h3, h4, a",
            "span.price, div.price",
            "a",
            "img",
        ),
    ]);

    RetailerProfile {
        key: "mechanicalkeyboards".to_string(),
        name: "MechanicalKeyboards".to_string(),
        base_url: "https://mechanicalkeyboards.com".to_string(),
        catalog,
        category_plans: plans(vec![
            (Category::Switches, vec![list(107)]),
            (Category::Keycaps, vec![list(40)]),
            (Category::Case, vec![list(6)]),
            (Category::Pcb, vec![list(300)]),
            (Category::Stabilizers, vec![list(306)]),
        ]),
        admission: CategoryAdmission::Strict,
    }
}

/// All built-in profiles in default run order
pub fn all_profiles() -> Vec<RetailerProfile> {
    vec![kbdfans(), novelkeys(), mechanicalkeyboards()]
}

/// Look a profile up by key or display name, case-insensitively
pub fn find_profile(name: &str) -> Option<RetailerProfile> {
    let wanted = name.trim().to_lowercase();
    all_profiles()
        .into_iter()
        .find(|p| p.key == wanted || p.name.to_lowercase() == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::parsing::ProductListParser;

    #[test]
    fn test_every_strategy_compiles() {
        for profile in all_profiles() {
            let parser = ProductListParser::new(&profile.catalog).unwrap();
            assert_eq!(
                parser.strategy_count(),
                profile.catalog.strategies.len(),
                "{} has a strategy with an invalid locator",
                profile.name
            );
        }
    }

    #[test]
    fn test_every_profile_covers_harvestable_categories() {
        for profile in all_profiles() {
            for category in Category::HARVESTABLE {
                assert!(profile.supports(category), "{} lacks {}", profile.name, category);
            }
        }
    }

    #[test]
    fn test_novelkeys_plans() {
        let nk = novelkeys();
        let pcb: Vec<&str> = nk.plans_for(Category::Pcb)[0].urls().collect();
        assert_eq!(pcb, vec!["/collections/pcbs", "/collections/keyboards", "/collections/diy"]);
        assert_eq!(nk.plans_for(Category::Stabilizers).len(), 2);
        assert_eq!(nk.admission, CategoryAdmission::SharedCollections);
    }

    #[test]
    fn test_find_profile() {
        assert_eq!(find_profile("NovelKeys").map(|p| p.key), Some("novelkeys".to_string()));
        assert_eq!(find_profile(" kbdfans ").map(|p| p.name), Some("KBDfans".to_string()));
        assert!(find_profile("amazon").is_none());
    }
}
