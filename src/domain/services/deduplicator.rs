//! Duplicate removal for harvested records

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::product::ProductRecord;

/// Counts from one deduplication pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicationAnalysis {
    pub total: usize,
    pub unique: usize,
    pub duplicates_removed: usize,
}

/// Removes records sharing the same `(name, price)` key.
///
/// The first occurrence is kept and input order is preserved. The price is
/// compared by value, so `12.9` and `12.90` collide.
#[derive(Debug, Default, Clone, Copy)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }

    fn key(record: &ProductRecord) -> (String, Decimal) {
        (record.name.clone(), record.price.normalize())
    }

    pub fn dedupe(&self, records: Vec<ProductRecord>) -> Vec<ProductRecord> {
        self.dedupe_with_analysis(records).0
    }

    pub fn dedupe_with_analysis(&self, records: Vec<ProductRecord>) -> (Vec<ProductRecord>, DuplicationAnalysis) {
        let total = records.len();
        let mut seen = HashSet::with_capacity(total);
        let unique: Vec<ProductRecord> = records
            .into_iter()
            .filter(|record| seen.insert(Self::key(record)))
            .collect();

        let analysis = DuplicationAnalysis {
            total,
            unique: unique.len(),
            duplicates_removed: total - unique.len(),
        };
        (unique, analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::Category;
    use proptest::prelude::*;

    fn record(name: &str, cents: i64, retailer: &str) -> ProductRecord {
        ProductRecord::new(name, Category::Switches, Decimal::new(cents, 2), retailer)
    }

    #[test]
    fn test_first_occurrence_wins() {
        let records = vec![
            record("Gateron Yellow", 450, "KBDfans"),
            record("Cherry MX Black", 550, "KBDfans"),
            record("Gateron Yellow", 450, "NovelKeys"),
            record("Gateron Yellow", 500, "KBDfans"),
        ];
        let (unique, analysis) = Deduplicator::new().dedupe_with_analysis(records);

        let names: Vec<(&str, &str)> = unique.iter().map(|r| (r.name.as_str(), r.retailer.as_str())).collect();
        assert_eq!(
            names,
            vec![("Gateron Yellow", "KBDfans"), ("Cherry MX Black", "KBDfans"), ("Gateron Yellow", "KBDfans")]
        );
        assert_eq!(analysis.duplicates_removed, 1);
        assert_eq!(analysis.unique, 3);
    }

    #[test]
    fn test_price_scale_does_not_matter() {
        let a = ProductRecord::new("Tofu60", Category::Case, Decimal::new(129, 1), "KBDfans");
        let b = ProductRecord::new("Tofu60", Category::Case, Decimal::new(1290, 2), "KBDfans");
        assert_eq!(Deduplicator::new().dedupe(vec![a, b]).len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let (unique, analysis) = Deduplicator::new().dedupe_with_analysis(Vec::new());
        assert!(unique.is_empty());
        assert_eq!(analysis, DuplicationAnalysis::default());
    }

    proptest! {
        #[test]
        fn prop_dedupe_is_idempotent(entries in prop::collection::vec(("[a-c]{1,2}", 0i64..4), 0..20)) {
            let records: Vec<ProductRecord> = entries
                .iter()
                .map(|(name, cents)| record(name, *cents, "Shop"))
                .collect();
            let input_len = records.len();
            let once = Deduplicator::new().dedupe(records);
            let twice = Deduplicator::new().dedupe(once.clone());
            prop_assert_eq!(&once, &twice);
            prop_assert!(once.len() <= input_len);
        }

        #[test]
        fn prop_dedupe_output_keys_are_distinct(entries in prop::collection::vec(("[a-c]{1,2}", 0i64..4, 1u32..3), 0..20)) {
            // mixed scale so equal prices can differ in representation
            let records: Vec<ProductRecord> = entries
                .iter()
                .map(|(name, cents, scale)| {
                    let price = Decimal::new(*cents * 10i64.pow(*scale - 1), 1 + *scale);
                    ProductRecord::new(name.as_str(), Category::Switches, price, "Shop")
                })
                .collect();
            let once = Deduplicator::new().dedupe(records);
            let keys: HashSet<(String, Decimal)> = once.iter().map(|r| (r.name.clone(), r.price.normalize())).collect();
            prop_assert_eq!(keys.len(), once.len());
        }
    }
}
