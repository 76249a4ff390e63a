//! Domain services
//!
//! Pure text normalization, deduplication, and the fetch seam.

pub mod crawling_services;
pub mod deduplicator;
pub mod field_normalizer;

pub use crawling_services::{FetchPolicy, FetchedPage, Fetcher};
pub use deduplicator::{Deduplicator, DuplicationAnalysis};
pub use field_normalizer::{
    classify_category, contains_out_of_stock_phrase, infer_specs, is_valid_product, parse_price, rejection_reason, PriceParseResult, Rejection,
};
