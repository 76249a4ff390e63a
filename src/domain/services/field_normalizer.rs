//! Field normalization for scraped listing text
//!
//! Pure functions that turn free text into typed fields: prices,
//! categories, specification attributes, and a validity verdict.
//! Nothing here fails; a field that cannot be derived is simply absent.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::domain::product::{Category, ProductSpecs};

/// Outcome of parsing a price label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceParseResult {
    Valid(Decimal),
    OutOfStock,
    Unparseable,
}

impl PriceParseResult {
    /// The parsed amount, or zero when there is none
    pub fn amount(&self) -> Decimal {
        match self {
            PriceParseResult::Valid(amount) => *amount,
            _ => Decimal::ZERO,
        }
    }

}

/// Smallest accepted price (one cent)
pub fn min_price() -> Decimal {
    Decimal::new(1, 2)
}

/// Largest accepted price
pub fn max_price() -> Decimal {
    Decimal::new(10_000, 0)
}

/// Phrases that mark a listing as not purchasable. Checked before any
/// numeric parsing.
pub const OUT_OF_STOCK_PHRASES: &[&str] = &[
    "out of stock",
    "sold out",
    "unavailable",
    "not available",
    "discontinued",
    "pre-order",
    "coming soon",
    "notify me",
    "email when available",
    "back in stock",
    "temporarily unavailable",
];

/// True when `text` contains any out-of-stock phrase (case-insensitive)
pub fn contains_out_of_stock_phrase(text: &str) -> bool {
    let lowered = text.to_lowercase();
    OUT_OF_STOCK_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

static FROM_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"from\s*(\d+\.?\d*)").unwrap());
// whole numeric token, so an oversized amount is never truncated into range
static BARE_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|[^\d.])(\d+(?:\.\d{1,2})?)").unwrap());
static GROUPED_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3},\d{3}\.?\d{0,2})").unwrap());
static RANGE_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.?\d*)\s*-\s*(\d+\.?\d*)").unwrap());

enum RangeCheck {
    InRange(Decimal),
    TooSmall,
    TooLarge(Decimal),
}

fn to_amount(raw: &str) -> Option<Decimal> {
    let cleaned = raw.replace(',', "");
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(cleaned).ok().map(|d| d.round_dp(2))
}

fn check_range(amount: Decimal) -> RangeCheck {
    if amount > max_price() {
        RangeCheck::TooLarge(amount)
    } else if amount < min_price() {
        RangeCheck::TooSmall
    } else {
        RangeCheck::InRange(amount)
    }
}

/// Parse a price label such as `"$12.99"`, `"From $45.00"` or `"1,234.56"`.
///
/// Out-of-stock phrases win over any numerals in the text. Patterns are
/// tried in order ("from X", bare amount, comma grouped) and the first
/// in-range match is returned. An amount above 10000 rejects the whole
/// label. A `A - B` range yields its lower bound as a last resort.
pub fn parse_price(text: &str) -> PriceParseResult {
    let lowered = text.trim().to_lowercase();
    if lowered.is_empty() {
        return PriceParseResult::Unparseable;
    }

    if contains_out_of_stock_phrase(&lowered) {
        debug!("Price label marks product out of stock: '{}'", text);
        return PriceParseResult::OutOfStock;
    }

    let stripped = lowered.replace(['$', '€', '£'], "").replace("usd", "");
    let ungrouped = stripped.replace(',', "");

    let candidates: [(&Regex, &str); 3] = [
        (&*FROM_PRICE, ungrouped.as_str()),
        (&*BARE_PRICE, ungrouped.as_str()),
        (&*GROUPED_PRICE, stripped.as_str()),
    ];

    for (pattern, haystack) in candidates {
        for captures in pattern.captures_iter(haystack) {
            let Some(amount) = captures.get(1).and_then(|m| to_amount(m.as_str())) else {
                continue;
            };
            match check_range(amount) {
                RangeCheck::InRange(amount) => return PriceParseResult::Valid(amount),
                RangeCheck::TooLarge(amount) => {
                    warn!("Rejected unreasonable price {} from '{}'", amount, text);
                    return PriceParseResult::Unparseable;
                }
                RangeCheck::TooSmall => continue,
            }
        }
    }

    if let Some(captures) = RANGE_PRICE.captures(&ungrouped) {
        if let Some(lower) = captures.get(1).and_then(|m| to_amount(m.as_str())) {
            if let RangeCheck::InRange(amount) = check_range(lower) {
                return PriceParseResult::Valid(amount);
            }
        }
    }

    debug!("Could not parse a valid price from '{}'", text);
    PriceParseResult::Unparseable
}

/// Keyword sets in priority order. The first set with any hit wins, so
/// "aluminum switch housing" resolves to switches before case.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Switches,
        &["switch", "switches", "mx", "gateron", "cherry", "kailh", "linear", "tactile", "clicky", "holy panda"],
    ),
    (
        Category::Keycaps,
        &["keycap", "keycaps", "pbt", "abs", "gmk", "cherry profile", "sa profile", "oem profile", "xda", "dsa"],
    ),
    (
        Category::Case,
        &["case", "housing", "aluminum", "tofu", "frame", "chassis", "keyboard kit", "plate"],
    ),
    (
        Category::Pcb,
        &["pcb", "circuit", "board", "hotswap", "hot-swap", "soldered"],
    ),
    (
        Category::Stabilizers,
        &["stabilizer", "stabilizers", "stab", "stabs", "durock", "cherry stab"],
    ),
];

/// Classify a product from its title, tags and URL
pub fn classify_category(title: &str, tags: &[&str], url: &str) -> Category {
    let blob = format!("{} {} {}", title, tags.join(" "), url).to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| blob.contains(keyword)))
        .map_or(Category::Unknown, |(category, _)| *category)
}

static LAYOUT_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("40%", r"40[%\s]|forty\s*percent|minila|planck"),
        ("60%", r"60[%\s]|sixty\s*percent|poker|hhkb|tofu60"),
        ("65%", r"65[%\s]|sixty.?five\s*percent|tofu65|nk65|kbd67|margo"),
        ("75%", r"75[%\s]|seventy.?five\s*percent|kbd75|gmmk\s*pro|kbdpad|id80"),
        ("TKL", r"tkl|tenkeyless|80[%\s]|eighty\s*percent|87\s*key"),
        ("96%", r"96[%\s]|ninety.?six\s*percent|compact\s*full"),
        ("Full", r"full\s*size|104\s*key|100[%\s]|full\s*layout"),
        ("1800", r"1800|compact\s*96|cp\s*layout"),
        ("Split", r"split|ergodox|kinesis|lily58"),
        ("Ortho", r"ortho|ortholinear|planck|preonic"),
        ("Alice", r"alice|arisu|maja"),
        ("Southpaw", r"southpaw|left\s*numpad"),
    ]
    .into_iter()
    .map(|(layout, pattern)| (layout, Regex::new(pattern).unwrap()))
    .collect()
});

/// Known board names and their layouts, matched as substrings
const KNOWN_BOARD_LAYOUTS: &[(&str, &str)] = &[
    ("tofu60", "60%"),
    ("tofu65", "65%"),
    ("kbd67", "65%"),
    ("nk65", "65%"),
    ("gmmk pro", "75%"),
    ("kbd75", "75%"),
    ("id80", "TKL"),
    ("margo", "65%"),
    ("mode65", "65%"),
    ("mode80", "TKL"),
    ("voice65", "65%"),
    ("mr suit", "TKL"),
    ("think6.5", "65%"),
    ("satisfaction75", "75%"),
    ("polaris", "60%"),
    ("prophet", "65%"),
    ("dz60", "60%"),
];

static PERCENT_SIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{2,3})%").unwrap());

/// Materials in scan order with their normalized names.
/// Matched on word boundaries so "pc" does not fire inside "pcb".
static MATERIALS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        ("aluminum", "aluminum"),
        ("aluminium", "aluminum"),
        ("plastic", "plastic"),
        ("abs", "abs"),
        ("pbt", "pbt"),
        ("polycarbonate", "polycarbonate"),
        ("pc", "polycarbonate"),
        ("brass", "brass"),
        ("steel", "steel"),
        ("titanium", "titanium"),
        ("carbon fiber", "carbon fiber"),
    ]
    .into_iter()
    .map(|(keyword, normalized)| (Regex::new(&format!(r"\b{keyword}\b")).unwrap(), normalized))
    .collect()
});

fn infer_layout(text: &str) -> Option<String> {
    if let Some((layout, _)) = LAYOUT_PATTERNS.iter().find(|(_, pattern)| pattern.is_match(text)) {
        return Some((*layout).to_string());
    }
    if let Some((_, layout)) = KNOWN_BOARD_LAYOUTS.iter().find(|(name, _)| text.contains(name)) {
        return Some((*layout).to_string());
    }
    PERCENT_SIZE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| format!("{}%", m.as_str()))
}

fn infer_switch_type(text: &str) -> Option<String> {
    if text.contains("linear") {
        Some("linear".to_string())
    } else if text.contains("tactile") {
        Some("tactile".to_string())
    } else if text.contains("clicky") || text.contains("click") {
        Some("clicky".to_string())
    } else {
        None
    }
}

fn infer_pins(text: &str) -> Option<u8> {
    if ["5-pin", "5 pin", "five pin"].iter().any(|p| text.contains(p)) {
        Some(5)
    } else if ["3-pin", "3 pin", "three pin"].iter().any(|p| text.contains(p)) {
        Some(3)
    } else {
        None
    }
}

fn infer_facing(text: &str) -> Option<String> {
    if text.contains("south-facing") || text.contains("south facing") {
        Some("south".to_string())
    } else if text.contains("north-facing") || text.contains("north facing") {
        Some("north".to_string())
    } else {
        None
    }
}

fn infer_material(text: &str) -> Option<String> {
    MATERIALS
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, normalized)| (*normalized).to_string())
}

/// Infer specification attributes from title, description and URL
pub fn infer_specs(title: &str, description: &str, url: &str) -> ProductSpecs {
    let text = format!("{title} {description} {url}").to_lowercase();
    ProductSpecs {
        layout: infer_layout(&text),
        switch_type: infer_switch_type(&text),
        pins: infer_pins(&text),
        facing: infer_facing(&text),
        material: infer_material(&text),
    }
}

/// Titles with these are services or fees, not products
const NON_PRODUCT_KEYWORDS: &[&str] = &[
    "gift card",
    "shipping",
    "tax",
    "warranty",
    "service",
    "insurance",
    "assembly",
    "repair",
    "consultation",
    "subscription",
    "membership",
    "tutorial",
    "course",
];

/// Peripherals that are not keyboard components, unless the title says "keyboard"
const NON_COMPONENT_KEYWORDS: &[&str] = &[
    "mouse",
    "mousepad",
    "monitor",
    "headset",
    "speaker",
    "webcam",
    "microphone",
    "chair",
    "desk",
    "cable",
];

const MIN_TITLE_CHARS: usize = 3;

/// Why a candidate was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    TitleTooShort,
    PriceOutOfRange(Decimal),
    NonProduct(&'static str),
    NonComponent(&'static str),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::TitleTooShort => write!(f, "title too short"),
            Rejection::PriceOutOfRange(price) => write!(f, "price {price} out of range"),
            Rejection::NonProduct(keyword) => write!(f, "non-product keyword '{keyword}'"),
            Rejection::NonComponent(keyword) => write!(f, "non-component keyword '{keyword}'"),
        }
    }
}

/// Reason a title/price pair is not a keyboard product, if any
pub fn rejection_reason(title: &str, price: Decimal) -> Option<Rejection> {
    let title = title.trim();
    if title.chars().count() < MIN_TITLE_CHARS {
        return Some(Rejection::TitleTooShort);
    }
    if price < min_price() || price > max_price() {
        return Some(Rejection::PriceOutOfRange(price));
    }

    let lowered = title.to_lowercase();
    if let Some(keyword) = NON_PRODUCT_KEYWORDS.iter().find(|k| lowered.contains(*k)) {
        return Some(Rejection::NonProduct(*keyword));
    }
    if !lowered.contains("keyboard") {
        if let Some(keyword) = NON_COMPONENT_KEYWORDS.iter().find(|k| lowered.contains(*k)) {
            return Some(Rejection::NonComponent(*keyword));
        }
    }
    None
}

pub fn is_valid_product(title: &str, price: Decimal) -> bool {
    rejection_reason(title, price).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[rstest]
    #[case("$12.99", "12.99")]
    #[case("1,234.56", "1234.56")]
    #[case("From $45.00", "45.00")]
    #[case("from $1,299.00", "1299.00")]
    #[case("Regular price $29.00 Sale price $19.00", "29.00")]
    #[case("€ 8.50", "8.50")]
    #[case("USD 110", "110")]
    #[case("£0.00 or £4.20", "4.20")]
    fn test_parse_valid_prices(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parse_price(input), PriceParseResult::Valid(dec(expected)));
    }

    #[rstest]
    #[case("Sold Out")]
    #[case("Pre-order")]
    #[case("Sold Out - was $45.00")]
    #[case("$19.99 back in stock soon")]
    #[case("Temporarily Unavailable")]
    #[case("DISCONTINUED $5")]
    fn test_out_of_stock_wins(#[case] input: &str) {
        assert_eq!(parse_price(input), PriceParseResult::OutOfStock);
    }

    #[rstest]
    #[case("$15,000")]
    #[case("$123456")]
    #[case("")]
    #[case("Call for price")]
    #[case("$0.00")]
    #[case("$10,000.50")]
    #[case("$10000.99")]
    #[case("Sale $25000")]
    fn test_unparseable_prices(#[case] input: &str) {
        assert_eq!(parse_price(input), PriceParseResult::Unparseable);
    }

    #[test]
    fn test_boundary_prices() {
        assert_eq!(parse_price("$0.01"), PriceParseResult::Valid(dec("0.01")));
        assert_eq!(parse_price("$10000"), PriceParseResult::Valid(dec("10000")));
        assert_eq!(parse_price("$10001"), PriceParseResult::Unparseable);
    }

    #[test]
    fn test_price_result_amount() {
        assert_eq!(PriceParseResult::OutOfStock.amount(), Decimal::ZERO);
        assert_eq!(PriceParseResult::Valid(dec("3.50")).amount(), dec("3.50"));
    }

    #[rstest]
    #[case("Aluminum Case for Switch Testing", Category::Switches)]
    #[case("GMK Olivia Keycap Set", Category::Keycaps)]
    #[case("Tofu65 Aluminum", Category::Case)]
    #[case("DZ60 Hot-Swap PCB", Category::Pcb)]
    #[case("Durock V2 Screw-in Stabilizers", Category::Stabilizers)]
    #[case("Desk Mat", Category::Unknown)]
    fn test_classify_category_priority(#[case] title: &str, #[case] expected: Category) {
        assert_eq!(classify_category(title, &[], ""), expected);
    }

    #[test]
    fn test_classify_uses_tags_and_url() {
        assert_eq!(classify_category("Olivia", &["keycaps"], ""), Category::Keycaps);
        assert_eq!(classify_category("Olivia", &[], "https://shop.test/collections/keycaps"), Category::Keycaps);
    }

    #[rstest]
    #[case("Tofu60 Redux", "60%")]
    #[case("KBD67 Lite R4", "65%")]
    #[case("GMMK Pro Barebones", "75%")]
    #[case("Tenkeyless Wooden Case", "TKL")]
    #[case("Lily58 Pro Kit", "Split")]
    #[case("Arisu Aluminum", "Alice")]
    #[case("Mode80 Case", "TKL")]
    #[case("Prophet Kit", "65%")]
    #[case("Custom 70% board", "70%")]
    fn test_layout_inference(#[case] title: &str, #[case] expected: &str) {
        assert_eq!(infer_specs(title, "", "").layout.as_deref(), Some(expected));
    }

    #[test]
    fn test_spec_fields_are_independent() {
        let specs = infer_specs("Gateron Yellow Linear Switch 5-pin", "South-facing LED friendly", "");
        assert_eq!(specs.switch_type.as_deref(), Some("linear"));
        assert_eq!(specs.pins, Some(5));
        assert_eq!(specs.facing.as_deref(), Some("south"));
        assert!(specs.layout.is_none());
        assert!(specs.material.is_none());

        let empty = infer_specs("Mystery item", "", "");
        assert!(empty.is_empty());
    }

    #[test]
    fn test_material_synonyms_and_boundaries() {
        assert_eq!(infer_specs("Aluminium top case", "", "").material.as_deref(), Some("aluminum"));
        assert_eq!(infer_specs("Frosted PC plate", "", "").material.as_deref(), Some("polycarbonate"));
        assert_eq!(infer_specs("Hotswap PCB", "", "").material, None);
        assert_eq!(infer_specs("Brass weight", "", "").material.as_deref(), Some("brass"));
    }

    #[test]
    fn test_three_pin_and_clicky() {
        let specs = infer_specs("Kailh Box Jade Clicky 3 pin", "", "");
        assert_eq!(specs.switch_type.as_deref(), Some("clicky"));
        assert_eq!(specs.pins, Some(3));
    }

    #[rstest]
    #[case("Cherry MX Red Switch", "0.50", true)]
    #[case("Cherry MX Red Switch", "0.005", false)]
    #[case("Cherry MX Red Switch", "0", false)]
    #[case("Cherry MX Red Switch", "10000.01", false)]
    #[case("ab", "10.00", false)]
    #[case("Digital Gift Card", "25.00", false)]
    #[case("Extended Warranty", "15.00", false)]
    #[case("Wireless Gaming Mouse", "59.00", false)]
    #[case("Coiled Keyboard Cable", "35.00", true)]
    #[case("USB-C Cable", "12.00", false)]
    fn test_is_valid_product(#[case] title: &str, #[case] price: &str, #[case] expected: bool) {
        assert_eq!(is_valid_product(title, dec(price)), expected);
    }

    #[test]
    fn test_rejection_reasons() {
        assert_eq!(rejection_reason(" x ", dec("5")), Some(Rejection::TitleTooShort));
        assert_eq!(rejection_reason("Gift Card", dec("5")), Some(Rejection::NonProduct("gift card")));
        assert_eq!(rejection_reason("Gaming Headset", dec("5")), Some(Rejection::NonComponent("headset")));
    }

    proptest! {
        #[test]
        fn prop_parse_price_is_deterministic(text in ".{0,40}") {
            prop_assert_eq!(parse_price(&text), parse_price(&text));
        }

        #[test]
        fn prop_out_of_stock_beats_numerals(
            phrase in prop::sample::select(OUT_OF_STOCK_PHRASES.to_vec()),
            amount in 1u32..9999,
        ) {
            let text = format!("{phrase} - was ${amount}.00");
            prop_assert_eq!(parse_price(&text), PriceParseResult::OutOfStock);
        }

        #[test]
        fn prop_oversized_amounts_are_rejected(amount in 10_001u32..999_999, cents in 0u32..100) {
            let text = format!("${amount}.{cents:02}");
            prop_assert_eq!(parse_price(&text), PriceParseResult::Unparseable);
        }

        #[test]
        fn prop_valid_prices_are_in_range(text in "[$0-9., a-z-]{0,24}") {
            if let PriceParseResult::Valid(amount) = parse_price(&text) {
                prop_assert!(amount >= min_price() && amount <= max_price());
            }
        }
    }
}
