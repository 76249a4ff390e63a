//! HTML parsing for retailer listing pages
//!
//! The extraction engine walks a strategy catalog over a parsed document;
//! the diagnostic inspector explains pages where every strategy failed.

pub mod context;
pub mod diagnostic_inspector;
pub mod product_list_parser;

pub use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
pub use context::ParseContext;
pub use diagnostic_inspector::{ContainerSample, DiagnosticInspector, DiagnosticReport};
pub use product_list_parser::{ExtractionEngine, ExtractionOutcome, ProductListParser};

use scraper::Html;

/// Parser over an already parsed document
pub trait ContextualParser {
    type Output;
    type Context;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output>;
}
