//! Parsing error types for listing extraction
//!
//! Most of these are recovered where they occur: a container that fails
//! is skipped, a strategy with a bad selector is dropped. Only a catalog
//! with no usable strategy at all surfaces to the caller.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Required field '{field}' not found in container")]
    RequiredFieldMissing {
        field: String,
        context: Option<String>,
    },

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector {
        selector: String,
        reason: String,
    },

    #[error("No usable strategy in catalog (tried {tried:?})")]
    NoUsableStrategy { tried: Vec<String> },

    #[error("URL resolution failed: {url} - {reason}")]
    UrlResolutionFailed {
        url: String,
        reason: String,
        base_url: Option<String>,
    },

    #[error("HTTP request failed: {status} - {url}")]
    HttpRequestFailed { status: u16, url: String },

    #[error("Content validation failed: {reason}")]
    ContentValidationFailed { reason: String, content_length: usize },
}

impl ParsingError {
    pub fn required_field_missing(field: &str, context: Option<&str>) -> Self {
        Self::RequiredFieldMissing {
            field: field.to_string(),
            context: context.map(|s| s.to_string()),
        }
    }

    pub fn invalid_selector(selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn url_resolution_failed(url: &str, reason: impl ToString, base_url: Option<&str>) -> Self {
        Self::UrlResolutionFailed {
            url: url.to_string(),
            reason: reason.to_string(),
            base_url: base_url.map(|s| s.to_string()),
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::RequiredFieldMissing { .. } => true,
            Self::InvalidSelector { .. } => true,
            Self::NoUsableStrategy { .. } => false,
            Self::UrlResolutionFailed { .. } => true,
            Self::HttpRequestFailed { status, .. } => *status == 429 || *status >= 500,
            Self::ContentValidationFailed { .. } => true,
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
