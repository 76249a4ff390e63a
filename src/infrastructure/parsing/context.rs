//! Parsing context for one listing page

use crate::domain::product::Category;
use crate::domain::strategy::CategoryAdmission;

/// What the extraction engine needs to know about the page it parses
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// URL the document was fetched from; relative links resolve against it
    pub page_url: String,

    /// Display name stored on every record
    pub retailer: String,

    /// Category requested for this unit
    pub target: Category,

    pub admission: CategoryAdmission,
}

impl ParseContext {
    pub fn new(page_url: impl Into<String>, retailer: impl Into<String>, target: Category) -> Self {
        Self {
            page_url: page_url.into(),
            retailer: retailer.into(),
            target,
            admission: CategoryAdmission::default(),
        }
    }

    pub fn with_admission(mut self, admission: CategoryAdmission) -> Self {
        self.admission = admission;
        self
    }
}
