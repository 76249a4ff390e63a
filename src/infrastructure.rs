//! Infrastructure layer: HTTP fetching, HTML parsing, storage and process setup

pub mod catalog_export;
pub mod catalog_repository;
pub mod config;
pub mod database_connection;
pub mod http_client;
pub mod logging;
pub mod memory_catalog_store;
pub mod parsing;
pub mod parsing_error;
pub mod retailer_profiles;

pub use catalog_export::{export_catalog, read_export, write_export};
pub use catalog_repository::SqliteCatalogStore;
pub use config::{AppConfig, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use http_client::HttpFetcher;
pub use logging::{get_log_directory, init_logging_with_config};
pub use memory_catalog_store::InMemoryCatalogStore;
pub use parsing::{DiagnosticInspector, DiagnosticReport, ExtractionEngine, ExtractionOutcome, ParseContext, ProductListParser};
pub use parsing_error::{ParsingError, ParsingResult};
