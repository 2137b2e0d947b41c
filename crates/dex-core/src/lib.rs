//! # dex-core
//!
//! Data provider subsystem of Digital Excellence - shared between the CLI
//! and the API host.
//!
//! This crate provides:
//! - The data provider service, adapter and registry (`services::data_provider`)
//! - GitHub, GitLab and JSON file data sources
//! - Linked data source token storage (`services::token_store`, `db`)
//! - Data provider configuration (`config` module)
//! - Canonical data models (`models` module)
//! - Unified error handling (`error` module)

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

// Re-exports for convenience
pub use config::{DataProvidersConfig, DataSourceConfig, OauthConfig, ProviderKind};
pub use db::Database;
pub use error::{Error, Result};

pub use models::{AuthTier, DataSourceInfo, LinkedDataSource, OauthTokens, Project};

pub use services::{
    AuthFilter, DataProviderLoader, DataProviderService, DataSource, DataSourceRegistry,
    DataSourceTokenStore,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}
