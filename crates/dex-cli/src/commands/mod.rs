//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod oauth;
pub mod project;
pub mod source;

use crate::output::OutputFormat;
use dex_core::{DataProviderService, DataSourceTokenStore, Database};

/// User id for tokens stored when `--user` is not given
pub const DEFAULT_USER: &str = "local";

/// Shared context for all commands
pub struct Context {
    pub service: DataProviderService,
    pub db: Database,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Context {
    pub fn token_store(&self) -> DataSourceTokenStore {
        DataSourceTokenStore::new(self.db.pool.clone())
    }
}
