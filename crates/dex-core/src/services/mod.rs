//! Services module

pub mod data_provider;
pub mod token_store;

pub use data_provider::{
    AuthFilter, AuthorizedDataSourceAdaptee, DataProviderAdapter, DataProviderLoader,
    DataProviderService, DataSource, DataSourceAdaptee, DataSourceMetadata, DataSourceRegistry,
    ProviderProject, ProviderTokens,
};
pub use token_store::DataSourceTokenStore;
