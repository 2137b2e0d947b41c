//! Data Provider Abstraction
//!
//! Pluggable integration layer that puts heterogeneous project hosting
//! sources behind one contract.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │ DataProviderService                                 │
//! │   source = loader.get_data_source_by_guid(guid)?    │
//! │   DataProviderAdapter::new(&source).call().await    │
//! └─────────────────────────────────────────────────────┘
//!          │                          │
//!          ▼                          ▼
//! ┌──────────────────────┐  ┌──────────────────────────┐
//! │ trait                │  │ DataProviderAdapter      │
//! │ DataProviderLoader   │  │   native -> Project      │
//! │ (DataSourceRegistry) │  │   native -> OauthTokens  │
//! └──────────────────────┘  └──────────────────────────┘
//!                                     │
//!                      ┌──────────────┴──────────────┐
//!                      ▼                             ▼
//!          ┌──────────────────────┐   ┌──────────────────────────────┐
//!          │ DataSourceAdaptee    │◄──│ AuthorizedDataSourceAdaptee  │
//!          │  (JSON file)         │   │  (GitHub, GitLab)            │
//!          └──────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! # Adding a New Provider
//!
//! 1. Create a module with the adaptee and its native record types
//! 2. Implement `DataSourceAdaptee` (and `AuthorizedDataSourceAdaptee`
//!    when the provider uses OAuth)
//! 3. Add the native variants to `ProviderProject` / `ProviderTokens` and
//!    their translation in `adapter.rs`
//! 4. Build it in `registry::build_data_source`

pub mod adapter;
pub mod github;
pub mod gitlab;
mod http;
pub mod json_file;
pub mod oauth;
pub mod registry;
pub mod service;

pub use adapter::DataProviderAdapter;
pub use github::{GitHubDataSource, GitHubRepository, GitHubTokenResponse};
pub use gitlab::{GitLabDataSource, GitLabProject, GitLabTokenResponse};
pub use json_file::{JsonFileDataSource, JsonFileProject};
pub use oauth::OauthSettings;
pub use registry::{build_data_source, DataProviderLoader, DataSourceRegistry};
pub use service::DataProviderService;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ProviderKind;
use crate::error::Result;
use crate::models::{AuthTier, DataSourceInfo};

// ============================================================================
// Native Records
// ============================================================================

/// A project record in its provider-native shape
#[derive(Debug, Clone)]
pub enum ProviderProject {
    GitHub(GitHubRepository),
    GitLab(GitLabProject),
    JsonFile(JsonFileProject),
}

/// A token endpoint response in its provider-native shape
#[derive(Debug, Clone)]
pub enum ProviderTokens {
    GitHub(GitHubTokenResponse),
    GitLab(GitLabTokenResponse),
}

// ============================================================================
// Adaptee Traits
// ============================================================================

/// Static description of one configured source
#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceMetadata {
    pub guid: String,
    pub kind: ProviderKind,
    pub title: String,
    pub description: String,
    pub is_visible: bool,
}

/// Capabilities every data source offers: metadata and public retrieval
///
/// Implement this trait to add a source that needs no authentication.
#[async_trait]
pub trait DataSourceAdaptee: Send + Sync {
    /// Identity and display data for this source
    fn metadata(&self) -> &DataSourceMetadata;

    /// List projects reachable without authentication
    async fn fetch_public_projects(&self) -> Result<Vec<ProviderProject>>;

    /// Fetch one project without authentication
    ///
    /// Fails with `Error::ProjectNotFound` when the provider does not know `id`.
    async fn fetch_public_project(&self, id: i64) -> Result<ProviderProject>;
}

/// Additional capabilities of sources that use OAuth
///
/// Only sources registered as [`DataSource::Authorized`] implement this, so
/// public sources have no way to expose OAuth operations.
#[async_trait]
pub trait AuthorizedDataSourceAdaptee: DataSourceAdaptee {
    /// OAuth registration of this source
    fn oauth_settings(&self) -> &OauthSettings;

    /// Exchange an authorization code at the provider's token endpoint
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens>;

    /// List projects visible to the owner of `access_token`
    async fn fetch_authorized_projects(&self, access_token: &str) -> Result<Vec<ProviderProject>>;

    /// Fetch one project using `access_token`
    async fn fetch_authorized_project(&self, access_token: &str, id: i64) -> Result<ProviderProject>;
}

// ============================================================================
// Registry Entries
// ============================================================================

/// A registered data source, tagged by capability tier
#[derive(Clone)]
pub enum DataSource {
    Public(Arc<dyn DataSourceAdaptee>),
    Authorized(Arc<dyn AuthorizedDataSourceAdaptee>),
}

impl DataSource {
    pub fn metadata(&self) -> &DataSourceMetadata {
        match self {
            DataSource::Public(adaptee) => adaptee.metadata(),
            DataSource::Authorized(adaptee) => adaptee.metadata(),
        }
    }

    pub fn guid(&self) -> &str {
        &self.metadata().guid
    }

    pub fn tier(&self) -> AuthTier {
        match self {
            DataSource::Public(_) => AuthTier::Public,
            DataSource::Authorized(_) => AuthTier::Authorized,
        }
    }

    /// The OAuth-capable adaptee, if this source has one
    pub fn as_authorized(&self) -> Option<&dyn AuthorizedDataSourceAdaptee> {
        match self {
            DataSource::Public(_) => None,
            DataSource::Authorized(adaptee) => Some(adaptee.as_ref()),
        }
    }

    /// Serializable description of this source
    pub fn info(&self) -> DataSourceInfo {
        let meta = self.metadata();
        DataSourceInfo {
            guid: meta.guid.clone(),
            title: meta.title.clone(),
            description: meta.description.clone(),
            kind: meta.kind.to_string(),
            tier: self.tier(),
            is_visible: meta.is_visible,
        }
    }

    async fn fetch_public_projects(&self) -> Result<Vec<ProviderProject>> {
        match self {
            DataSource::Public(adaptee) => adaptee.fetch_public_projects().await,
            DataSource::Authorized(adaptee) => adaptee.fetch_public_projects().await,
        }
    }

    async fn fetch_public_project(&self, id: i64) -> Result<ProviderProject> {
        match self {
            DataSource::Public(adaptee) => adaptee.fetch_public_project(id).await,
            DataSource::Authorized(adaptee) => adaptee.fetch_public_project(id).await,
        }
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("guid", &self.guid())
            .field("tier", &self.tier())
            .finish()
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Which tier of sources to retrieve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthFilter {
    #[default]
    All,
    AuthorizedOnly,
    PublicOnly,
}

impl AuthFilter {
    /// Whether a source of `tier` passes this filter
    pub fn matches(&self, tier: AuthTier) -> bool {
        match self {
            AuthFilter::All => true,
            AuthFilter::AuthorizedOnly => tier == AuthTier::Authorized,
            AuthFilter::PublicOnly => tier == AuthTier::Public,
        }
    }
}

/// Legacy `needsAuth` flag: absent means all, true authorized, false public
impl From<Option<bool>> for AuthFilter {
    fn from(needs_auth: Option<bool>) -> Self {
        match needs_auth {
            None => AuthFilter::All,
            Some(true) => AuthFilter::AuthorizedOnly,
            Some(false) => AuthFilter::PublicOnly,
        }
    }
}

impl std::str::FromStr for AuthFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(AuthFilter::All),
            "authorized" | "auth" => Ok(AuthFilter::AuthorizedOnly),
            "public" => Ok(AuthFilter::PublicOnly),
            _ => Err(format!("Invalid auth filter: {}. Use 'all', 'authorized' or 'public'", s)),
        }
    }
}
