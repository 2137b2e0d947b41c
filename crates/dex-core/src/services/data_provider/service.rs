//! Data provider service
//!
//! The façade callers use: resolves a source GUID through the loader and
//! delegates to a freshly constructed [`DataProviderAdapter`].

use std::sync::Arc;

use super::{AuthFilter, DataProviderAdapter, DataProviderLoader, DataSource};
use crate::error::{Error, Result};
use crate::models::{OauthTokens, Project};

#[derive(Clone)]
pub struct DataProviderService {
    loader: Arc<dyn DataProviderLoader>,
}

impl DataProviderService {
    pub fn new(loader: Arc<dyn DataProviderLoader>) -> Self {
        Self { loader }
    }

    /// List all projects of a source
    pub async fn get_all_projects(
        &self,
        source_guid: &str,
        token: Option<&str>,
        needs_auth: bool,
    ) -> Result<Vec<Project>> {
        let source = self.resolve(source_guid)?;
        log::info!(
            "[data_provider:service] Listing projects of {} (needs_auth: {})",
            source_guid,
            needs_auth
        );
        DataProviderAdapter::new(&source)
            .get_all_projects(token, needs_auth)
            .await
    }

    /// Fetch one project of a source
    pub async fn get_project_by_guid(
        &self,
        source_guid: &str,
        token: Option<&str>,
        id: i64,
        needs_auth: bool,
    ) -> Result<Project> {
        let source = self.resolve(source_guid)?;
        log::info!(
            "[data_provider:service] Fetching project {} of {} (needs_auth: {})",
            id,
            source_guid,
            needs_auth
        );
        DataProviderAdapter::new(&source)
            .get_project_by_guid(token, id, needs_auth)
            .await
    }

    /// Whether `source_guid` names a registered source
    pub fn is_existing_data_source_guid(&self, source_guid: &str) -> bool {
        self.loader.get_data_source_by_guid(source_guid).is_some()
    }

    /// Authorization URL for an authorized source
    pub fn get_oauth_url(&self, source_guid: &str) -> Result<String> {
        let source = self.resolve(source_guid)?;
        DataProviderAdapter::new(&source).get_oauth_url()
    }

    /// Exchange an authorization code at an authorized source
    pub async fn get_tokens(&self, code: &str, source_guid: &str) -> Result<OauthTokens> {
        let source = self.resolve(source_guid)?;
        DataProviderAdapter::new(&source).get_tokens(code).await
    }

    /// Registered sources of the requested tier
    ///
    /// All three filters read the same kind of registry snapshot, so
    /// `AuthorizedOnly` and `PublicOnly` partition `All`.
    pub fn retrieve_data_sources(&self, filter: AuthFilter) -> Vec<DataSource> {
        self.loader
            .get_all_data_sources()
            .into_iter()
            .filter(|source| filter.matches(source.tier()))
            .collect()
    }

    fn resolve(&self, source_guid: &str) -> Result<DataSource> {
        self.loader.get_data_source_by_guid(source_guid).ok_or_else(|| {
            log::warn!("[data_provider:service] Unknown data source: {}", source_guid);
            Error::unknown_source(source_guid)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DataProvidersConfig, DataSourceConfig, OauthConfig, ProviderKind};
    use crate::models::AuthTier;
    use crate::services::data_provider::DataSourceRegistry;
    use std::collections::HashSet;

    fn service() -> DataProviderService {
        let oauth = OauthConfig {
            client_id: "C".to_string(),
            client_secret: "S".to_string(),
            redirect_uri: "https://dex.example.com/cb".to_string(),
            authorize_url: None,
            token_url: None,
            scopes: None,
        };
        let config = DataProvidersConfig {
            data_sources: vec![
                DataSourceConfig::new("gh", ProviderKind::GitHub).with_oauth(oauth.clone()),
                DataSourceConfig::new("feed", ProviderKind::JsonFile)
                    .with_feed_url("https://example.com/projects.json"),
                DataSourceConfig::new("gl", ProviderKind::GitLab).with_oauth(oauth),
            ],
            ..Default::default()
        };
        let registry = DataSourceRegistry::from_config(&config).unwrap();
        DataProviderService::new(Arc::new(registry))
    }

    #[test]
    fn test_is_existing_data_source_guid() {
        let service = service();
        assert!(service.is_existing_data_source_guid("gh"));
        assert!(service.is_existing_data_source_guid("feed"));
        assert!(!service.is_existing_data_source_guid("bitbucket"));
        assert!(!service.is_existing_data_source_guid(""));
    }

    #[tokio::test]
    async fn test_unknown_source_is_not_an_empty_list() {
        let err = service()
            .get_all_projects("bitbucket", Some("token"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownSource(ref guid) if guid == "bitbucket"));
    }

    #[tokio::test]
    async fn test_unknown_source_for_every_operation() {
        let service = service();
        assert!(matches!(
            service.get_project_by_guid("nope", None, 1, false).await,
            Err(Error::UnknownSource(_))
        ));
        assert!(matches!(service.get_oauth_url("nope"), Err(Error::UnknownSource(_))));
        assert!(matches!(
            service.get_tokens("code", "nope").await,
            Err(Error::UnknownSource(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_request() {
        // The GitHub source points at api.github.com; failing with
        // AuthenticationRequired proves no request was attempted.
        let err = service().get_all_projects("gh", None, true).await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationRequired(_)));

        let err = service()
            .get_project_by_guid("gh", Some("   "), 42, true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationRequired(_)));
    }

    #[test]
    fn test_get_oauth_url_on_public_source() {
        let err = service().get_oauth_url("feed").unwrap_err();
        assert!(matches!(err, Error::CapabilityMismatch(_)));
    }

    #[test]
    fn test_get_oauth_url_on_authorized_source() {
        let url = service().get_oauth_url("gh").unwrap();
        assert!(url.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(url.contains("client_id=C"));
    }

    #[tokio::test]
    async fn test_empty_code_rejected() {
        let err = service().get_tokens("  ", "gh").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_retrieve_data_sources_partition() {
        let service = service();

        let all: Vec<String> = service
            .retrieve_data_sources(AuthFilter::All)
            .iter()
            .map(|s| s.guid().to_string())
            .collect();
        let authorized: HashSet<String> = service
            .retrieve_data_sources(AuthFilter::AuthorizedOnly)
            .iter()
            .map(|s| s.guid().to_string())
            .collect();
        let public: HashSet<String> = service
            .retrieve_data_sources(AuthFilter::PublicOnly)
            .iter()
            .map(|s| s.guid().to_string())
            .collect();

        assert!(authorized.is_disjoint(&public));
        let union: HashSet<String> = authorized.union(&public).cloned().collect();
        let all_set: HashSet<String> = all.iter().cloned().collect();
        assert_eq!(all.len(), all_set.len(), "no duplicates");
        assert_eq!(union, all_set);

        assert_eq!(authorized, HashSet::from(["gh".to_string(), "gl".to_string()]));
        assert_eq!(public, HashSet::from(["feed".to_string()]));
    }

    #[test]
    fn test_retrieve_data_sources_tiers() {
        let service = service();
        assert!(service
            .retrieve_data_sources(AuthFilter::from(Some(true)))
            .iter()
            .all(|s| s.tier() == AuthTier::Authorized));
        assert!(service
            .retrieve_data_sources(AuthFilter::from(Some(false)))
            .iter()
            .all(|s| s.tier() == AuthTier::Public));
    }
}
