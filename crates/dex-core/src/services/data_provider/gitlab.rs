//! GitLab data source
//!
//! Authorized adaptee backed by the GitLab v4 REST API. Works against
//! gitlab.com or a self-hosted instance; OAuth endpoints default to the
//! instance that serves `api_base_url`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use super::http::{bearer, fetch_json, Lookup};
use super::oauth::{self, OauthSettings};
use super::{
    AuthorizedDataSourceAdaptee, DataSourceAdaptee, DataSourceMetadata, ProviderProject,
    ProviderTokens,
};
use crate::config::{gitlab_api_url, DataSourceConfig, ProviderKind, GITLAB_DEFAULT_SCOPES, GITLAB_URL};
use crate::error::{Error, Result};

const PROVIDER: &str = "GitLab";

const PER_PAGE: &str = "100";

// ============================================================================
// Native Types
// ============================================================================

/// Project as returned by the GitLab v4 API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitLabProject {
    pub id: i64,
    pub name: String,
    pub path_with_namespace: Option<String>,
    pub description: Option<String>,
    pub web_url: Option<String>,
    pub namespace: Option<GitLabNamespace>,
    /// Only present for projects in a user namespace
    pub owner: Option<GitLabOwner>,
    pub visibility: Option<String>,
    pub created_at: Option<String>,
    pub last_activity_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitLabNamespace {
    pub name: String,
    pub path: String,
    pub full_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitLabOwner {
    pub username: String,
    pub name: Option<String>,
}

/// Successful response of `POST /oauth/token`
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Unix timestamp the token was issued at
    #[serde(default)]
    pub created_at: Option<i64>,
}

// ============================================================================
// GitLabDataSource
// ============================================================================

pub struct GitLabDataSource {
    metadata: DataSourceMetadata,
    client: Client,
    api_base_url: String,
    public_owner: Option<String>,
    oauth: OauthSettings,
}

impl GitLabDataSource {
    /// Build from a validated source config
    pub fn new(config: &DataSourceConfig, client: Client) -> Result<Self> {
        let oauth = config.oauth.as_ref().ok_or_else(|| {
            Error::config(format!("GitLab data source {} has no oauth block", config.guid))
        })?;

        let api_base_url = config
            .api_base_url
            .clone()
            .unwrap_or_else(|| gitlab_api_url(GITLAB_URL))
            .trim_end_matches('/')
            .to_string();
        let instance_url = instance_url(&api_base_url);

        Ok(Self {
            metadata: DataSourceMetadata {
                guid: config.guid.clone(),
                kind: ProviderKind::GitLab,
                title: config.display_title(),
                description: config.description.clone().unwrap_or_default(),
                is_visible: config.is_visible,
            },
            client,
            public_owner: config.public_owner.clone(),
            oauth: OauthSettings {
                client_id: oauth.client_id.clone(),
                client_secret: oauth.client_secret.clone(),
                redirect_uri: oauth.redirect_uri.clone(),
                authorize_url: oauth
                    .authorize_url
                    .clone()
                    .unwrap_or_else(|| format!("{}/oauth/authorize", instance_url)),
                token_url: oauth
                    .token_url
                    .clone()
                    .unwrap_or_else(|| format!("{}/oauth/token", instance_url)),
                scopes: oauth.scopes.clone().unwrap_or_else(|| {
                    GITLAB_DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
                }),
            },
            api_base_url,
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.api_base_url, path))
            .header("Accept", "application/json")
    }

    async fn list(&self, request: RequestBuilder, authenticated: bool) -> Result<Vec<ProviderProject>> {
        let projects: Vec<GitLabProject> =
            fetch_json(PROVIDER, request, authenticated, Lookup::Listing).await?;
        log::info!("[data_provider:gitlab] Fetched {} projects", projects.len());
        Ok(projects.into_iter().map(ProviderProject::GitLab).collect())
    }

    async fn fetch_one(&self, access_token: Option<&str>, id: i64) -> Result<ProviderProject> {
        let request = bearer(self.get(&format!("/projects/{}", id)), access_token);
        let lookup = Lookup::Project {
            data_source: &self.metadata.guid,
            id,
        };
        let project: GitLabProject =
            fetch_json(PROVIDER, request, access_token.is_some(), lookup).await?;
        Ok(ProviderProject::GitLab(project))
    }
}

/// Instance root for an API base URL (`https://host/api/v4` -> `https://host`)
fn instance_url(api_base_url: &str) -> &str {
    api_base_url
        .strip_suffix("/api/v4")
        .unwrap_or(api_base_url)
}

#[async_trait]
impl DataSourceAdaptee for GitLabDataSource {
    fn metadata(&self) -> &DataSourceMetadata {
        &self.metadata
    }

    async fn fetch_public_projects(&self) -> Result<Vec<ProviderProject>> {
        let request = match &self.public_owner {
            Some(owner) => {
                log::info!("[data_provider:gitlab] Listing public projects of {}", owner);
                self.get(&format!("/users/{}/projects", owner))
                    .query(&[("per_page", PER_PAGE)])
            }
            None => {
                log::info!("[data_provider:gitlab] Listing public projects");
                self.get("/projects").query(&[
                    ("visibility", "public"),
                    ("order_by", "last_activity_at"),
                    ("per_page", PER_PAGE),
                ])
            }
        };
        self.list(request, false).await
    }

    async fn fetch_public_project(&self, id: i64) -> Result<ProviderProject> {
        log::info!("[data_provider:gitlab] Fetching public project {}", id);
        self.fetch_one(None, id).await
    }
}

#[async_trait]
impl AuthorizedDataSourceAdaptee for GitLabDataSource {
    fn oauth_settings(&self) -> &OauthSettings {
        &self.oauth
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens> {
        let response: GitLabTokenResponse =
            oauth::exchange_code(&self.client, PROVIDER, &self.oauth, code).await?;
        Ok(ProviderTokens::GitLab(response))
    }

    async fn fetch_authorized_projects(&self, access_token: &str) -> Result<Vec<ProviderProject>> {
        log::info!("[data_provider:gitlab] Listing projects of the authenticated user");
        let request = bearer(self.get("/projects"), Some(access_token))
            .query(&[("membership", "true"), ("per_page", PER_PAGE)]);
        self.list(request, true).await
    }

    async fn fetch_authorized_project(&self, access_token: &str, id: i64) -> Result<ProviderProject> {
        log::info!("[data_provider:gitlab] Fetching project {} as the authenticated user", id);
        self.fetch_one(Some(access_token), id).await
    }
}
