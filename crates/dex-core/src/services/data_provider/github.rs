//! GitHub data source
//!
//! Authorized adaptee backed by the GitHub REST API.
//!
//! - Public listing: `GET /users/{owner}/repos` when a public owner is
//!   configured, otherwise `GET /repositories`
//! - Authorized listing: `GET /user/repos`
//! - Single project: `GET /repositories/{id}`
//!
//! GitHub's token endpoint answers a rejected code with HTTP 200 and an
//! `error` field, which `oauth::exchange_code` handles.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use super::http::{bearer, fetch_json, Lookup};
use super::oauth::{self, OauthSettings};
use super::{
    AuthorizedDataSourceAdaptee, DataSourceAdaptee, DataSourceMetadata, ProviderProject,
    ProviderTokens,
};
use crate::config::{
    DataSourceConfig, ProviderKind, GITHUB_API_URL, GITHUB_AUTHORIZE_URL, GITHUB_DEFAULT_SCOPES,
    GITHUB_TOKEN_URL,
};
use crate::error::{Error, Result};

const PROVIDER: &str = "GitHub";

/// GitHub's preferred media type
const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Largest page GitHub serves
const PER_PAGE: &str = "100";

// ============================================================================
// Native Types
// ============================================================================

/// Repository as returned by the GitHub REST API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitHubRepository {
    pub id: i64,
    pub name: String,
    pub full_name: Option<String>,
    pub description: Option<String>,
    pub html_url: Option<String>,
    pub owner: Option<GitHubOwner>,
    pub private: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitHubOwner {
    pub login: String,
}

/// Successful response of `POST /login/oauth/access_token`
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Only present for GitHub Apps with expiring user tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

// ============================================================================
// GitHubDataSource
// ============================================================================

pub struct GitHubDataSource {
    metadata: DataSourceMetadata,
    client: Client,
    api_base_url: String,
    public_owner: Option<String>,
    oauth: OauthSettings,
}

impl GitHubDataSource {
    /// Build from a validated source config
    pub fn new(config: &DataSourceConfig, client: Client) -> Result<Self> {
        let oauth = config.oauth.as_ref().ok_or_else(|| {
            Error::config(format!("GitHub data source {} has no oauth block", config.guid))
        })?;

        Ok(Self {
            metadata: DataSourceMetadata {
                guid: config.guid.clone(),
                kind: ProviderKind::GitHub,
                title: config.display_title(),
                description: config.description.clone().unwrap_or_default(),
                is_visible: config.is_visible,
            },
            client,
            api_base_url: config
                .api_base_url
                .as_deref()
                .unwrap_or(GITHUB_API_URL)
                .trim_end_matches('/')
                .to_string(),
            public_owner: config.public_owner.clone(),
            oauth: OauthSettings {
                client_id: oauth.client_id.clone(),
                client_secret: oauth.client_secret.clone(),
                redirect_uri: oauth.redirect_uri.clone(),
                authorize_url: oauth
                    .authorize_url
                    .clone()
                    .unwrap_or_else(|| GITHUB_AUTHORIZE_URL.to_string()),
                token_url: oauth
                    .token_url
                    .clone()
                    .unwrap_or_else(|| GITHUB_TOKEN_URL.to_string()),
                scopes: oauth.scopes.clone().unwrap_or_else(|| {
                    GITHUB_DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
                }),
            },
        })
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.api_base_url, path))
            .header("Accept", GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn list(&self, request: RequestBuilder, authenticated: bool) -> Result<Vec<ProviderProject>> {
        let repos: Vec<GitHubRepository> =
            fetch_json(PROVIDER, request, authenticated, Lookup::Listing).await?;
        log::info!("[data_provider:github] Fetched {} repositories", repos.len());
        Ok(repos.into_iter().map(ProviderProject::GitHub).collect())
    }

    async fn fetch_one(&self, access_token: Option<&str>, id: i64) -> Result<ProviderProject> {
        let request = bearer(self.get(&format!("/repositories/{}", id)), access_token);
        let lookup = Lookup::Project {
            data_source: &self.metadata.guid,
            id,
        };
        let repo: GitHubRepository =
            fetch_json(PROVIDER, request, access_token.is_some(), lookup).await?;
        Ok(ProviderProject::GitHub(repo))
    }
}

#[async_trait]
impl DataSourceAdaptee for GitHubDataSource {
    fn metadata(&self) -> &DataSourceMetadata {
        &self.metadata
    }

    async fn fetch_public_projects(&self) -> Result<Vec<ProviderProject>> {
        let request = match &self.public_owner {
            Some(owner) => {
                log::info!("[data_provider:github] Listing public repositories of {}", owner);
                self.get(&format!("/users/{}/repos", owner))
                    .query(&[("per_page", PER_PAGE)])
            }
            None => {
                log::info!("[data_provider:github] Listing public repositories");
                self.get("/repositories")
            }
        };
        self.list(request, false).await
    }

    async fn fetch_public_project(&self, id: i64) -> Result<ProviderProject> {
        log::info!("[data_provider:github] Fetching public repository {}", id);
        self.fetch_one(None, id).await
    }
}

#[async_trait]
impl AuthorizedDataSourceAdaptee for GitHubDataSource {
    fn oauth_settings(&self) -> &OauthSettings {
        &self.oauth
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens> {
        let response: GitHubTokenResponse =
            oauth::exchange_code(&self.client, PROVIDER, &self.oauth, code).await?;
        Ok(ProviderTokens::GitHub(response))
    }

    async fn fetch_authorized_projects(&self, access_token: &str) -> Result<Vec<ProviderProject>> {
        log::info!("[data_provider:github] Listing repositories of the authenticated user");
        let request = bearer(self.get("/user/repos"), Some(access_token))
            .query(&[("per_page", PER_PAGE), ("affiliation", "owner,collaborator")]);
        self.list(request, true).await
    }

    async fn fetch_authorized_project(&self, access_token: &str, id: i64) -> Result<ProviderProject> {
        log::info!("[data_provider:github] Fetching repository {} as the authenticated user", id);
        self.fetch_one(Some(access_token), id).await
    }
}
