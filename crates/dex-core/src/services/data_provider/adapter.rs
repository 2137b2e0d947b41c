//! Data provider adapter
//!
//! Puts one resolved [`DataSource`] behind the canonical contract. This is
//! the only place provider-native records are read; everything it returns
//! is a canonical [`Project`] or [`OauthTokens`].

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use super::{
    AuthorizedDataSourceAdaptee, DataSource, GitHubRepository, GitHubTokenResponse, GitLabProject,
    GitLabTokenResponse, JsonFileProject, ProviderProject, ProviderTokens,
};
use crate::error::{Error, Result};
use crate::models::{OauthTokens, Project};

/// Token type assumed when a provider omits it
const DEFAULT_TOKEN_TYPE: &str = "bearer";

/// Adapter over a single data source
///
/// Borrows the source for the duration of one call; holds no other state,
/// so it is constructed per call and dropped afterwards.
pub struct DataProviderAdapter<'a> {
    source: &'a DataSource,
}

impl<'a> DataProviderAdapter<'a> {
    pub fn new(source: &'a DataSource) -> Self {
        Self { source }
    }

    /// List all projects of the source
    ///
    /// With `needs_auth` the source must be authorized and `token` present;
    /// both are checked before any request is sent. Without it the token is
    /// ignored and the public listing is used.
    pub async fn get_all_projects(&self, token: Option<&str>, needs_auth: bool) -> Result<Vec<Project>> {
        let native = if needs_auth {
            let (adaptee, token) = self.authorized_call(token)?;
            adaptee.fetch_authorized_projects(token).await?
        } else {
            self.source.fetch_public_projects().await?
        };

        let guid = self.source.guid();
        Ok(native
            .into_iter()
            .map(|project| translate_project(guid, project))
            .collect())
    }

    /// Fetch one project by its provider id
    pub async fn get_project_by_guid(
        &self,
        token: Option<&str>,
        id: i64,
        needs_auth: bool,
    ) -> Result<Project> {
        let native = if needs_auth {
            let (adaptee, token) = self.authorized_call(token)?;
            adaptee.fetch_authorized_project(token, id).await?
        } else {
            self.source.fetch_public_project(id).await?
        };

        Ok(translate_project(self.source.guid(), native))
    }

    /// Authorization URL the end user is redirected to
    pub fn get_oauth_url(&self) -> Result<String> {
        self.authorized()?.oauth_settings().authorization_url()
    }

    /// Exchange an authorization code for tokens
    pub async fn get_tokens(&self, code: &str) -> Result<OauthTokens> {
        let adaptee = self.authorized()?;
        if code.trim().is_empty() {
            return Err(Error::validation("Authorization code must not be empty"));
        }

        let native = adaptee.exchange_code(code).await?;
        Ok(translate_tokens(native, Utc::now()))
    }

    fn authorized(&self) -> Result<&'a dyn AuthorizedDataSourceAdaptee> {
        self.source.as_authorized().ok_or_else(|| {
            Error::capability(format!(
                "Data source {} is public and does not support OAuth",
                self.source.guid()
            ))
        })
    }

    fn authorized_call<'t>(
        &self,
        token: Option<&'t str>,
    ) -> Result<(&'a dyn AuthorizedDataSourceAdaptee, &'t str)> {
        let adaptee = self.authorized()?;
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                Error::auth_required(format!(
                    "Data source {} requires an access token",
                    self.source.guid()
                ))
            })?;
        Ok((adaptee, token))
    }
}

// ============================================================================
// Project Translation
// ============================================================================

/// Translate a native record into a canonical project stamped with `guid`
pub fn translate_project(guid: &str, native: ProviderProject) -> Project {
    let mut project = match native {
        ProviderProject::GitHub(repo) => from_github(repo),
        ProviderProject::GitLab(project) => from_gitlab(project),
        ProviderProject::JsonFile(project) => from_json_file(project),
    };
    project.data_source_guid = guid.to_string();
    if project.short_description.is_empty() {
        project.short_description = Project::short_description_from(&project.description);
    }
    project
}

fn from_github(repo: GitHubRepository) -> Project {
    Project {
        id: repo.id,
        name: repo.name,
        description: repo.description.unwrap_or_default(),
        owner: repo.owner.map(|o| o.login).unwrap_or_default(),
        url: repo.html_url.unwrap_or_default(),
        created_at: repo.created_at.as_deref().and_then(parse_datetime),
        updated_at: repo.updated_at.as_deref().and_then(parse_datetime),
        ..Default::default()
    }
}

fn from_gitlab(project: GitLabProject) -> Project {
    let owner = project
        .owner
        .map(|o| o.username)
        .or_else(|| {
            project
                .namespace
                .map(|ns| ns.full_path.unwrap_or(ns.path))
        })
        .unwrap_or_default();

    Project {
        id: project.id,
        name: project.name,
        description: project.description.unwrap_or_default(),
        owner,
        url: project.web_url.unwrap_or_default(),
        created_at: project.created_at.as_deref().and_then(parse_datetime),
        updated_at: project.last_activity_at.as_deref().and_then(parse_datetime),
        ..Default::default()
    }
}

fn from_json_file(project: JsonFileProject) -> Project {
    Project {
        id: project.id.unwrap_or_default(),
        name: project.name.unwrap_or_default(),
        short_description: project.short_description.unwrap_or_default(),
        description: project.description.unwrap_or_default(),
        owner: project.owner.unwrap_or_default(),
        url: project.uri.unwrap_or_default(),
        created_at: project.created.as_deref().and_then(parse_datetime),
        updated_at: project.updated.as_deref().and_then(parse_datetime),
        ..Default::default()
    }
}

/// Parse provider timestamps (RFC 3339, or naive date-times assumed UTC)
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }

    log::warn!("[data_provider:adapter] Failed to parse datetime: {}", s);
    None
}

// ============================================================================
// Token Translation
// ============================================================================

/// Translate a native token response; `now` is the time of the exchange
pub fn translate_tokens(native: ProviderTokens, now: DateTime<Utc>) -> OauthTokens {
    match native {
        ProviderTokens::GitHub(tokens) => from_github_tokens(tokens, now),
        ProviderTokens::GitLab(tokens) => from_gitlab_tokens(tokens, now),
    }
}

fn from_github_tokens(tokens: GitHubTokenResponse, now: DateTime<Utc>) -> OauthTokens {
    OauthTokens {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: tokens
            .token_type
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
        scope: tokens.scope.filter(|s| !s.is_empty()),
        expires_at: OauthTokens::expiry_from(now, tokens.expires_in),
    }
}

fn from_gitlab_tokens(tokens: GitLabTokenResponse, now: DateTime<Utc>) -> OauthTokens {
    // GitLab reports when it issued the token; prefer that over our clock
    let issued_at = tokens
        .created_at
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or(now);

    OauthTokens {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: tokens
            .token_type
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
        scope: tokens.scope.filter(|s| !s.is_empty()),
        expires_at: OauthTokens::expiry_from(issued_at, tokens.expires_in),
    }
}
