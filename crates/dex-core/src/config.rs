//! Data provider configuration
//!
//! Sources are described by the host, either from environment variables
//! ([`DataProvidersConfig::from_env`]) or from JSON text the host has
//! already read ([`DataProvidersConfig::from_json_str`]).

use std::collections::HashSet;

use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Stable GUID of the default GitHub source
pub const GITHUB_DATA_SOURCE_GUID: &str = "de38e528-1d6d-40e7-83b9-4334c51c19be";

/// Stable GUID of the default GitLab source
pub const GITLAB_DATA_SOURCE_GUID: &str = "66de59d4-5db0-4bf8-a9a5-06abe8d3443a";

/// Stable GUID of the default JSON feed source
pub const JSON_FILE_DATA_SOURCE_GUID: &str = "fb4d3ff2-1f37-4a36-8cbd-8ed3b3e4b7c2";

pub const GITHUB_API_URL: &str = "https://api.github.com";
pub const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const GITHUB_DEFAULT_SCOPES: &[&str] = &["repo", "read:user"];

pub const GITLAB_URL: &str = "https://gitlab.com";
pub const GITLAB_DEFAULT_SCOPES: &[&str] = &["read_api", "read_user"];

/// Default User-Agent (GitHub rejects requests without one)
pub const DEFAULT_USER_AGENT: &str = "DigitalExcellence";

// ============================================================================
// Provider Kind
// ============================================================================

/// Kind of external provider behind a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "gitlab")]
    GitLab,
    /// A public JSON document listing projects
    JsonFile,
}

impl ProviderKind {
    /// Human-readable provider name, used in errors and logs
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "GitHub",
            ProviderKind::GitLab => "GitLab",
            ProviderKind::JsonFile => "JSON file",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::GitHub => write!(f, "github"),
            ProviderKind::GitLab => write!(f, "gitlab"),
            ProviderKind::JsonFile => write!(f, "json_file"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(ProviderKind::GitHub),
            "gitlab" => Ok(ProviderKind::GitLab),
            "json_file" | "json" | "jsonfile" => Ok(ProviderKind::JsonFile),
            _ => Err(format!("Unknown provider kind: {}", s)),
        }
    }
}

// ============================================================================
// Source Configuration
// ============================================================================

/// OAuth application registration for one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OauthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Overrides the provider's default authorization endpoint
    #[serde(default)]
    pub authorize_url: Option<String>,
    /// Overrides the provider's default token endpoint
    #[serde(default)]
    pub token_url: Option<String>,
    /// Overrides the provider's default scopes
    #[serde(default)]
    pub scopes: Option<Vec<String>>,
}

/// One configured data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub guid: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
    /// API root; defaults to the public provider instance
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// User whose public projects are listed for unauthenticated calls
    #[serde(default)]
    pub public_owner: Option<String>,
    #[serde(default)]
    pub oauth: Option<OauthConfig>,
    /// Location of the project document (JSON file sources)
    #[serde(default)]
    pub feed_url: Option<String>,
}

fn default_visible() -> bool {
    true
}

impl DataSourceConfig {
    /// Create a source config with only the required fields
    pub fn new(guid: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            guid: guid.into(),
            kind,
            title: None,
            description: None,
            is_visible: true,
            api_base_url: None,
            public_owner: None,
            oauth: None,
            feed_url: None,
        }
    }

    /// Set the API base URL
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Set the OAuth registration
    pub fn with_oauth(mut self, oauth: OauthConfig) -> Self {
        self.oauth = Some(oauth);
        self
    }

    /// Set the public owner
    pub fn with_public_owner(mut self, owner: impl Into<String>) -> Self {
        self.public_owner = Some(owner.into());
        self
    }

    /// Set the feed URL
    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed_url = Some(url.into());
        self
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Title shown to users, falling back to the provider name
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| self.kind.display_name().to_string())
    }

    /// Check that this source carries everything its kind needs
    pub fn validate(&self) -> Result<()> {
        if self.guid.trim().is_empty() {
            return Err(Error::config("Data source guid must not be empty"));
        }

        if let Some(base) = &self.api_base_url {
            parse_url(&self.guid, "api_base_url", base)?;
        }

        match self.kind {
            ProviderKind::GitHub | ProviderKind::GitLab => {
                let oauth = self.oauth.as_ref().ok_or_else(|| {
                    Error::config(format!(
                        "Data source {} ({}) requires an oauth block",
                        self.guid, self.kind
                    ))
                })?;
                if oauth.client_id.is_empty() || oauth.client_secret.is_empty() {
                    return Err(Error::config(format!(
                        "Data source {} is missing its OAuth client id or secret",
                        self.guid
                    )));
                }
                parse_url(&self.guid, "redirect_uri", &oauth.redirect_uri)?;
                if let Some(url) = &oauth.authorize_url {
                    parse_url(&self.guid, "authorize_url", url)?;
                }
                if let Some(url) = &oauth.token_url {
                    parse_url(&self.guid, "token_url", url)?;
                }
            }
            ProviderKind::JsonFile => {
                let feed = self.feed_url.as_deref().ok_or_else(|| {
                    Error::config(format!(
                        "Data source {} (json_file) requires a feed_url",
                        self.guid
                    ))
                })?;
                parse_url(&self.guid, "feed_url", feed)?;
            }
        }

        Ok(())
    }
}

fn parse_url(guid: &str, field: &str, value: &str) -> Result<Url> {
    Url::parse(value)
        .map_err(|e| Error::config(format!("Data source {}: invalid {} '{}': {}", guid, field, value, e)))
}

// ============================================================================
// Top-level Configuration
// ============================================================================

/// All configured data sources plus shared HTTP settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataProvidersConfig {
    #[serde(default)]
    pub data_sources: Vec<DataSourceConfig>,
    /// Per-request timeout for provider calls; unset means no client timeout
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl DataProvidersConfig {
    /// Parse and validate configuration from JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| Error::config(format!("Invalid data provider configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Build the default sources from environment variables
    ///
    /// A source is included only when all of its required variables are set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut data_sources = Vec::new();

        let oauth_from = |prefix: &str| -> Option<OauthConfig> {
            Some(OauthConfig {
                client_id: lookup(&format!("{}_CLIENT_ID", prefix))?,
                client_secret: lookup(&format!("{}_CLIENT_SECRET", prefix))?,
                redirect_uri: lookup(&format!("{}_REDIRECT_URI", prefix))?,
                authorize_url: None,
                token_url: None,
                scopes: None,
            })
        };

        if let Some(oauth) = oauth_from("DEX_GITHUB") {
            let mut source = DataSourceConfig::new(GITHUB_DATA_SOURCE_GUID, ProviderKind::GitHub)
                .with_title("GitHub")
                .with_oauth(oauth);
            source.description = Some("Import repositories from GitHub".to_string());
            source.public_owner = lookup("DEX_GITHUB_PUBLIC_OWNER");
            data_sources.push(source);
        }

        if let Some(oauth) = oauth_from("DEX_GITLAB") {
            let mut source = DataSourceConfig::new(GITLAB_DATA_SOURCE_GUID, ProviderKind::GitLab)
                .with_title("GitLab")
                .with_oauth(oauth);
            source.description = Some("Import projects from GitLab".to_string());
            source.public_owner = lookup("DEX_GITLAB_PUBLIC_OWNER");
            if let Some(instance) = lookup("DEX_GITLAB_URL") {
                source.api_base_url = Some(gitlab_api_url(&instance));
            }
            data_sources.push(source);
        }

        if let Some(feed_url) = lookup("DEX_JSON_FEED_URL") {
            let mut source =
                DataSourceConfig::new(JSON_FILE_DATA_SOURCE_GUID, ProviderKind::JsonFile)
                    .with_title("JSON file")
                    .with_feed_url(feed_url);
            source.description = Some("Import projects listed in a public JSON file".to_string());
            data_sources.push(source);
        }

        log::info!(
            "[config] Loaded {} data source(s) from environment",
            data_sources.len()
        );

        Self {
            data_sources,
            request_timeout_secs: lookup("DEX_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()),
            user_agent: lookup("DEX_USER_AGENT"),
        }
    }

    /// Validate every source and check GUID uniqueness
    pub fn validate(&self) -> Result<()> {
        if let Some(agent) = &self.user_agent {
            HeaderValue::from_str(agent).map_err(|_| {
                Error::config(format!("Invalid user_agent {:?}: not a valid header value", agent))
            })?;
        }

        let mut seen = HashSet::new();
        for source in &self.data_sources {
            source.validate()?;
            if !seen.insert(source.guid.as_str()) {
                return Err(Error::config(format!(
                    "Duplicate data source guid: {}",
                    source.guid
                )));
            }
        }
        Ok(())
    }

    /// User-Agent sent with every provider request
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}

/// GitLab API root for an instance URL
pub fn gitlab_api_url(instance_url: &str) -> String {
    format!("{}/api/v4", instance_url.trim_end_matches('/'))
}
