//! Data models for the data provider subsystem

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Maximum length of a derived short description, in characters
pub const SHORT_DESCRIPTION_MAX_CHARS: usize = 150;

/// Canonical, provider-independent project
///
/// Every field has a defined default so a translated record is never left
/// partially constructed when the provider omits something.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Provider-side project id
    pub id: i64,
    /// GUID of the data source this project was fetched from
    pub data_source_guid: String,
    pub name: String,
    pub short_description: String,
    pub description: String,
    /// Owner login, username or namespace
    pub owner: String,
    /// Browser URL of the project
    pub url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Derive the short description from a full description
    ///
    /// Takes the first non-empty line and cuts it at
    /// [`SHORT_DESCRIPTION_MAX_CHARS`] characters.
    pub fn short_description_from(description: &str) -> String {
        let first_line = description
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default();

        match first_line.char_indices().nth(SHORT_DESCRIPTION_MAX_CHARS) {
            Some((cut, _)) => first_line[..cut].trim_end().to_string(),
            None => first_line.to_string(),
        }
    }
}

/// Tokens produced by a successful OAuth code exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OauthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Usually "bearer"
    pub token_type: String,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl OauthTokens {
    /// Whether the access token has expired at `now`
    ///
    /// Tokens without an expiry (GitHub OAuth apps) never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }

    /// Compute an expiry from an `expires_in` seconds value
    pub fn expiry_from(issued_at: DateTime<Utc>, expires_in: Option<i64>) -> Option<DateTime<Utc>> {
        expires_in
            .filter(|secs| *secs > 0)
            .and_then(|secs| issued_at.checked_add_signed(Duration::seconds(secs)))
    }
}

/// Capability tier of a data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthTier {
    /// No authentication required
    Public,
    /// Requires an OAuth access token
    Authorized,
}

impl std::fmt::Display for AuthTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthTier::Public => write!(f, "public"),
            AuthTier::Authorized => write!(f, "authorized"),
        }
    }
}

/// Serializable description of a registered data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub guid: String,
    pub title: String,
    pub description: String,
    /// Provider kind (github, gitlab, json_file)
    pub kind: String,
    pub tier: AuthTier,
    pub is_visible: bool,
}

/// A data source a user has linked through the OAuth flow
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LinkedDataSource {
    pub user_id: String,
    pub data_source_guid: String,
    pub token_type: String,
    pub scope: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
