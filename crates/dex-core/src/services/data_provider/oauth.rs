//! OAuth 2.0 authorization-code helpers shared by authorized adaptees

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::http::excerpt;
use crate::error::{Error, Result};

/// Resolved OAuth registration of one source
#[derive(Debug, Clone, PartialEq)]
pub struct OauthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

impl OauthSettings {
    /// Authorization endpoint with client id, redirect URI, response type
    /// and scopes filled in
    ///
    /// Pure string construction; no request is made.
    pub fn authorization_url(&self) -> Result<String> {
        let scope = self.scopes.join(" ");
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_type", "code"),
        ];
        if !scope.is_empty() {
            params.push(("scope", scope.as_str()));
        }

        let url = Url::parse_with_params(&self.authorize_url, &params)?;
        Ok(url.to_string())
    }
}

/// Error body of an OAuth token endpoint (RFC 6749 §5.2)
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenErrorResponse {
    fn message(&self) -> String {
        match &self.error_description {
            Some(desc) => format!("{}: {}", self.error, desc),
            None => self.error.clone(),
        }
    }
}

/// Exchange an authorization code for tokens
///
/// Codes are single use, so the request is sent exactly once. A rejected
/// code surfaces as `ExternalProvider`, including the GitHub variant that
/// answers 200 with an `error` field in the body.
pub(crate) async fn exchange_code<T: DeserializeOwned>(
    client: &Client,
    provider: &str,
    settings: &OauthSettings,
    code: &str,
) -> Result<T> {
    log::info!("[data_provider:oauth] Exchanging authorization code with {}", provider);

    let response = client
        .post(&settings.token_url)
        .header("Accept", "application/json")
        .form(&[
            ("client_id", settings.client_id.as_str()),
            ("client_secret", settings.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", settings.redirect_uri.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if let Ok(error) = serde_json::from_str::<TokenErrorResponse>(&body) {
        log::warn!(
            "[data_provider:oauth] {} rejected the authorization code: {} (HTTP {})",
            provider,
            error.error,
            status
        );
        return Err(Error::provider(provider, Some(status.as_u16()), error.message()));
    }

    if !status.is_success() {
        log::warn!("[data_provider:oauth] {} token endpoint failed: HTTP {}", provider, status);
        return Err(Error::provider(provider, Some(status.as_u16()), excerpt(&body)));
    }

    serde_json::from_str(&body).map_err(|e| {
        log::error!("[data_provider:oauth] Failed to parse {} token response: {}", provider, e);
        Error::provider(provider, Some(status.as_u16()), format!("Invalid token response: {}", e))
    })
}
