//! Shared HTTP plumbing for provider API calls

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::DataProvidersConfig;
use crate::error::{Error, Result};

/// What a request is looking up, used to map a 404
#[derive(Debug, Clone, Copy)]
pub(crate) enum Lookup<'a> {
    /// A listing endpoint; a 404 is a provider failure
    Listing,
    /// A single project; a 404 means the project does not exist
    Project { data_source: &'a str, id: i64 },
}

/// Build the HTTP client shared by every adaptee of one registry snapshot
pub(crate) fn build_client(config: &DataProvidersConfig) -> Result<Client> {
    let mut builder = Client::builder().user_agent(config.user_agent().to_string());
    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}

/// Attach a bearer token to a request
pub(crate) fn bearer(request: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
    match access_token {
        Some(token) => request.header("Authorization", format!("Bearer {}", token)),
        None => request,
    }
}

/// Send a provider API request and decode its JSON body
///
/// Status mapping:
/// - 401 or 403 on an authenticated call: `AuthenticationFailed`
/// - 404 on a project lookup: `ProjectNotFound`
/// - any other non-success: `ExternalProvider`
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
    authenticated: bool,
    lookup: Lookup<'_>,
) -> Result<T> {
    let response = request.send().await?;
    let status = response.status();
    log::debug!("[data_provider:http] {} responded HTTP {}", provider, status);

    if authenticated && (status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN) {
        log::warn!("[data_provider:http] {} rejected the access token: HTTP {}", provider, status);
        return Err(Error::auth_failed(format!(
            "{} rejected the access token (HTTP {})",
            provider,
            status.as_u16()
        )));
    }

    if status == StatusCode::NOT_FOUND {
        if let Lookup::Project { data_source, id } = lookup {
            return Err(Error::ProjectNotFound {
                data_source: data_source.to_string(),
                id,
            });
        }
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        log::warn!("[data_provider:http] {} API error: HTTP {}", provider, status);
        return Err(Error::provider(
            provider,
            Some(status.as_u16()),
            excerpt(&body),
        ));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        log::error!("[data_provider:http] Failed to parse {} response: {}", provider, e);
        Error::provider(provider, Some(status.as_u16()), format!("Invalid response body: {}", e))
    })
}

/// First 200 characters of a response body, for error messages
pub(crate) fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(200) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
