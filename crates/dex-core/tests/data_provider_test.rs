//! Integration tests for the data provider service against mock providers
//!
//! Each test starts ephemeral warp servers that answer like the GitHub,
//! GitLab and JSON feed endpoints the adaptees call.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dex_core::{
    DataProviderService, DataProvidersConfig, DataSourceConfig, DataSourceRegistry, Error,
    OauthConfig, ProviderKind,
};
use serde_json::json;
use url::Url;
use warp::http::StatusCode;
use warp::reply::{json as reply_json, with_status, Json, WithStatus};
use warp::Filter;

const CLIENT_ID: &str = "C";
const REDIRECT_URI: &str = "https://dex.example.com/oauth/callback";

// =============================================================================
// Mock Providers
// =============================================================================

fn reply(body: serde_json::Value, status: StatusCode) -> WithStatus<Json> {
    with_status(reply_json(&body), status)
}

fn github_repository(id: i64) -> serde_json::Value {
    json!({
        "id": id,
        "name": "digital-excellence",
        "full_name": "dex-org/digital-excellence",
        "description": "Portfolio platform for students\nWith imported projects",
        "html_url": "https://github.com/dex-org/digital-excellence",
        "owner": { "login": "dex-org", "id": 1 },
        "private": false,
        "created_at": "2020-02-10T09:00:00Z",
        "updated_at": "2022-06-01T12:00:00Z"
    })
}

/// GitHub API + OAuth mock; the counter records every request served
async fn start_github_mock() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    let repository = warp::get()
        .and(warp::path!("repositories" / i64))
        .and(warp::header::optional::<String>("authorization"))
        .map(move |id: i64, auth: Option<String>| {
            counter.fetch_add(1, Ordering::SeqCst);
            match auth.as_deref() {
                Some(value) if value != "Bearer validtoken" => {
                    reply(json!({ "message": "Bad credentials" }), StatusCode::UNAUTHORIZED)
                }
                _ if id == 42 => reply(github_repository(id), StatusCode::OK),
                _ => reply(json!({ "message": "Not Found" }), StatusCode::NOT_FOUND),
            }
        });

    let counter = hits.clone();
    let user_repos = warp::get()
        .and(warp::path!("user" / "repos"))
        .and(warp::header::optional::<String>("authorization"))
        .map(move |auth: Option<String>| {
            counter.fetch_add(1, Ordering::SeqCst);
            if auth.as_deref() == Some("Bearer validtoken") {
                reply(json!([github_repository(42), github_repository(43)]), StatusCode::OK)
            } else {
                reply(json!({ "message": "Requires authentication" }), StatusCode::UNAUTHORIZED)
            }
        });

    let counter = hits.clone();
    let public_repos = warp::get()
        .and(warp::path!("users" / String / "repos"))
        .map(move |owner: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut repo = github_repository(7);
            repo["owner"]["login"] = json!(owner);
            reply(json!([repo]), StatusCode::OK)
        });

    let counter = hits.clone();
    let token = warp::post()
        .and(warp::path!("login" / "oauth" / "access_token"))
        .and(warp::body::form())
        .map(move |form: HashMap<String, String>| {
            counter.fetch_add(1, Ordering::SeqCst);
            // GitHub reports a bad code with HTTP 200 and an error body
            if form.get("code").map(String::as_str) == Some("good-code")
                && form.get("client_id").map(String::as_str) == Some(CLIENT_ID)
            {
                reply(
                    json!({ "access_token": "gho_new", "token_type": "bearer", "scope": "repo" }),
                    StatusCode::OK,
                )
            } else {
                reply(
                    json!({
                        "error": "bad_verification_code",
                        "error_description": "The code passed is incorrect or expired."
                    }),
                    StatusCode::OK,
                )
            }
        });

    let routes = repository.or(user_repos).or(public_repos).or(token);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (addr, hits)
}

/// GitLab API + OAuth mock
async fn start_gitlab_mock() -> SocketAddr {
    let project = warp::get()
        .and(warp::path!("api" / "v4" / "projects" / i64))
        .map(|id: i64| {
            if id == 1337 {
                reply(
                    json!({
                        "id": 1337,
                        "name": "Portfolio",
                        "path_with_namespace": "students/portfolio",
                        "description": null,
                        "web_url": "https://gitlab.example.com/students/portfolio",
                        "namespace": { "name": "Students", "path": "students", "full_path": "students" },
                        "created_at": "2021-09-01T08:00:00.000Z",
                        "last_activity_at": "2022-01-15T16:30:00.000Z"
                    }),
                    StatusCode::OK,
                )
            } else {
                reply(json!({ "message": "404 Project Not Found" }), StatusCode::NOT_FOUND)
            }
        });

    let projects = warp::get()
        .and(warp::path!("api" / "v4" / "projects"))
        .map(|| reply(json!({ "message": "500 Internal Server Error" }), StatusCode::INTERNAL_SERVER_ERROR));

    let token = warp::post()
        .and(warp::path!("oauth" / "token"))
        .and(warp::body::form())
        .map(|form: HashMap<String, String>| {
            if form.get("code").map(String::as_str) == Some("good-code")
                && form.get("grant_type").map(String::as_str) == Some("authorization_code")
            {
                reply(
                    json!({
                        "access_token": "gitlab-access",
                        "token_type": "bearer",
                        "expires_in": 7200,
                        "refresh_token": "gitlab-refresh",
                        "created_at": 1767225600
                    }),
                    StatusCode::OK,
                )
            } else {
                reply(
                    json!({
                        "error": "invalid_grant",
                        "error_description": "The provided authorization grant is invalid, expired, revoked, does not match the redirection URI used in the authorization request, or was issued to another client."
                    }),
                    StatusCode::BAD_REQUEST,
                )
            }
        });

    let routes = project.or(projects).or(token);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

/// Public JSON project document
async fn start_feed_mock() -> SocketAddr {
    let feed = warp::get().and(warp::path!("projects.json")).map(|| {
        reply(
            json!({ "projects": [
                { "id": 1, "name": "Robot arm", "description": "Six axis arm", "author": "j.doe", "uri": "https://example.com/arm" },
                { "name": "Untitled" }
            ]}),
            StatusCode::OK,
        )
    });

    let broken = warp::get()
        .and(warp::path!("broken.json"))
        .map(|| warp::reply::html("<html>not json</html>"));

    let agent = warp::get()
        .and(warp::path!("agent.json"))
        .and(warp::header::optional::<String>("user-agent"))
        .map(|agent: Option<String>| {
            reply(json!([{ "id": 1, "name": agent.unwrap_or_default() }]), StatusCode::OK)
        });

    let private = warp::get()
        .and(warp::path!("private.json"))
        .map(|| reply(json!({ "message": "Unauthorized" }), StatusCode::UNAUTHORIZED));

    let routes = feed.or(broken).or(agent).or(private);
    let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

// =============================================================================
// Helpers
// =============================================================================

fn oauth(token_url: String) -> OauthConfig {
    OauthConfig {
        client_id: CLIENT_ID.to_string(),
        client_secret: "S".to_string(),
        redirect_uri: REDIRECT_URI.to_string(),
        authorize_url: None,
        token_url: Some(token_url),
        scopes: None,
    }
}

fn service_for(sources: Vec<DataSourceConfig>) -> DataProviderService {
    let config = DataProvidersConfig {
        data_sources: sources,
        ..Default::default()
    };
    let registry = DataSourceRegistry::from_config(&config).expect("valid config");
    DataProviderService::new(Arc::new(registry))
}

fn github_source(addr: SocketAddr) -> DataSourceConfig {
    DataSourceConfig::new("gh", ProviderKind::GitHub)
        .with_api_base_url(format!("http://{}", addr))
        .with_oauth(oauth(format!("http://{}/login/oauth/access_token", addr)))
}

fn gitlab_source(addr: SocketAddr) -> DataSourceConfig {
    DataSourceConfig::new("gl", ProviderKind::GitLab)
        .with_api_base_url(format!("http://{}/api/v4", addr))
        .with_oauth(oauth(format!("http://{}/oauth/token", addr)))
}

fn feed_source(addr: SocketAddr, file: &str) -> DataSourceConfig {
    DataSourceConfig::new("feed", ProviderKind::JsonFile).with_feed_url(format!("http://{}/{}", addr, file))
}

// =============================================================================
// GitHub
// =============================================================================

#[tokio::test]
async fn test_get_project_by_guid_returns_canonical_project() {
    let (addr, _) = start_github_mock().await;
    let service = service_for(vec![github_source(addr)]);

    let project = service
        .get_project_by_guid("gh", Some("validtoken"), 42, true)
        .await
        .unwrap();

    assert_eq!(project.id, 42);
    assert_eq!(project.data_source_guid, "gh");
    assert_eq!(project.name, "digital-excellence");
    assert_eq!(project.owner, "dex-org");
    assert_eq!(project.url, "https://github.com/dex-org/digital-excellence");
    assert_eq!(project.short_description, "Portfolio platform for students");
    assert!(project.description.contains("With imported projects"));
    assert!(project.created_at.is_some());
    assert!(project.updated_at.is_some());
}

#[tokio::test]
async fn test_unknown_project_is_project_not_found() {
    let (addr, _) = start_github_mock().await;
    let service = service_for(vec![github_source(addr)]);

    let err = service
        .get_project_by_guid("gh", Some("validtoken"), 7, true)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::ProjectNotFound { ref data_source, id: 7 } if data_source == "gh"),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_rejected_token_is_authentication_failure() {
    let (addr, _) = start_github_mock().await;
    let service = service_for(vec![github_source(addr)]);

    let err = service
        .get_project_by_guid("gh", Some("revoked"), 42, true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed(_)), "unexpected error: {err}");

    let err = service
        .get_all_projects("gh", Some("revoked"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed(_)), "unexpected error: {err}");
}

#[tokio::test]
async fn test_missing_token_fails_before_any_request() {
    let (addr, hits) = start_github_mock().await;
    let service = service_for(vec![github_source(addr)]);

    let err = service.get_all_projects("gh", None, true).await.unwrap_err();

    assert!(matches!(err, Error::AuthenticationRequired(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_get_all_projects_authorized() {
    let (addr, hits) = start_github_mock().await;
    let service = service_for(vec![github_source(addr)]);

    let projects = service
        .get_all_projects("gh", Some("validtoken"), true)
        .await
        .unwrap();

    let ids: Vec<i64> = projects.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![42, 43]);
    assert!(projects.iter().all(|p| p.data_source_guid == "gh"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_get_all_projects_public_ignores_token() {
    let (addr, _) = start_github_mock().await;
    let service = service_for(vec![github_source(addr).with_public_owner("fontys")]);

    let projects = service
        .get_all_projects("gh", Some("not-even-checked"), false)
        .await
        .unwrap();

    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].owner, "fontys");
}

#[tokio::test]
async fn test_public_fetch_by_id() {
    let (addr, _) = start_github_mock().await;
    let service = service_for(vec![github_source(addr)]);

    let project = service.get_project_by_guid("gh", None, 42, false).await.unwrap();
    assert_eq!(project.id, 42);
}

#[tokio::test]
async fn test_github_rejected_code_is_external_error() {
    let (addr, _) = start_github_mock().await;
    let service = service_for(vec![github_source(addr)]);

    let err = service.get_tokens("expired123", "gh").await.unwrap_err();

    assert!(err.is_external(), "unexpected error: {err}");
    assert!(!matches!(
        err,
        Error::CapabilityMismatch(_) | Error::UnknownSource(_) | Error::ProjectNotFound { .. }
    ));
    assert!(err.to_string().contains("bad_verification_code"));
}

#[tokio::test]
async fn test_github_code_exchange() {
    let (addr, _) = start_github_mock().await;
    let service = service_for(vec![github_source(addr)]);

    let tokens = service.get_tokens("good-code", "gh").await.unwrap();

    assert_eq!(tokens.access_token, "gho_new");
    assert_eq!(tokens.token_type, "bearer");
    assert_eq!(tokens.scope.as_deref(), Some("repo"));
    assert!(tokens.refresh_token.is_none());
    assert!(tokens.expires_at.is_none());
}

#[tokio::test]
async fn test_oauth_url_round_trip() {
    let (addr, hits) = start_github_mock().await;
    let service = service_for(vec![github_source(addr)]);

    let url = Url::parse(&service.get_oauth_url("gh").unwrap()).unwrap();
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    assert_eq!(url.host_str(), Some("github.com"));
    assert_eq!(params.get("client_id").map(String::as_str), Some(CLIENT_ID));
    assert_eq!(params.get("redirect_uri").map(String::as_str), Some(REDIRECT_URI));
    assert_eq!(params.get("response_type").map(String::as_str), Some("code"));
    // Building the URL is pure templating
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

// =============================================================================
// GitLab
// =============================================================================

#[tokio::test]
async fn test_gitlab_rejected_code_is_external_error() {
    let addr = start_gitlab_mock().await;
    let service = service_for(vec![gitlab_source(addr)]);

    let err = service.get_tokens("expired123", "gl").await.unwrap_err();

    match err {
        Error::ExternalProvider { provider, status, message } => {
            assert_eq!(provider, "GitLab");
            assert_eq!(status, Some(400));
            assert!(message.starts_with("invalid_grant"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_gitlab_code_exchange_computes_expiry() {
    let addr = start_gitlab_mock().await;
    let service = service_for(vec![gitlab_source(addr)]);

    let tokens = service.get_tokens("good-code", "gl").await.unwrap();

    assert_eq!(tokens.access_token, "gitlab-access");
    assert_eq!(tokens.refresh_token.as_deref(), Some("gitlab-refresh"));
    assert_eq!(tokens.expires_at.unwrap().timestamp(), 1767225600 + 7200);
}

#[tokio::test]
async fn test_gitlab_project_defaults_for_missing_fields() {
    let addr = start_gitlab_mock().await;
    let service = service_for(vec![gitlab_source(addr)]);

    let project = service
        .get_project_by_guid("gl", Some("token"), 1337, true)
        .await
        .unwrap();

    assert_eq!(project.id, 1337);
    assert_eq!(project.owner, "students");
    assert_eq!(project.description, "");
    assert_eq!(project.short_description, "");
}

#[tokio::test]
async fn test_gitlab_server_error_is_external() {
    let addr = start_gitlab_mock().await;
    let service = service_for(vec![gitlab_source(addr)]);

    let err = service.get_all_projects("gl", Some("token"), true).await.unwrap_err();

    assert!(
        matches!(err, Error::ExternalProvider { status: Some(500), .. }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_gitlab_oauth_url_uses_instance() {
    let addr = start_gitlab_mock().await;
    let service = service_for(vec![gitlab_source(addr)]);

    let url = Url::parse(&service.get_oauth_url("gl").unwrap()).unwrap();
    assert_eq!(url.path(), "/oauth/authorize");
    assert_eq!(url.port(), Some(addr.port()));
}

// =============================================================================
// JSON Feed
// =============================================================================

#[tokio::test]
async fn test_feed_listing_and_lookup() {
    let addr = start_feed_mock().await;
    let service = service_for(vec![feed_source(addr, "projects.json")]);

    let projects = service.get_all_projects("feed", None, false).await.unwrap();
    assert_eq!(projects.len(), 2);
    assert_eq!(projects[0].owner, "j.doe");
    assert_eq!(projects[0].short_description, "Six axis arm");
    assert_eq!(projects[1].id, 0);
    assert_eq!(projects[1].name, "Untitled");

    let project = service.get_project_by_guid("feed", None, 1, false).await.unwrap();
    assert_eq!(project.name, "Robot arm");

    let err = service.get_project_by_guid("feed", None, 99, false).await.unwrap_err();
    assert!(matches!(err, Error::ProjectNotFound { id: 99, .. }));
}

#[tokio::test]
async fn test_feed_oauth_is_capability_mismatch() {
    let addr = start_feed_mock().await;
    let service = service_for(vec![feed_source(addr, "projects.json")]);

    assert!(matches!(service.get_oauth_url("feed"), Err(Error::CapabilityMismatch(_))));
    assert!(matches!(
        service.get_tokens("code", "feed").await,
        Err(Error::CapabilityMismatch(_))
    ));
    assert!(matches!(
        service.get_all_projects("feed", Some("token"), true).await,
        Err(Error::CapabilityMismatch(_))
    ));
}

#[tokio::test]
async fn test_feed_unparseable_body_is_external() {
    let addr = start_feed_mock().await;
    let service = service_for(vec![feed_source(addr, "broken.json")]);

    let err = service.get_all_projects("feed", None, false).await.unwrap_err();
    assert!(err.is_external(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_configured_user_agent_is_sent() {
    let addr = start_feed_mock().await;
    let config = DataProvidersConfig {
        data_sources: vec![feed_source(addr, "agent.json")],
        request_timeout_secs: Some(5),
        user_agent: Some("dex-tests/1.0".to_string()),
    };
    let registry = DataSourceRegistry::from_config(&config).unwrap();
    let service = DataProviderService::new(Arc::new(registry));

    let projects = service.get_all_projects("feed", None, false).await.unwrap();
    assert_eq!(projects[0].name, "dex-tests/1.0");
}

#[tokio::test]
async fn test_anonymous_unauthorized_is_external() {
    let addr = start_feed_mock().await;
    let service = service_for(vec![feed_source(addr, "private.json")]);

    let err = service.get_all_projects("feed", None, false).await.unwrap_err();
    assert!(
        matches!(err, Error::ExternalProvider { status: Some(401), .. }),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_unreachable_provider_is_external() {
    let service = service_for(vec![
        DataSourceConfig::new("feed", ProviderKind::JsonFile).with_feed_url("http://127.0.0.1:1/projects.json"),
    ]);

    let err = service.get_all_projects("feed", None, false).await.unwrap_err();
    assert!(err.is_external(), "unexpected error: {err}");
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_calls_across_sources() {
    let (gh_addr, _) = start_github_mock().await;
    let feed_addr = start_feed_mock().await;
    let service = service_for(vec![github_source(gh_addr), feed_source(feed_addr, "projects.json")]);

    let mut handles = Vec::new();
    for i in 0..16 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                service
                    .get_project_by_guid("gh", Some("validtoken"), 42, true)
                    .await
                    .map(|p| p.data_source_guid)
            } else {
                service
                    .get_project_by_guid("feed", None, 1, false)
                    .await
                    .map(|p| p.data_source_guid)
            }
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let guid = handle.await.unwrap().unwrap();
        assert_eq!(guid, if i % 2 == 0 { "gh" } else { "feed" });
    }
}
