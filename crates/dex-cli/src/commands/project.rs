//! Project import commands

use anyhow::Result;
use clap::{Args, Subcommand};
use dex_core::{AuthFilter, AuthTier, Project};
use serde::Serialize;
use tabled::Tabled;

use super::{Context, DEFAULT_USER};
use crate::output::{print_error, print_info, print_json, print_output, print_single};

#[derive(Subcommand)]
pub enum ProjectAction {
    /// List the projects of a data source
    List {
        /// Data source GUID
        guid: String,

        #[command(flatten)]
        access: AccessArgs,
    },

    /// Fetch one project of a data source
    Get {
        /// Data source GUID
        guid: String,

        /// Provider project id
        id: i64,

        #[command(flatten)]
        access: AccessArgs,
    },
}

/// How to authenticate against the data source
#[derive(Args, Debug, Clone)]
pub struct AccessArgs {
    /// Access token to use (overrides stored tokens)
    #[arg(long, conflicts_with = "user")]
    pub token: Option<String>,

    /// Use the tokens stored for this user
    #[arg(long)]
    pub user: Option<String>,

    /// Read public projects of an authorized source without authenticating
    #[arg(long, conflicts_with_all = ["token", "user"])]
    pub public: bool,
}

/// Project row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct ProjectRow {
    #[tabled(rename = "ID")]
    pub id: i64,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Owner")]
    pub owner: String,
    #[tabled(rename = "Description")]
    pub short_description: String,
    #[tabled(rename = "URL")]
    pub url: String,
}

impl From<&Project> for ProjectRow {
    fn from(project: &Project) -> Self {
        Self {
            id: project.id,
            name: project.name.clone(),
            owner: project.owner.clone(),
            short_description: truncate(&project.short_description, 60),
            url: project.url.clone(),
        }
    }
}

pub async fn execute(ctx: &Context, action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::List { guid, access } => list_projects(ctx, &guid, &access).await,
        ProjectAction::Get { guid, id, access } => get_project(ctx, &guid, id, &access).await,
    }
}

/// Whether a call on a source of this tier authenticates
///
/// Public sources never do. Authorized sources do unless `--public` is
/// given. An unknown source is left to the service to report.
fn needs_auth(tier: Option<AuthTier>, public: bool) -> bool {
    tier != Some(AuthTier::Public) && !public
}

fn source_tier(ctx: &Context, guid: &str) -> Option<AuthTier> {
    ctx.service
        .retrieve_data_sources(AuthFilter::All)
        .iter()
        .find(|source| source.guid() == guid)
        .map(|source| source.tier())
}

/// Resolve the token for an authenticated call
///
/// An explicit `--token` wins; otherwise the stored token of `--user`
/// (or the default user) is used. A missing token is left to the service,
/// which reports that authentication is required.
async fn resolve_token(
    ctx: &Context,
    guid: &str,
    access: &AccessArgs,
    needs_auth: bool,
) -> Result<Option<String>> {
    if !needs_auth {
        return Ok(None);
    }
    if let Some(token) = &access.token {
        return Ok(Some(token.clone()));
    }

    let user = access.user.as_deref().unwrap_or(DEFAULT_USER);
    let stored = ctx.token_store().get_tokens(user, guid).await?;

    Ok(match stored {
        Some(tokens) if tokens.is_expired_at(chrono::Utc::now()) => {
            print_error(&format!(
                "Stored token for {} has expired; run 'dex oauth connect {} --code <code>' again",
                guid, guid
            ));
            None
        }
        Some(tokens) => Some(tokens.access_token),
        None => None,
    })
}

async fn list_projects(ctx: &Context, guid: &str, access: &AccessArgs) -> Result<()> {
    let needs_auth = needs_auth(source_tier(ctx, guid), access.public);
    let token = resolve_token(ctx, guid, access, needs_auth).await?;
    let projects = ctx
        .service
        .get_all_projects(guid, token.as_deref(), needs_auth)
        .await?;

    if projects.is_empty() && ctx.format.is_table() {
        print_info(&format!("No projects found in {}.", guid), ctx.quiet);
        return Ok(());
    }

    if ctx.format.is_table() {
        let rows: Vec<ProjectRow> = projects.iter().map(ProjectRow::from).collect();
        print_output(&rows, ctx.format)
    } else {
        print_json(&projects)
    }
}

async fn get_project(ctx: &Context, guid: &str, id: i64, access: &AccessArgs) -> Result<()> {
    let needs_auth = needs_auth(source_tier(ctx, guid), access.public);
    let token = resolve_token(ctx, guid, access, needs_auth).await?;
    let project = ctx
        .service
        .get_project_by_guid(guid, token.as_deref(), id, needs_auth)
        .await?;

    if ctx.format.is_table() {
        print_single(&ProjectRow::from(&project), ctx.format)
    } else {
        print_json(&project)
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut)
}
