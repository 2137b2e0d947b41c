//! OAuth commands
//!
//! Link a user to an authorized data source: print the authorization URL,
//! exchange the returned code, and keep the tokens in the local database.

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use dex_core::{LinkedDataSource, OauthTokens};
use serde::Serialize;
use tabled::Tabled;

use super::{Context, DEFAULT_USER};
use crate::output::{print_error, print_info, print_json, print_output, print_single, print_success};

#[derive(Subcommand)]
pub enum OauthAction {
    /// Print the authorization URL of a data source
    Url {
        /// Data source GUID
        guid: String,
    },

    /// Exchange an authorization code and store the tokens
    Connect {
        /// Data source GUID
        guid: String,

        /// Authorization code from the redirect
        #[arg(long)]
        code: String,

        /// User the tokens belong to
        #[arg(long, default_value = DEFAULT_USER)]
        user: String,
    },

    /// Forget the stored tokens of a data source
    Disconnect {
        /// Data source GUID
        guid: String,

        #[arg(long, default_value = DEFAULT_USER)]
        user: String,
    },

    /// Show which data sources a user has linked
    Status {
        #[arg(long, default_value = DEFAULT_USER)]
        user: String,
    },
}

/// Linked data source row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct LinkRow {
    #[tabled(rename = "Data source")]
    pub data_source: String,
    #[tabled(rename = "Title")]
    pub title: String,
    #[tabled(rename = "Token type")]
    pub token_type: String,
    #[tabled(rename = "Scope")]
    pub scope: String,
    #[tabled(rename = "Expires")]
    pub expires: String,
}

/// Result of a successful connect; the access token is never printed
#[derive(Debug, Serialize, Tabled)]
pub struct ConnectRow {
    #[tabled(rename = "Data source")]
    pub data_source: String,
    #[tabled(rename = "User")]
    pub user: String,
    #[tabled(rename = "Token type")]
    pub token_type: String,
    #[tabled(rename = "Refreshable")]
    pub refreshable: bool,
    #[tabled(rename = "Expires")]
    pub expires: String,
}

pub async fn execute(ctx: &Context, action: OauthAction) -> Result<()> {
    match action {
        OauthAction::Url { guid } => show_url(ctx, &guid),
        OauthAction::Connect { guid, code, user } => connect(ctx, &guid, &code, &user).await,
        OauthAction::Disconnect { guid, user } => disconnect(ctx, &guid, &user).await,
        OauthAction::Status { user } => status(ctx, &user).await,
    }
}

fn show_url(ctx: &Context, guid: &str) -> Result<()> {
    let url = ctx.service.get_oauth_url(guid)?;

    if ctx.format.is_table() {
        print_info("Open this URL to authorize access:", ctx.quiet);
        println!("{}", url);
        Ok(())
    } else {
        print_json(&serde_json::json!({ "url": url }))
    }
}

async fn connect(ctx: &Context, guid: &str, code: &str, user: &str) -> Result<()> {
    let tokens = match ctx.service.get_tokens(code, guid).await {
        Ok(tokens) => tokens,
        Err(e) => {
            print_error(&format!("Failed to link {}: {}", guid, e));
            return Err(e.into());
        }
    };

    ctx.token_store().save_tokens(user, guid, &tokens).await?;
    print_success(&format!("Linked data source {} for user {}", guid, user), ctx.quiet);

    print_single(&connect_row(guid, user, &tokens), ctx.format)
}

fn connect_row(guid: &str, user: &str, tokens: &OauthTokens) -> ConnectRow {
    ConnectRow {
        data_source: guid.to_string(),
        user: user.to_string(),
        token_type: tokens.token_type.clone(),
        refreshable: tokens.refresh_token.is_some(),
        expires: format_expiry(tokens.expires_at),
    }
}

async fn disconnect(ctx: &Context, guid: &str, user: &str) -> Result<()> {
    if ctx.token_store().remove_tokens(user, guid).await? {
        print_success(&format!("Unlinked data source {} for user {}", guid, user), ctx.quiet);
    } else {
        print_info(&format!("Data source {} was not linked for user {}", guid, user), ctx.quiet);
    }
    Ok(())
}

async fn status(ctx: &Context, user: &str) -> Result<()> {
    let linked = ctx.token_store().list_linked_sources(user).await?;

    if linked.is_empty() && ctx.format.is_table() {
        print_info(&format!("No data sources linked for user {}.", user), ctx.quiet);
        print_info("Use 'dex oauth url <guid>' to start linking one.", ctx.quiet);
        return Ok(());
    }

    let rows: Vec<LinkRow> = linked.into_iter().map(|link| link_row(ctx, link)).collect();
    print_output(&rows, ctx.format)
}

fn link_row(ctx: &Context, link: LinkedDataSource) -> LinkRow {
    // A source removed from the configuration keeps its stored tokens
    let title = ctx
        .service
        .retrieve_data_sources(Default::default())
        .into_iter()
        .find(|source| source.guid() == link.data_source_guid)
        .map(|source| source.info().title)
        .unwrap_or_else(|| "(not registered)".to_string());

    LinkRow {
        data_source: link.data_source_guid,
        title,
        token_type: link.token_type,
        scope: link.scope.unwrap_or_else(|| "-".to_string()),
        expires: format_expiry(link.expires_at),
    }
}

fn format_expiry(expires_at: Option<chrono::DateTime<Utc>>) -> String {
    match expires_at {
        None => "never".to_string(),
        Some(at) if at <= Utc::now() => format!("{} (expired)", at.format("%Y-%m-%d %H:%M")),
        Some(at) => at.format("%Y-%m-%d %H:%M").to_string(),
    }
}
