//! Data source commands
//!
//! Lists the sources in the registry and checks whether a GUID is known.

use anyhow::Result;
use clap::Subcommand;
use dex_core::{AuthFilter, DataSourceInfo};
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{print_error, print_info, print_output, print_success};

#[derive(Subcommand)]
pub enum SourceAction {
    /// List registered data sources
    List {
        /// Filter by tier: all, authorized or public
        #[arg(long, default_value = "all")]
        auth: AuthFilter,
    },

    /// Check whether a data source GUID is registered
    Check {
        /// Data source GUID
        guid: String,
    },
}

/// Source row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct SourceRow {
    #[tabled(rename = "GUID")]
    pub guid: String,
    #[tabled(rename = "Title")]
    pub title: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Tier")]
    pub tier: String,
    #[tabled(rename = "Visible")]
    pub visible: String,
}

impl From<DataSourceInfo> for SourceRow {
    fn from(info: DataSourceInfo) -> Self {
        Self {
            guid: info.guid,
            title: info.title,
            kind: info.kind,
            tier: info.tier.to_string(),
            visible: if info.is_visible { "yes" } else { "no" }.to_string(),
        }
    }
}

pub async fn execute(ctx: &Context, action: SourceAction) -> Result<()> {
    match action {
        SourceAction::List { auth } => list_sources(ctx, auth),
        SourceAction::Check { guid } => check_source(ctx, &guid),
    }
}

fn list_sources(ctx: &Context, filter: AuthFilter) -> Result<()> {
    let rows: Vec<SourceRow> = ctx
        .service
        .retrieve_data_sources(filter)
        .iter()
        .map(|source| SourceRow::from(source.info()))
        .collect();

    if rows.is_empty() && ctx.format.is_table() {
        print_info("No data sources configured.", ctx.quiet);
        print_info(
            "Pass --config <file> or set DEX_GITHUB_*, DEX_GITLAB_* or DEX_JSON_FEED_URL.",
            ctx.quiet,
        );
        return Ok(());
    }

    print_output(&rows, ctx.format)
}

fn check_source(ctx: &Context, guid: &str) -> Result<()> {
    if ctx.service.is_existing_data_source_guid(guid) {
        print_success(&format!("Data source registered: {}", guid), ctx.quiet);
        Ok(())
    } else {
        print_error(&format!("Unknown data source: {}", guid));
        anyhow::bail!("data source {} is not registered", guid)
    }
}
