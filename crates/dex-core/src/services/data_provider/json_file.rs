//! JSON file data source
//!
//! Public adaptee that reads a JSON document listing projects, for
//! portfolios hosted outside GitHub/GitLab. The document is either an
//! array of project objects or an object with a `projects` array:
//!
//! ```json
//! [{ "id": 1, "name": "Robot arm", "description": "...", "uri": "https://..." }]
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::http::{fetch_json, Lookup};
use super::{DataSourceAdaptee, DataSourceMetadata, ProviderProject};
use crate::config::{DataSourceConfig, ProviderKind};
use crate::error::{Error, Result};

const PROVIDER: &str = "JSON file";

// ============================================================================
// Native Types
// ============================================================================

/// One entry of the project document; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonFileProject {
    pub id: Option<i64>,
    pub name: Option<String>,
    #[serde(alias = "shortDescription")]
    pub short_description: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "author")]
    pub owner: Option<String>,
    #[serde(alias = "url")]
    pub uri: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProjectDocument {
    List(Vec<JsonFileProject>),
    Wrapped { projects: Vec<JsonFileProject> },
}

impl ProjectDocument {
    fn into_projects(self) -> Vec<JsonFileProject> {
        match self {
            ProjectDocument::List(projects) => projects,
            ProjectDocument::Wrapped { projects } => projects,
        }
    }
}

// ============================================================================
// JsonFileDataSource
// ============================================================================

pub struct JsonFileDataSource {
    metadata: DataSourceMetadata,
    client: Client,
    feed_url: String,
}

impl JsonFileDataSource {
    /// Build from a validated source config
    pub fn new(config: &DataSourceConfig, client: Client) -> Result<Self> {
        let feed_url = config.feed_url.clone().ok_or_else(|| {
            Error::config(format!("JSON file data source {} has no feed_url", config.guid))
        })?;

        Ok(Self {
            metadata: DataSourceMetadata {
                guid: config.guid.clone(),
                kind: ProviderKind::JsonFile,
                title: config.display_title(),
                description: config.description.clone().unwrap_or_default(),
                is_visible: config.is_visible,
            },
            client,
            feed_url,
        })
    }

    async fn load(&self) -> Result<Vec<JsonFileProject>> {
        log::info!("[data_provider:json_file] Loading project document from {}", self.feed_url);
        let request = self
            .client
            .get(&self.feed_url)
            .header("Accept", "application/json");
        let document: ProjectDocument = fetch_json(PROVIDER, request, false, Lookup::Listing).await?;
        Ok(document.into_projects())
    }
}

#[async_trait]
impl DataSourceAdaptee for JsonFileDataSource {
    fn metadata(&self) -> &DataSourceMetadata {
        &self.metadata
    }

    async fn fetch_public_projects(&self) -> Result<Vec<ProviderProject>> {
        let projects = self.load().await?;
        log::info!("[data_provider:json_file] Read {} projects", projects.len());
        Ok(projects.into_iter().map(ProviderProject::JsonFile).collect())
    }

    async fn fetch_public_project(&self, id: i64) -> Result<ProviderProject> {
        self.load()
            .await?
            .into_iter()
            .find(|project| project.id == Some(id))
            .map(ProviderProject::JsonFile)
            .ok_or_else(|| Error::ProjectNotFound {
                data_source: self.metadata.guid.clone(),
                id,
            })
    }
}
