//! Data Source Registry
//!
//! Holds the configured data sources keyed by GUID and hands out
//! consistent snapshots to concurrent readers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use reqwest::Client;

use super::http::build_client;
use super::{DataSource, GitHubDataSource, GitLabDataSource, JsonFileDataSource};
use crate::config::{DataProvidersConfig, DataSourceConfig, ProviderKind};
use crate::error::{Error, Result};

/// Lookup of configured data sources
pub trait DataProviderLoader: Send + Sync {
    /// The source registered under `guid`, if any
    fn get_data_source_by_guid(&self, guid: &str) -> Option<DataSource>;

    /// All registered sources, in configuration order
    ///
    /// The returned vector is a snapshot; later reloads do not change it.
    fn get_all_data_sources(&self) -> Vec<DataSource>;
}

/// Build the adaptee for one source config
pub fn build_data_source(config: &DataSourceConfig, client: Client) -> Result<DataSource> {
    config.validate()?;

    let source = match config.kind {
        ProviderKind::GitHub => DataSource::Authorized(Arc::new(GitHubDataSource::new(config, client)?)),
        ProviderKind::GitLab => DataSource::Authorized(Arc::new(GitLabDataSource::new(config, client)?)),
        ProviderKind::JsonFile => DataSource::Public(Arc::new(JsonFileDataSource::new(config, client)?)),
    };
    Ok(source)
}

/// Immutable view of the registry at one point in time
#[derive(Debug, Default)]
struct Snapshot {
    sources: Vec<DataSource>,
    by_guid: HashMap<String, usize>,
}

impl Snapshot {
    fn new(sources: Vec<DataSource>) -> Result<Self> {
        let mut by_guid = HashMap::with_capacity(sources.len());
        for (index, source) in sources.iter().enumerate() {
            if by_guid.insert(source.guid().to_string(), index).is_some() {
                return Err(Error::config(format!(
                    "Duplicate data source guid: {}",
                    source.guid()
                )));
            }
        }
        Ok(Self { sources, by_guid })
    }

    fn get(&self, guid: &str) -> Option<&DataSource> {
        self.by_guid.get(guid).map(|&index| &self.sources[index])
    }
}

/// In-memory registry of data sources
///
/// Readers clone the current snapshot `Arc` and release the lock at once;
/// [`DataSourceRegistry::reload`] swaps in a fully built replacement.
#[derive(Debug, Default)]
pub struct DataSourceRegistry {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl DataSourceRegistry {
    /// Build a registry from configuration
    pub fn from_config(config: &DataProvidersConfig) -> Result<Self> {
        let snapshot = build_snapshot(config)?;
        log::info!("[registry] Registered {} data source(s)", snapshot.sources.len());
        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Build a registry from already constructed sources
    pub fn from_sources(sources: Vec<DataSource>) -> Result<Self> {
        Ok(Self {
            snapshot: RwLock::new(Arc::new(Snapshot::new(sources)?)),
        })
    }

    /// Replace all sources with those of `config`
    ///
    /// On error the current sources stay registered.
    pub fn reload(&self, config: &DataProvidersConfig) -> Result<()> {
        let snapshot = Arc::new(build_snapshot(config)?);
        let count = snapshot.sources.len();

        let mut current = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = snapshot;

        log::info!("[registry] Reloaded {} data source(s)", count);
        Ok(())
    }

    /// Number of registered sources
    pub fn len(&self) -> usize {
        self.current().sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn build_snapshot(config: &DataProvidersConfig) -> Result<Snapshot> {
    config.validate()?;
    let client = build_client(config)?;
    let sources = config
        .data_sources
        .iter()
        .map(|source| build_data_source(source, client.clone()))
        .collect::<Result<Vec<_>>>()?;
    Snapshot::new(sources)
}

impl DataProviderLoader for DataSourceRegistry {
    fn get_data_source_by_guid(&self, guid: &str) -> Option<DataSource> {
        self.current().get(guid).cloned()
    }

    fn get_all_data_sources(&self) -> Vec<DataSource> {
        self.current().sources.clone()
    }
}
