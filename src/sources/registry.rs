//! Source registry: maps a [`SourceId`] to its adapter

use super::kisslove::{self, KissLove};
use super::mangakatana::{self, MangaKatana};
use super::traits::SourceAdapter;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http_client::FetchClient;
use crate::types::SourceId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The built-in sources
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// mangakatana.com
    MangaKatana,
    /// klz9.com
    KissLove,
}

impl SourceKind {
    /// Every built-in source
    pub const ALL: [SourceKind; 2] = [SourceKind::KissLove, SourceKind::MangaKatana];

    /// Registry key
    pub fn id(self) -> &'static str {
        match self {
            SourceKind::MangaKatana => mangakatana::SOURCE_ID,
            SourceKind::KissLove => kisslove::SOURCE_ID,
        }
    }

    /// Look a built-in source up by identifier
    pub fn from_id(id: &str) -> Option<Self> {
        let id = SourceId::new(id);
        Self::ALL.into_iter().find(|kind| kind.id() == id.as_str())
    }

    /// Build the adapter, honouring a configured base URL override
    pub fn build(self, fetch: FetchClient, base_url: Option<&str>) -> Arc<dyn SourceAdapter> {
        match (self, base_url) {
            (SourceKind::MangaKatana, Some(url)) => Arc::new(MangaKatana::with_base_url(fetch, url)),
            (SourceKind::MangaKatana, None) => Arc::new(MangaKatana::new(fetch)),
            (SourceKind::KissLove, Some(url)) => Arc::new(KissLove::with_base_url(fetch, url)),
            (SourceKind::KissLove, None) => Arc::new(KissLove::new(fetch)),
        }
    }
}

/// Registered adapters, keyed by source identifier
#[derive(Clone, Default)]
pub struct SourceRegistry {
    adapters: BTreeMap<SourceId, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in source, sharing one fetch client
    pub fn with_defaults(fetch: &FetchClient, config: &Config) -> Self {
        let mut registry = Self::new();
        for kind in SourceKind::ALL {
            let source_config = config.source(kind.id());
            registry.register(kind.build(fetch.clone(), source_config.base_url.as_deref()));
        }
        registry
    }

    /// Add or replace an adapter under its own identifier
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.id().clone(), adapter);
    }

    /// Adapter for `id`
    pub fn get(&self, id: &SourceId) -> Result<Arc<dyn SourceAdapter>> {
        self.adapters
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownSource(id.to_string()))
    }

    /// Adapter for the explicit source, or for `default` when none was given
    pub fn resolve(&self, explicit: Option<&SourceId>, default: &str) -> Result<Arc<dyn SourceAdapter>> {
        match explicit {
            Some(id) => self.get(id),
            None => self.get(&SourceId::new(default)),
        }
    }

    /// Registered identifiers, sorted
    pub fn list(&self) -> Vec<SourceId> {
        self.adapters.keys().cloned().collect()
    }
}
