//! Storage backends and data access.
//!
//! The engine reads records produced by the external admin layer through
//! the `Storage` trait. Two backends ship with the core: an in-memory
//! store (default, also used by tests) and a JSON snapshot file store.
//! A relational backend belongs to the excluded admin/CRUD layer.

pub mod file;
pub mod memory;
pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use models::{
    ClickEvent, ClickGeo, DeepLinkConfig, DeviceClass, Domain, Link, RoutingRule, RuleMatch,
    Variant,
};

use crate::config::get_config;
use crate::errors::Result;

/// Org scope a lookup runs under. The platform root domain resolves
/// globally; custom domains resolve within their owning org.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgScope {
    Global,
    Org(i64),
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Look up a link by short code within an org scope.
    async fn get_link(&self, scope: OrgScope, code: &str) -> Result<Option<Link>>;

    /// All routing rules of a link, active or not, in insertion order.
    async fn get_rules(&self, link_id: i64) -> Result<Vec<RoutingRule>>;

    /// All variants of a link, active or not, in insertion order.
    async fn get_variants(&self, link_id: i64) -> Result<Vec<Variant>>;

    async fn get_domain(&self, domain_id: i64) -> Result<Option<Domain>>;
    async fn load_domains(&self) -> Result<Vec<Domain>>;

    /// First successful call returns `true`; a repeat on an already
    /// verified domain returns `false`. The exactly-once verification
    /// event hangs off this distinction.
    async fn mark_domain_verified(&self, domain_id: i64, at: DateTime<Utc>) -> Result<bool>;

    /// Apply buffered click-counter deltas.
    async fn flush_clicks(&self, updates: Vec<(i64, u64)>) -> Result<()>;

    /// Append click telemetry facts; never mutated afterwards.
    async fn append_click_events(&self, events: Vec<ClickEvent>) -> Result<()>;

    async fn backend_name(&self) -> String;
}

pub struct StorageFactory;

impl StorageFactory {
    pub async fn create() -> Result<Arc<dyn Storage>> {
        let config = get_config();

        let boxed: Box<dyn Storage> = match config.storage.backend.as_str() {
            "file" => Box::new(file::FileStorage::new(&config.storage.data_file)?),
            _ => Box::new(memory::MemoryStorage::new()),
        };

        Ok(Arc::from(boxed))
    }
}
