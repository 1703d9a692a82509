//! In-memory storage backend.
//!
//! Default backend and the one the test suite runs against. Links are
//! indexed by short code; rules and variants by link id. Click events
//! accumulate in an append-only log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use super::{ClickEvent, Domain, Link, OrgScope, RoutingRule, Storage, Variant};
use crate::errors::{BrandlinkError, Result};

#[derive(Default)]
pub struct MemoryStorage {
    links: DashMap<String, Link>,
    rules: DashMap<i64, Vec<RoutingRule>>,
    variants: DashMap<i64, Vec<Variant>>,
    domains: DashMap<i64, Domain>,
    click_events: RwLock<Vec<ClickEvent>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a link together with its rules and variants (admin-layer
    /// stand-in for tests and standalone runs).
    pub fn put_link(&self, link: Link, rules: Vec<RoutingRule>, variants: Vec<Variant>) {
        self.rules.insert(link.id, rules);
        self.variants.insert(link.id, variants);
        self.links.insert(link.code.clone(), link);
    }

    pub fn put_domain(&self, domain: Domain) {
        self.domains.insert(domain.id, domain);
    }

    pub fn remove_link(&self, code: &str) {
        if let Some((_, link)) = self.links.remove(code) {
            self.rules.remove(&link.id);
            self.variants.remove(&link.id);
        }
    }

    /// Total clicks recorded for a code (test observability).
    pub fn clicks_for(&self, code: &str) -> u64 {
        self.links.get(code).map(|l| l.clicks).unwrap_or(0)
    }

    pub fn click_event_count(&self) -> usize {
        self.click_events.read().len()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_link(&self, scope: OrgScope, code: &str) -> Result<Option<Link>> {
        let link = match self.links.get(code) {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };

        match scope {
            OrgScope::Global => Ok(Some(link)),
            OrgScope::Org(org_id) if link.org_id == org_id => Ok(Some(link)),
            OrgScope::Org(_) => Ok(None),
        }
    }

    async fn get_rules(&self, link_id: i64) -> Result<Vec<RoutingRule>> {
        Ok(self.rules.get(&link_id).map(|r| r.clone()).unwrap_or_default())
    }

    async fn get_variants(&self, link_id: i64) -> Result<Vec<Variant>> {
        Ok(self
            .variants
            .get(&link_id)
            .map(|v| v.clone())
            .unwrap_or_default())
    }

    async fn get_domain(&self, domain_id: i64) -> Result<Option<Domain>> {
        Ok(self.domains.get(&domain_id).map(|d| d.clone()))
    }

    async fn load_domains(&self) -> Result<Vec<Domain>> {
        Ok(self.domains.iter().map(|d| d.clone()).collect())
    }

    async fn mark_domain_verified(&self, domain_id: i64, at: DateTime<Utc>) -> Result<bool> {
        let mut entry = self
            .domains
            .get_mut(&domain_id)
            .ok_or_else(|| BrandlinkError::not_found(format!("domain {}", domain_id)))?;

        if entry.verified {
            return Ok(false);
        }
        entry.verified = true;
        entry.verified_at = Some(at);
        Ok(true)
    }

    async fn flush_clicks(&self, updates: Vec<(i64, u64)>) -> Result<()> {
        for (link_id, delta) in updates {
            // Code-keyed index, so scan for the id; flush batches are small
            if let Some(mut entry) = self
                .links
                .iter_mut()
                .find(|entry| entry.value().id == link_id)
            {
                entry.value_mut().clicks += delta;
            } else {
                debug!("Dropping click delta for unknown link id {}", link_id);
            }
        }
        Ok(())
    }

    async fn append_click_events(&self, events: Vec<ClickEvent>) -> Result<()> {
        self.click_events.write().extend(events);
        Ok(())
    }

    async fn backend_name(&self) -> String {
        "memory".to_string()
    }
}
