//! JSON snapshot file storage backend.
//!
//! Loads the whole data set into memory at startup and rewrites the
//! snapshot on mutation. Suited to single-node deployments where the
//! admin layer edits the same file out of band.

use std::collections::HashMap;
use std::fs;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{ClickEvent, Domain, Link, OrgScope, RoutingRule, Storage, Variant};
use crate::errors::{BrandlinkError, Result};
use crate::utils::password::is_argon2_hash;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinkRecord {
    #[serde(flatten)]
    link: Link,
    #[serde(default)]
    rules: Vec<RoutingRule>,
    #[serde(default)]
    variants: Vec<Variant>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    links: Vec<LinkRecord>,
    #[serde(default)]
    domains: Vec<Domain>,
    #[serde(default)]
    click_events: Vec<ClickEvent>,
}

#[derive(Default)]
struct Inner {
    links: HashMap<String, LinkRecord>,
    domains: HashMap<i64, Domain>,
    click_events: Vec<ClickEvent>,
}

pub struct FileStorage {
    file_path: String,
    inner: RwLock<Inner>,
}

impl FileStorage {
    pub fn new(file_path: &str) -> Result<Self> {
        let storage = FileStorage {
            file_path: file_path.to_string(),
            inner: RwLock::new(Inner::default()),
        };

        let snapshot = storage.load_snapshot()?;
        {
            let mut inner = storage.inner.write();
            for record in snapshot.links {
                if let Some(ref hash) = record.link.password_hash {
                    if !is_argon2_hash(hash) {
                        warn!(
                            "Link {} has a malformed password hash; it will never unlock",
                            record.link.code
                        );
                    }
                }
                inner.links.insert(record.link.code.clone(), record);
            }
            for domain in snapshot.domains {
                inner.domains.insert(domain.id, domain);
            }
            inner.click_events = snapshot.click_events;
            info!(
                "FileStorage initialized with {} links, {} domains",
                inner.links.len(),
                inner.domains.len()
            );
        }

        Ok(storage)
    }

    fn load_snapshot(&self) -> Result<Snapshot> {
        match fs::read_to_string(&self.file_path) {
            Ok(content) => serde_json::from_str::<Snapshot>(&content).map_err(|e| {
                BrandlinkError::serialization(format!("Failed to parse data file: {}", e))
            }),
            Err(_) => {
                info!("Data file missing, creating empty snapshot: {}", self.file_path);
                let empty = serde_json::to_string_pretty(&Snapshot::default())?;
                fs::write(&self.file_path, empty).map_err(|e| {
                    BrandlinkError::file_operation(format!("Failed to create data file: {}", e))
                })?;
                Ok(Snapshot::default())
            }
        }
    }

    fn save(&self, inner: &Inner) -> Result<()> {
        let snapshot = Snapshot {
            links: inner.links.values().cloned().collect(),
            domains: inner.domains.values().cloned().collect(),
            click_events: inner.click_events.clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(&self.file_path, json)?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_link(&self, scope: OrgScope, code: &str) -> Result<Option<Link>> {
        let inner = self.inner.read();
        let link = match inner.links.get(code) {
            Some(record) => record.link.clone(),
            None => return Ok(None),
        };

        match scope {
            OrgScope::Global => Ok(Some(link)),
            OrgScope::Org(org_id) if link.org_id == org_id => Ok(Some(link)),
            OrgScope::Org(_) => Ok(None),
        }
    }

    async fn get_rules(&self, link_id: i64) -> Result<Vec<RoutingRule>> {
        let inner = self.inner.read();
        Ok(inner
            .links
            .values()
            .find(|r| r.link.id == link_id)
            .map(|r| r.rules.clone())
            .unwrap_or_default())
    }

    async fn get_variants(&self, link_id: i64) -> Result<Vec<Variant>> {
        let inner = self.inner.read();
        Ok(inner
            .links
            .values()
            .find(|r| r.link.id == link_id)
            .map(|r| r.variants.clone())
            .unwrap_or_default())
    }

    async fn get_domain(&self, domain_id: i64) -> Result<Option<Domain>> {
        Ok(self.inner.read().domains.get(&domain_id).cloned())
    }

    async fn load_domains(&self) -> Result<Vec<Domain>> {
        Ok(self.inner.read().domains.values().cloned().collect())
    }

    async fn mark_domain_verified(&self, domain_id: i64, at: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.write();
        let domain = inner
            .domains
            .get_mut(&domain_id)
            .ok_or_else(|| BrandlinkError::not_found(format!("domain {}", domain_id)))?;

        if domain.verified {
            return Ok(false);
        }
        domain.verified = true;
        domain.verified_at = Some(at);
        self.save(&inner)?;
        Ok(true)
    }

    async fn flush_clicks(&self, updates: Vec<(i64, u64)>) -> Result<()> {
        let mut inner = self.inner.write();
        for (link_id, delta) in updates {
            if let Some(record) = inner.links.values_mut().find(|r| r.link.id == link_id) {
                record.link.clicks += delta;
            } else {
                debug!("Dropping click delta for unknown link id {}", link_id);
            }
        }
        self.save(&inner)
    }

    async fn append_click_events(&self, events: Vec<ClickEvent>) -> Result<()> {
        let mut inner = self.inner.write();
        inner.click_events.extend(events);
        self.save(&inner)
    }

    async fn backend_name(&self) -> String {
        "file".to_string()
    }
}
