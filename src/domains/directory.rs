//! Hostname directory.
//!
//! Maps a hostname to its owning org and verification status, behind an
//! O(1) concurrent index on the redirect hot path. Writes come only from
//! the verifier and from external domain CRUD; reads happen on every
//! request.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::info;

use crate::errors::Result;
use crate::storage::{Domain, OrgScope, Storage};
use crate::utils::normalize_hostname;

/// Directory answer for one hostname.
#[derive(Debug, Clone, Serialize)]
pub struct DomainEntry {
    pub domain_id: i64,
    pub org_id: i64,
    pub verified: bool,
    pub is_default: bool,
    pub is_active: bool,
}

/// Diagnostic DNS records, refreshed out of band for operator display.
/// Not consulted by verification.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DnsDiagnostics {
    pub cname: Vec<String>,
    pub a: Vec<IpAddr>,
    pub aaaa: Vec<IpAddr>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

pub struct DomainDirectory {
    /// The platform's own hostname, always eligible, globally scoped
    root_domain: String,
    by_hostname: DashMap<String, DomainEntry>,
    hostname_by_id: DashMap<i64, String>,
    diagnostics: DashMap<i64, DnsDiagnostics>,
}

impl DomainDirectory {
    pub fn new(root_domain: &str) -> Self {
        Self {
            root_domain: normalize_hostname(root_domain),
            by_hostname: DashMap::new(),
            hostname_by_id: DashMap::new(),
            diagnostics: DashMap::new(),
        }
    }

    /// Populate the index from storage at startup.
    pub async fn load(&self, storage: &dyn Storage) -> Result<usize> {
        let domains = storage.load_domains().await?;
        let count = domains.len();
        for domain in domains {
            self.upsert(&domain);
        }
        info!("DomainDirectory loaded {} domains", count);
        Ok(count)
    }

    pub fn lookup(&self, hostname: &str) -> Option<DomainEntry> {
        self.by_hostname
            .get(&normalize_hostname(hostname))
            .map(|e| e.clone())
    }

    /// The org scope a redirect on this hostname runs under, or `None`
    /// when no redirect may be served for it.
    pub fn scope_for(&self, hostname: &str) -> Option<OrgScope> {
        let hostname = normalize_hostname(hostname);
        if hostname == self.root_domain {
            return Some(OrgScope::Global);
        }

        let entry = self.by_hostname.get(&hostname)?;
        if entry.verified && entry.is_active {
            Some(OrgScope::Org(entry.org_id))
        } else {
            None
        }
    }

    pub fn upsert(&self, domain: &Domain) {
        let hostname = normalize_hostname(&domain.hostname);
        self.hostname_by_id.insert(domain.id, hostname.clone());
        self.by_hostname.insert(
            hostname,
            DomainEntry {
                domain_id: domain.id,
                org_id: domain.org_id,
                verified: domain.verified,
                is_default: domain.is_default,
                is_active: domain.is_active,
            },
        );
    }

    pub fn remove(&self, domain_id: i64) {
        if let Some((_, hostname)) = self.hostname_by_id.remove(&domain_id) {
            self.by_hostname.remove(&hostname);
        }
        self.diagnostics.remove(&domain_id);
    }

    /// Flip the verified flag in the index (verifier write path).
    pub fn mark_verified(&self, domain_id: i64) {
        if let Some(hostname) = self.hostname_by_id.get(&domain_id) {
            if let Some(mut entry) = self.by_hostname.get_mut(hostname.value()) {
                entry.verified = true;
            }
        }
    }

    pub fn hostname_of(&self, domain_id: i64) -> Option<String> {
        self.hostname_by_id.get(&domain_id).map(|h| h.clone())
    }

    pub fn diagnostics(&self, domain_id: i64) -> Option<DnsDiagnostics> {
        self.diagnostics.get(&domain_id).map(|d| d.clone())
    }

    pub fn set_diagnostics(&self, domain_id: i64, diagnostics: DnsDiagnostics) {
        self.diagnostics.insert(domain_id, diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(id: i64, hostname: &str, verified: bool, is_active: bool) -> Domain {
        Domain {
            id,
            org_id: 42,
            hostname: hostname.to_string(),
            is_default: false,
            is_active,
            verified,
            verification_token: "tok".into(),
            verified_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn root_domain_is_always_globally_scoped() {
        let directory = DomainDirectory::new("BL.Example");
        assert_eq!(directory.scope_for("bl.example"), Some(OrgScope::Global));
        assert_eq!(
            directory.scope_for("bl.example:8080"),
            Some(OrgScope::Global)
        );
        assert_eq!(directory.scope_for("unknown.example"), None);
    }

    #[test]
    fn only_verified_active_domains_resolve() {
        let directory = DomainDirectory::new("bl.example");
        directory.upsert(&domain(1, "go.acme.com", false, true));
        directory.upsert(&domain(2, "links.acme.com", true, true));
        directory.upsert(&domain(3, "old.acme.com", true, false));

        assert_eq!(directory.scope_for("go.acme.com"), None);
        assert_eq!(
            directory.scope_for("Links.ACME.com"),
            Some(OrgScope::Org(42))
        );
        assert_eq!(directory.scope_for("old.acme.com"), None);
    }

    #[test]
    fn mark_verified_updates_index() {
        let directory = DomainDirectory::new("bl.example");
        directory.upsert(&domain(1, "go.acme.com", false, true));
        assert_eq!(directory.scope_for("go.acme.com"), None);

        directory.mark_verified(1);
        assert_eq!(directory.scope_for("go.acme.com"), Some(OrgScope::Org(42)));

        directory.remove(1);
        assert_eq!(directory.scope_for("go.acme.com"), None);
        assert!(directory.lookup("go.acme.com").is_none());
    }
}
