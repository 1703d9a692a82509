//! Domain verification state machine.
//!
//! A domain is created `pending` and transitions to `verified` exactly
//! once, when a DNS TXT check finds `shortlink-verify=<token>` at
//! `_shortlink-verify.<domain>` or at the apex. Absent records are a
//! normal steady state while DNS propagates, never a failure; only a
//! resolver timeout is worth alerting on. The transition is reported
//! exactly once on the event channel, no matter how many checks race.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::directory::{DnsDiagnostics, DomainDirectory};
use crate::errors::{BrandlinkError, Result};
use crate::metrics_core::MetricsRecorder;
use crate::services::dns::{DnsError, DnsResolver};
use crate::storage::{Domain, Storage};

/// DNS label the TXT proof is expected under.
pub const VERIFY_LABEL: &str = "_shortlink-verify";

/// Result of one verification check. All of these are expected
/// steady-state outcomes except `CheckTimeout`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// This check performed the pending -> verified transition
    Verified,
    /// Already verified before this check ran; state untouched
    AlreadyVerified,
    /// No TXT answer yet (NXDOMAIN/NODATA) - DNS still propagating
    DnsUnresolved { reason: String },
    /// TXT records exist but none carries the expected token
    DnsMismatch { reason: String },
    /// The DNS resolver itself timed out
    CheckTimeout,
}

impl VerifyOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            VerifyOutcome::Verified => "verified",
            VerifyOutcome::AlreadyVerified => "already_verified",
            VerifyOutcome::DnsUnresolved { .. } => "dns_unresolved",
            VerifyOutcome::DnsMismatch { .. } => "dns_mismatch",
            VerifyOutcome::CheckTimeout => "check_timeout",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            VerifyOutcome::DnsUnresolved { reason } | VerifyOutcome::DnsMismatch { reason } => {
                Some(reason)
            }
            _ => None,
        }
    }
}

/// Emitted exactly once per domain, on the pending -> verified
/// transition (UI toast / webhook fan-out).
#[derive(Debug, Clone)]
pub struct DomainVerifiedEvent {
    pub domain_id: i64,
    pub org_id: i64,
    pub hostname: String,
    pub verified_at: DateTime<Utc>,
}

/// Operator-facing record of the most recent check.
#[derive(Debug, Clone)]
pub struct CheckStatus {
    pub outcome: String,
    pub reason: Option<String>,
    pub checked_at: DateTime<Utc>,
}

pub struct DomainVerifier {
    storage: Arc<dyn Storage>,
    directory: Arc<DomainDirectory>,
    dns: Arc<dyn DnsResolver>,
    metrics: Arc<dyn MetricsRecorder>,
    events: broadcast::Sender<DomainVerifiedEvent>,
    /// Per-domain check serialization; checks for different domains run
    /// independently and concurrently
    check_locks: DashMap<i64, Arc<Mutex<()>>>,
    last_status: DashMap<i64, CheckStatus>,
    dns_timeout: Duration,
}

impl DomainVerifier {
    pub fn new(
        storage: Arc<dyn Storage>,
        directory: Arc<DomainDirectory>,
        dns: Arc<dyn DnsResolver>,
        metrics: Arc<dyn MetricsRecorder>,
        dns_timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            storage,
            directory,
            dns,
            metrics,
            events,
            check_locks: DashMap::new(),
            last_status: DashMap::new(),
            dns_timeout,
        }
    }

    /// Subscribe to verification transition events.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainVerifiedEvent> {
        self.events.subscribe()
    }

    pub fn last_status(&self, domain_id: i64) -> Option<CheckStatus> {
        self.last_status.get(&domain_id).map(|s| s.clone())
    }

    /// Run one verification check for a domain. Admin "validate now" and
    /// the poller both land here; per-domain checks are serialized.
    pub async fn check_now(&self, domain_id: i64) -> Result<VerifyOutcome> {
        let lock = self
            .check_locks
            .entry(domain_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let domain = self
            .storage
            .get_domain(domain_id)
            .await?
            .ok_or_else(|| BrandlinkError::not_found(format!("domain {}", domain_id)))?;

        if domain.verified {
            return Ok(VerifyOutcome::AlreadyVerified);
        }

        let outcome = self.run_check(&domain).await;
        self.metrics.inc_verify_check(outcome.kind());
        self.last_status.insert(
            domain_id,
            CheckStatus {
                outcome: outcome.kind().to_string(),
                reason: outcome.reason().map(String::from),
                checked_at: Utc::now(),
            },
        );

        if outcome == VerifyOutcome::Verified {
            let verified_at = Utc::now();
            // Storage decides who won a racing transition
            let first = self.storage.mark_domain_verified(domain_id, verified_at).await?;
            self.directory.mark_verified(domain_id);
            if first {
                info!("Domain {} ({}) verified", domain_id, domain.hostname);
                let _ = self.events.send(DomainVerifiedEvent {
                    domain_id,
                    org_id: domain.org_id,
                    hostname: domain.hostname.clone(),
                    verified_at,
                });
            } else {
                return Ok(VerifyOutcome::AlreadyVerified);
            }
        }

        Ok(outcome)
    }

    async fn run_check(&self, domain: &Domain) -> VerifyOutcome {
        let expected = domain.expected_txt_value();
        let prefixed = format!("{}.{}", VERIFY_LABEL, domain.hostname);

        let mut records_seen = 0usize;
        let mut lookup_failure: Option<String> = None;
        // Prefixed name first, apex as fallback; a failed answer on one
        // name must not mask a valid record on the other
        for name in [prefixed.as_str(), domain.hostname.as_str()] {
            match self.lookup_txt_bounded(name).await {
                Ok(values) => {
                    records_seen += values.len();
                    if values.iter().any(|v| v.trim() == expected) {
                        return VerifyOutcome::Verified;
                    }
                }
                Err(DnsError::Timeout) => {
                    self.metrics.inc_dns_timeout();
                    warn!("DNS timeout verifying {} (query {})", domain.hostname, name);
                    return VerifyOutcome::CheckTimeout;
                }
                Err(DnsError::Resolution(msg)) => {
                    debug!("DNS resolution issue for {}: {}", name, msg);
                    lookup_failure =
                        Some(format!("DNS lookup failed for {}: {}", name, msg));
                }
            }
        }

        if records_seen > 0 {
            VerifyOutcome::DnsMismatch {
                reason: format!(
                    "{} TXT record(s) found, none matching {}",
                    records_seen, expected
                ),
            }
        } else if let Some(reason) = lookup_failure {
            VerifyOutcome::DnsUnresolved { reason }
        } else {
            VerifyOutcome::DnsUnresolved {
                reason: format!(
                    "no TXT records at {} or {} yet; DNS may still be propagating",
                    prefixed, domain.hostname
                ),
            }
        }
    }

    /// Bound a single lookup so a hung resolver cannot tie the poller up.
    async fn lookup_txt_bounded(&self, name: &str) -> std::result::Result<Vec<String>, DnsError> {
        match tokio::time::timeout(self.dns_timeout, self.dns.lookup_txt(name)).await {
            Ok(result) => result,
            Err(_) => Err(DnsError::Timeout),
        }
    }

    /// Refresh diagnostic CNAME/A/AAAA records for operator display.
    /// Purely informational; failures are ignored.
    pub async fn refresh_diagnostics(&self, domain_id: i64) {
        let Some(hostname) = self.directory.hostname_of(domain_id) else {
            return;
        };

        let cname = self.dns.lookup_cname(&hostname).await.unwrap_or_default();
        let a = self.dns.lookup_a(&hostname).await.unwrap_or_default();
        let aaaa = self.dns.lookup_aaaa(&hostname).await.unwrap_or_default();

        self.directory.set_diagnostics(
            domain_id,
            DnsDiagnostics {
                cname,
                a,
                aaaa,
                refreshed_at: Some(Utc::now()),
            },
        );
    }
}
