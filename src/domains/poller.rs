//! Verification poll scheduler.
//!
//! One scheduled entry per pending domain, keyed by domain id in an
//! explicit table; cancellation is removal from the table. The cadence
//! is adaptive: a fast interval while the domain is young (owners
//! usually add the TXT record right away and DNS propagates within
//! minutes), a slow interval after that window. Polling stops on its own
//! once the domain verifies.
//!
//! A secondary, less frequent job refreshes diagnostic DNS records,
//! rate-limited per domain so operators can hammer the status page
//! without us hammering resolvers.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use tokio::time::{Duration, interval};
use tracing::{debug, info};

use super::verifier::{DomainVerifier, VerifyOutcome};
use crate::config::VerifierConfig;
use crate::storage::{Domain, Storage};

/// Scheduler tick; fine-grained enough for the fast interval.
const TICK_SECS: u64 = 5;

#[derive(Debug, Clone)]
struct PollState {
    created_at: DateTime<Utc>,
    next_due: DateTime<Utc>,
}

pub struct VerificationPoller {
    verifier: Arc<DomainVerifier>,
    config: VerifierConfig,
    schedule: DashMap<i64, PollState>,
    diag_refreshed: DashMap<i64, DateTime<Utc>>,
}

impl VerificationPoller {
    pub fn new(verifier: Arc<DomainVerifier>, config: VerifierConfig) -> Self {
        Self {
            verifier,
            config,
            schedule: DashMap::new(),
            diag_refreshed: DashMap::new(),
        }
    }

    /// Seed the schedule with every pending domain at startup.
    pub async fn seed(&self, storage: &dyn Storage) -> crate::errors::Result<usize> {
        let mut count = 0;
        for domain in storage.load_domains().await? {
            if !domain.verified && domain.is_active {
                self.track(&domain);
                count += 1;
            }
        }
        info!("VerificationPoller tracking {} pending domains", count);
        Ok(count)
    }

    /// Start polling a newly created pending domain. First check runs on
    /// the next tick; domain owners get fast feedback.
    pub fn track(&self, domain: &Domain) {
        self.schedule.insert(
            domain.id,
            PollState {
                created_at: domain.created_at,
                next_due: Utc::now(),
            },
        );
    }

    /// Stop polling a domain (verified, or removed by admin action).
    pub fn untrack(&self, domain_id: i64) {
        self.schedule.remove(&domain_id);
    }

    pub fn is_tracked(&self, domain_id: i64) -> bool {
        self.schedule.contains_key(&domain_id)
    }

    /// An admin-triggered check just ran: push the next automatic poll
    /// out by a full interval. Does not cancel an in-flight check.
    pub fn reset_timer(&self, domain_id: i64) {
        if let Some(mut state) = self.schedule.get_mut(&domain_id) {
            let interval = self.interval_for(state.created_at);
            state.next_due = Utc::now() + interval;
        }
    }

    fn interval_for(&self, created_at: DateTime<Utc>) -> ChronoDuration {
        let age = Utc::now() - created_at;
        if age < ChronoDuration::seconds(self.config.fast_window_secs as i64) {
            ChronoDuration::seconds(self.config.fast_interval_secs as i64)
        } else {
            ChronoDuration::seconds(self.config.slow_interval_secs as i64)
        }
    }

    /// Run one scheduler pass: fire checks for every due domain.
    /// Cross-domain checks run concurrently; the verifier serializes
    /// per-domain.
    pub async fn poll_due(self: &Arc<Self>) {
        let now = Utc::now();
        let due: Vec<i64> = self
            .schedule
            .iter()
            .filter(|entry| entry.value().next_due <= now)
            .map(|entry| *entry.key())
            .collect();

        for domain_id in due {
            // Timer advances before the check so a slow check cannot
            // stack a second one
            if let Some(mut state) = self.schedule.get_mut(&domain_id) {
                let interval = self.interval_for(state.created_at);
                state.next_due = now + interval;
            }

            let poller = Arc::clone(self);
            tokio::spawn(async move {
                match poller.verifier.check_now(domain_id).await {
                    Ok(VerifyOutcome::Verified) | Ok(VerifyOutcome::AlreadyVerified) => {
                        poller.untrack(domain_id);
                    }
                    Ok(outcome) => {
                        // Pending propagation is steady state, not a failure
                        debug!(
                            "Domain {} still pending: {} ({})",
                            domain_id,
                            outcome.kind(),
                            outcome.reason().unwrap_or("")
                        );
                    }
                    Err(e) => {
                        debug!("Verification check for domain {} errored: {}", domain_id, e);
                    }
                }
            });
        }
    }

    /// Main poll loop; spawn once at startup.
    pub async fn run(self: Arc<Self>) {
        let mut tick = interval(Duration::from_secs(TICK_SECS));
        loop {
            tick.tick().await;
            self.poll_due().await;
        }
    }

    /// One diagnostics pass: refresh DNS info for every known domain not
    /// refreshed within the spacing window.
    pub async fn refresh_diagnostics_pass(&self, storage: &dyn Storage) {
        let Ok(domains) = storage.load_domains().await else {
            return;
        };

        let spacing = ChronoDuration::seconds(self.config.diagnostics_min_spacing_secs as i64);
        let now = Utc::now();

        for domain in domains {
            let fresh = self
                .diag_refreshed
                .get(&domain.id)
                .is_some_and(|at| now - *at < spacing);
            if fresh {
                continue;
            }
            self.diag_refreshed.insert(domain.id, now);
            self.verifier.refresh_diagnostics(domain.id).await;
        }
    }

    /// Diagnostics refresh loop; spawn once at startup.
    pub async fn run_diagnostics(self: Arc<Self>, storage: Arc<dyn Storage>) {
        let mut tick = interval(Duration::from_secs(self.config.diagnostics_interval_secs));
        loop {
            tick.tick().await;
            self.refresh_diagnostics_pass(storage.as_ref()).await;
        }
    }
}
