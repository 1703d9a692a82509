//! The destination decision pipeline.
//!
//! `resolve` runs on the hot path of every redirect. The steps are
//! strictly ordered and short-circuit on the first decisive one:
//! hostname scoping, link lookup, gates (active, expiry, password),
//! deep link, routing rules, variants, primary destination. Deep links
//! outrank routing rules when enabled: they represent explicit app
//! intent, not traffic shaping.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::domains::DomainDirectory;
use crate::metrics_core::MetricsRecorder;
use crate::routing::context::RequestContext;
use crate::routing::rule_store::RuleStore;
use crate::routing::variant;
use crate::storage::{DeepLinkConfig, DeviceClass, Link, RuleMatch, Storage};
use crate::utils::password::verify_password;
use crate::utils::url_validator::validate_scheme_url;

/// Terminal result of one resolution. Errors here are per-request
/// outcomes, not retryable conditions; the boundary layer maps them to
/// responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Redirect { destination: String, link_id: i64 },
    /// Hostname unknown, unverified, or inactive
    DomainRejected,
    NotFound,
    Inactive,
    Expired,
    /// Password configured and not supplied or incorrect; no destination
    /// is leaked alongside this outcome
    PasswordRequired,
    /// Internal lookup failure; distinct from NotFound so the boundary
    /// can answer 503 instead of 404
    TemporaryError,
}

impl Outcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Redirect { .. } => "redirect",
            Outcome::DomainRejected => "domain_rejected",
            Outcome::NotFound => "not_found",
            Outcome::Inactive => "inactive",
            Outcome::Expired => "expired",
            Outcome::PasswordRequired => "password_required",
            Outcome::TemporaryError => "temporary_error",
        }
    }
}

pub struct Resolver {
    directory: Arc<DomainDirectory>,
    storage: Arc<dyn Storage>,
    rule_store: Arc<RuleStore>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl Resolver {
    pub fn new(
        directory: Arc<DomainDirectory>,
        storage: Arc<dyn Storage>,
        rule_store: Arc<RuleStore>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            directory,
            storage,
            rule_store,
            metrics,
        }
    }

    pub async fn resolve(&self, hostname: &str, code: &str, ctx: &RequestContext) -> Outcome {
        let outcome = self.resolve_inner(hostname, code, ctx).await;
        self.metrics.inc_resolution(outcome.kind());
        outcome
    }

    async fn resolve_inner(&self, hostname: &str, code: &str, ctx: &RequestContext) -> Outcome {
        // 1. Hostname scoping
        let Some(scope) = self.directory.scope_for(hostname) else {
            debug!("Rejected hostname: {}", hostname);
            return Outcome::DomainRejected;
        };

        // 2. Link lookup within scope
        let link = match self.storage.get_link(scope, code).await {
            Ok(Some(link)) => link,
            Ok(None) => return Outcome::NotFound,
            Err(e) => {
                error!("Storage error during link lookup: {}", e);
                return Outcome::TemporaryError;
            }
        };

        // 3. Gates, in order
        if !link.active {
            return Outcome::Inactive;
        }
        if link.is_expired(ctx.now) {
            return Outcome::Expired;
        }
        if let Some(ref hash) = link.password_hash {
            let supplied_ok = ctx
                .password_attempt
                .as_deref()
                .is_some_and(|attempt| verify_password(attempt, hash).unwrap_or(false));
            if !supplied_ok {
                return Outcome::PasswordRequired;
            }
        }

        // 4. Deep link outranks rules and variants
        if let Some(destination) = deep_link_destination(&link, ctx.device) {
            return Outcome::Redirect {
                destination,
                link_id: link.id,
            };
        }

        // 5/6. Rules, then variants, then primary
        let link_id = link.id;
        let set = match self.rule_store.load(link).await {
            Ok(set) => set,
            Err(e) => {
                error!("Storage error loading rule set for link {}: {}", link_id, e);
                return Outcome::TemporaryError;
            }
        };

        if let Some(rule) = set.rules().iter().find(|r| rule_matches(&r.rule, ctx)) {
            return Outcome::Redirect {
                destination: rule.destination_url.clone(),
                link_id,
            };
        }

        let destination = variant::select(set.variants(), &mut rand::rng())
            .map(|v| v.url.clone())
            .unwrap_or_else(|| set.link.original_url.clone());

        Outcome::Redirect {
            destination,
            link_id,
        }
    }
}

/// Case-insensitive exact matching; no wildcards.
fn rule_matches(rule: &RuleMatch, ctx: &RequestContext) -> bool {
    match rule {
        RuleMatch::Country(code) => ctx
            .country
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(code)),
        RuleMatch::Device(device) => ctx.device == *device,
    }
}

/// Scheme URL for the request's platform, falling back to that
/// platform's store URL. `None` (deep link disabled, other device, or
/// nothing configured for the platform) falls through to rules.
fn deep_link_destination(link: &Link, device: DeviceClass) -> Option<String> {
    let config: &DeepLinkConfig = link.deep_link.as_ref()?;
    if !config.enabled {
        return None;
    }

    let destination = match device {
        DeviceClass::Ios => config
            .ios_scheme
            .clone()
            .or_else(|| config.ios_store_url.clone()),
        DeviceClass::Android => config
            .android_scheme
            .clone()
            .or_else(|| config.android_store_url.clone()),
        DeviceClass::Other => None,
    }?;

    match validate_scheme_url(&destination) {
        Ok(()) => Some(destination),
        Err(e) => {
            warn!("Dropping invalid deep-link destination: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn base_link() -> Link {
        Link {
            id: 1,
            org_id: 1,
            code: "c".into(),
            original_url: "https://example.com/".into(),
            password_hash: None,
            deep_link: None,
            active: true,
            expires_at: None,
            created_at: Utc::now(),
            clicks: 0,
        }
    }

    #[test]
    fn deep_link_prefers_scheme_then_store() {
        let mut link = base_link();
        link.deep_link = Some(DeepLinkConfig {
            enabled: true,
            ios_scheme: Some("myapp://x".into()),
            ios_store_url: Some("https://apps.example/ios".into()),
            android_scheme: None,
            android_store_url: Some("https://play.example/app".into()),
        });

        assert_eq!(
            deep_link_destination(&link, DeviceClass::Ios).as_deref(),
            Some("myapp://x")
        );
        assert_eq!(
            deep_link_destination(&link, DeviceClass::Android).as_deref(),
            Some("https://play.example/app")
        );
        assert!(deep_link_destination(&link, DeviceClass::Other).is_none());
    }

    #[test]
    fn deep_link_disabled_or_unconfigured_falls_through() {
        let mut link = base_link();
        assert!(deep_link_destination(&link, DeviceClass::Ios).is_none());

        link.deep_link = Some(DeepLinkConfig {
            enabled: false,
            ios_scheme: Some("myapp://x".into()),
            ..DeepLinkConfig::default()
        });
        assert!(deep_link_destination(&link, DeviceClass::Ios).is_none());

        // Enabled but nothing configured for the platform
        link.deep_link = Some(DeepLinkConfig {
            enabled: true,
            ..DeepLinkConfig::default()
        });
        assert!(deep_link_destination(&link, DeviceClass::Android).is_none());
    }

    #[test]
    fn deep_link_rejects_dangerous_destination() {
        let mut link = base_link();
        link.deep_link = Some(DeepLinkConfig {
            enabled: true,
            ios_scheme: Some("javascript:alert(1)".into()),
            ..DeepLinkConfig::default()
        });
        assert!(deep_link_destination(&link, DeviceClass::Ios).is_none());
    }

    #[test]
    fn country_match_is_case_insensitive() {
        let mut ctx = RequestContext::new(Utc::now());
        ctx.country = Some("fr".into());
        assert!(rule_matches(&RuleMatch::Country("FR".into()), &ctx));
        assert!(!rule_matches(&RuleMatch::Country("US".into()), &ctx));

        ctx.country = None;
        assert!(!rule_matches(&RuleMatch::Country("FR".into()), &ctx));
    }

    #[test]
    fn device_match_is_exact() {
        let mut ctx = RequestContext::new(Utc::now());
        ctx.device = DeviceClass::Android;
        assert!(rule_matches(&RuleMatch::Device(DeviceClass::Android), &ctx));
        assert!(!rule_matches(&RuleMatch::Device(DeviceClass::Ios), &ctx));
    }
}
