//! Read-optimized snapshots of a link's routing configuration.
//!
//! Every resolution hits this path, so rules and variants are cached per
//! link id in a moka cache with a short TTL. Operators expect edits to
//! take effect within seconds; the TTL is that bound, and explicit
//! invalidation hooks tighten it for write paths that know what changed.
//!
//! Invariants the admin layer should have enforced are re-checked here:
//! inactive rules and variants are dropped, as are variants with
//! non-positive weight and any destination that fails URL validation.
//! A stored `javascript:` destination must never reach a Location
//! header.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::errors::{BrandlinkError, Result};
use crate::storage::{Link, RoutingRule, RuleMatch, Storage, Variant};
use crate::utils::validate_url;

/// Rules are evaluated in ascending priority; the documented tie-break
/// for equal priorities is rule type (country before device), then
/// insertion order.
fn rule_type_rank(rule: &RuleMatch) -> u8 {
    match rule {
        RuleMatch::Country(_) => 0,
        RuleMatch::Device(_) => 1,
    }
}

#[derive(Debug)]
struct RuleBundle {
    rules: Vec<RoutingRule>,
    variants: Vec<Variant>,
}

impl RuleBundle {
    fn build(mut rules: Vec<RoutingRule>, variants: Vec<Variant>) -> Self {
        rules.retain(|r| {
            if !r.active {
                return false;
            }
            if let Err(e) = validate_url(&r.destination_url) {
                warn!("Dropping rule {} with invalid destination: {}", r.id, e);
                return false;
            }
            true
        });
        rules.sort_by_key(|r| (r.priority, rule_type_rank(&r.rule), r.position));

        let variants = variants
            .into_iter()
            .filter(|v| {
                if !v.active || v.weight == 0 {
                    return false;
                }
                if let Err(e) = validate_url(&v.url) {
                    warn!("Dropping variant {} with invalid URL: {}", v.id, e);
                    return false;
                }
                true
            })
            .collect();

        Self { rules, variants }
    }
}

/// A link's base record plus its routing snapshot.
#[derive(Clone)]
pub struct LinkRuleSet {
    pub link: Link,
    bundle: Arc<RuleBundle>,
}

impl LinkRuleSet {
    /// Active rules in evaluation order.
    pub fn rules(&self) -> &[RoutingRule] {
        &self.bundle.rules
    }

    /// Active variants with positive weight.
    pub fn variants(&self) -> &[Variant] {
        &self.bundle.variants
    }
}

pub struct RuleStore {
    storage: Arc<dyn Storage>,
    cache: Cache<i64, Arc<RuleBundle>>,
}

impl RuleStore {
    pub fn new(storage: Arc<dyn Storage>, config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.rule_ttl_secs))
            .build();

        Self { storage, cache }
    }

    /// Load the rule set for a link the caller already fetched.
    ///
    /// The link record itself stays fresh (gates read it directly); only
    /// the rules/variants snapshot is cached.
    pub async fn load(&self, link: Link) -> Result<LinkRuleSet> {
        let storage = Arc::clone(&self.storage);
        let link_id = link.id;

        let bundle = self
            .cache
            .try_get_with(link_id, async move {
                let rules = storage.get_rules(link_id).await?;
                let variants = storage.get_variants(link_id).await?;
                debug!(
                    "RuleStore: loaded link {} ({} rules, {} variants)",
                    link_id,
                    rules.len(),
                    variants.len()
                );
                Ok::<_, BrandlinkError>(Arc::new(RuleBundle::build(rules, variants)))
            })
            .await
            .map_err(|e: Arc<BrandlinkError>| e.as_ref().clone())?;

        Ok(LinkRuleSet { link, bundle })
    }

    /// Drop the cached snapshot for one link (call on any write to the
    /// link, its rules, or its variants).
    pub async fn invalidate(&self, link_id: i64) {
        self.cache.invalidate(&link_id).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
