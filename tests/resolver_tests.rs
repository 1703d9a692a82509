//! Resolution pipeline tests.
//!
//! Covers the gate ordering, rule precedence, deep-link precedence,
//! variant fallback, and failure semantics of the resolver.

use std::sync::Arc;

use chrono::{Duration, Utc};

use brandlink::config::CacheConfig;
use brandlink::domains::DomainDirectory;
use brandlink::errors::{BrandlinkError, Result};
use brandlink::metrics_core::NoopMetrics;
use brandlink::routing::{Outcome, RequestContext, Resolver, RuleStore};
use brandlink::storage::memory::MemoryStorage;
use brandlink::storage::{
    ClickEvent, DeepLinkConfig, DeviceClass, Domain, Link, OrgScope, RoutingRule, RuleMatch,
    Storage, Variant,
};
use brandlink::utils::password::hash_password;

// =============================================================================
// Test Setup
// =============================================================================

const ROOT: &str = "bl.example";

fn link(id: i64, org_id: i64, code: &str) -> Link {
    Link {
        id,
        org_id,
        code: code.to_string(),
        original_url: "https://a.example/".to_string(),
        password_hash: None,
        deep_link: None,
        active: true,
        expires_at: None,
        created_at: Utc::now(),
        clicks: 0,
    }
}

fn country_rule(id: i64, link_id: i64, country: &str, priority: i32, dest: &str) -> RoutingRule {
    RoutingRule {
        id,
        link_id,
        rule: RuleMatch::Country(country.to_string()),
        destination_url: dest.to_string(),
        priority,
        active: true,
        position: id as i32,
    }
}

fn verified_domain(id: i64, org_id: i64, hostname: &str) -> Domain {
    Domain {
        id,
        org_id,
        hostname: hostname.to_string(),
        is_default: false,
        is_active: true,
        verified: true,
        verification_token: "tok".to_string(),
        verified_at: Some(Utc::now()),
        created_at: Utc::now(),
    }
}

struct Engine {
    storage: Arc<MemoryStorage>,
    directory: Arc<DomainDirectory>,
    resolver: Resolver,
}

fn engine() -> Engine {
    let storage = Arc::new(MemoryStorage::new());
    let directory = Arc::new(DomainDirectory::new(ROOT));
    let dyn_storage: Arc<dyn Storage> = storage.clone();
    let rule_store = Arc::new(RuleStore::new(dyn_storage.clone(), &CacheConfig::default()));
    let resolver = Resolver::new(
        directory.clone(),
        dyn_storage,
        rule_store,
        NoopMetrics::arc(),
    );
    Engine {
        storage,
        directory,
        resolver,
    }
}

fn ctx() -> RequestContext {
    RequestContext::new(Utc::now())
}

fn redirect_destination(outcome: Outcome) -> String {
    match outcome {
        Outcome::Redirect { destination, .. } => destination,
        other => panic!("expected redirect, got {:?}", other),
    }
}

// =============================================================================
// Hostname scoping
// =============================================================================

#[tokio::test]
async fn unknown_hostname_is_rejected() {
    let engine = engine();
    engine.storage.put_link(link(1, 1, "promo"), vec![], vec![]);

    let outcome = engine
        .resolver
        .resolve("unknown.example", "promo", &ctx())
        .await;
    assert_eq!(outcome, Outcome::DomainRejected);
}

#[tokio::test]
async fn unverified_hostname_is_rejected() {
    let engine = engine();
    let mut domain = verified_domain(1, 1, "go.acme.com");
    domain.verified = false;
    engine.storage.put_domain(domain.clone());
    engine.directory.upsert(&domain);
    engine.storage.put_link(link(1, 1, "promo"), vec![], vec![]);

    let outcome = engine.resolver.resolve("go.acme.com", "promo", &ctx()).await;
    assert_eq!(outcome, Outcome::DomainRejected);
}

#[tokio::test]
async fn root_domain_resolves_any_org() {
    let engine = engine();
    engine.storage.put_link(link(1, 7, "promo"), vec![], vec![]);

    let outcome = engine.resolver.resolve(ROOT, "promo", &ctx()).await;
    assert_eq!(redirect_destination(outcome), "https://a.example/");
}

#[tokio::test]
async fn custom_domain_scopes_to_owning_org() {
    let engine = engine();
    let domain = verified_domain(1, 7, "go.acme.com");
    engine.storage.put_domain(domain.clone());
    engine.directory.upsert(&domain);

    engine.storage.put_link(link(1, 7, "mine"), vec![], vec![]);
    engine.storage.put_link(link(2, 8, "theirs"), vec![], vec![]);

    let outcome = engine.resolver.resolve("go.acme.com", "mine", &ctx()).await;
    assert!(matches!(outcome, Outcome::Redirect { .. }));

    // Another org's code does not exist on this domain
    let outcome = engine.resolver.resolve("go.acme.com", "theirs", &ctx()).await;
    assert_eq!(outcome, Outcome::NotFound);
}

#[tokio::test]
async fn removed_link_resolves_to_not_found() {
    let engine = engine();
    engine.storage.put_link(link(1, 1, "promo"), vec![], vec![]);

    let outcome = engine.resolver.resolve(ROOT, "promo", &ctx()).await;
    assert!(matches!(outcome, Outcome::Redirect { .. }));

    engine.storage.remove_link("promo");
    let outcome = engine.resolver.resolve(ROOT, "promo", &ctx()).await;
    assert_eq!(outcome, Outcome::NotFound);
}

// =============================================================================
// Gates
// =============================================================================

#[tokio::test]
async fn inactive_link_always_yields_inactive() {
    let engine = engine();
    let mut l = link(1, 1, "promo");
    l.active = false;
    engine.storage.put_link(
        l,
        vec![country_rule(1, 1, "FR", 10, "https://fr.example/")],
        vec![Variant {
            id: 1,
            link_id: 1,
            url: "https://x.example/".into(),
            weight: 100,
            active: true,
            position: 0,
        }],
    );

    let mut request = ctx();
    request.country = Some("FR".into());
    let outcome = engine.resolver.resolve(ROOT, "promo", &request).await;
    assert_eq!(outcome, Outcome::Inactive);
}

#[tokio::test]
async fn expired_link_yields_expired_even_if_gates_pass() {
    let engine = engine();
    let mut l = link(1, 1, "promo");
    l.expires_at = Some(Utc::now() - Duration::hours(1));
    engine.storage.put_link(
        l,
        vec![country_rule(1, 1, "FR", 10, "https://fr.example/")],
        vec![],
    );

    let mut request = ctx();
    request.country = Some("FR".into());
    let outcome = engine.resolver.resolve(ROOT, "promo", &request).await;
    assert_eq!(outcome, Outcome::Expired);
}

#[tokio::test]
async fn password_gate_never_leaks_destination() {
    let engine = engine();
    let mut l = link(1, 1, "promo");
    l.password_hash = Some(hash_password("s3cret").unwrap());
    engine.storage.put_link(l, vec![], vec![]);

    // No attempt
    let outcome = engine.resolver.resolve(ROOT, "promo", &ctx()).await;
    assert_eq!(outcome, Outcome::PasswordRequired);

    // Wrong attempt
    let mut request = ctx();
    request.password_attempt = Some("wrong".into());
    let outcome = engine.resolver.resolve(ROOT, "promo", &request).await;
    assert_eq!(outcome, Outcome::PasswordRequired);

    // Correct attempt
    let mut request = ctx();
    request.password_attempt = Some("s3cret".into());
    let outcome = engine.resolver.resolve(ROOT, "promo", &request).await;
    assert_eq!(redirect_destination(outcome), "https://a.example/");
}

// =============================================================================
// Rule precedence
// =============================================================================

#[tokio::test]
async fn lower_priority_number_wins() {
    let engine = engine();
    engine.storage.put_link(
        link(1, 1, "promo"),
        vec![
            country_rule(2, 1, "FR", 20, "https://b.example/"),
            country_rule(1, 1, "FR", 10, "https://fr.example/"),
        ],
        vec![],
    );

    let mut request = ctx();
    request.country = Some("FR".into());
    let outcome = engine.resolver.resolve(ROOT, "promo", &request).await;
    assert_eq!(redirect_destination(outcome), "https://fr.example/");
}

#[tokio::test]
async fn promo1_scenario_fr_hits_rule_us_falls_through() {
    let engine = engine();
    engine.storage.put_link(
        link(1, 1, "promo1"),
        vec![country_rule(1, 1, "FR", 10, "https://fr.example/")],
        vec![],
    );

    let mut fr = ctx();
    fr.country = Some("FR".into());
    let outcome = engine.resolver.resolve(ROOT, "promo1", &fr).await;
    assert_eq!(redirect_destination(outcome), "https://fr.example/");

    let mut us = ctx();
    us.country = Some("US".into());
    let outcome = engine.resolver.resolve(ROOT, "promo1", &us).await;
    assert_eq!(redirect_destination(outcome), "https://a.example/");
}

#[tokio::test]
async fn device_rule_matches_classification() {
    let engine = engine();
    engine.storage.put_link(
        link(1, 1, "promo"),
        vec![RoutingRule {
            id: 1,
            link_id: 1,
            rule: RuleMatch::Device(DeviceClass::Android),
            destination_url: "https://android.example/".into(),
            priority: 10,
            active: true,
            position: 0,
        }],
        vec![],
    );

    let mut request = ctx();
    request.device = DeviceClass::Android;
    let outcome = engine.resolver.resolve(ROOT, "promo", &request).await;
    assert_eq!(redirect_destination(outcome), "https://android.example/");

    let outcome = engine.resolver.resolve(ROOT, "promo", &ctx()).await;
    assert_eq!(redirect_destination(outcome), "https://a.example/");
}

// =============================================================================
// Deep links
// =============================================================================

fn deep_linked(mut l: Link) -> Link {
    l.deep_link = Some(DeepLinkConfig {
        enabled: true,
        ios_scheme: Some("myapp://home".into()),
        ios_store_url: Some("https://apps.example/ios".into()),
        android_scheme: None,
        android_store_url: Some("https://play.example/app".into()),
    });
    l
}

#[tokio::test]
async fn deep_link_outranks_country_rules() {
    let engine = engine();
    engine.storage.put_link(
        deep_linked(link(1, 1, "promo")),
        vec![country_rule(1, 1, "FR", 10, "https://fr.example/")],
        vec![],
    );

    let mut request = ctx();
    request.device = DeviceClass::Ios;
    request.country = Some("FR".into());
    let outcome = engine.resolver.resolve(ROOT, "promo", &request).await;
    assert_eq!(redirect_destination(outcome), "myapp://home");
}

#[tokio::test]
async fn deep_link_store_fallback_when_no_scheme() {
    let engine = engine();
    engine
        .storage
        .put_link(deep_linked(link(1, 1, "promo")), vec![], vec![]);

    let mut request = ctx();
    request.device = DeviceClass::Android;
    let outcome = engine.resolver.resolve(ROOT, "promo", &request).await;
    assert_eq!(redirect_destination(outcome), "https://play.example/app");
}

#[tokio::test]
async fn deep_link_ignored_for_other_devices() {
    let engine = engine();
    engine.storage.put_link(
        deep_linked(link(1, 1, "promo")),
        vec![country_rule(1, 1, "FR", 10, "https://fr.example/")],
        vec![],
    );

    let mut request = ctx();
    request.country = Some("FR".into());
    let outcome = engine.resolver.resolve(ROOT, "promo", &request).await;
    assert_eq!(redirect_destination(outcome), "https://fr.example/");
}

// =============================================================================
// Variants and fallback
// =============================================================================

#[tokio::test]
async fn zero_active_variants_fall_back_to_original_url() {
    let engine = engine();
    engine.storage.put_link(
        link(1, 1, "promo"),
        vec![],
        vec![
            Variant {
                id: 1,
                link_id: 1,
                url: "https://x.example/".into(),
                weight: 50,
                active: false,
                position: 0,
            },
            Variant {
                id: 2,
                link_id: 1,
                url: "https://y.example/".into(),
                weight: 0,
                active: true,
                position: 1,
            },
        ],
    );

    let outcome = engine.resolver.resolve(ROOT, "promo", &ctx()).await;
    assert_eq!(redirect_destination(outcome), "https://a.example/");
}

#[tokio::test]
async fn variants_only_consulted_when_no_rule_matches() {
    let engine = engine();
    engine.storage.put_link(
        link(1, 1, "promo"),
        vec![country_rule(1, 1, "DE", 10, "https://de.example/")],
        vec![Variant {
            id: 1,
            link_id: 1,
            url: "https://variant.example/".into(),
            weight: 100,
            active: true,
            position: 0,
        }],
    );

    let mut request = ctx();
    request.country = Some("DE".into());
    let outcome = engine.resolver.resolve(ROOT, "promo", &request).await;
    assert_eq!(redirect_destination(outcome), "https://de.example/");

    request.country = Some("US".into());
    let outcome = engine.resolver.resolve(ROOT, "promo", &request).await;
    assert_eq!(redirect_destination(outcome), "https://variant.example/");
}

// =============================================================================
// Failure semantics
// =============================================================================

struct FailingStorage;

#[async_trait::async_trait]
impl Storage for FailingStorage {
    async fn get_link(&self, _scope: OrgScope, _code: &str) -> Result<Option<Link>> {
        Err(BrandlinkError::storage_operation("backend unavailable"))
    }

    async fn get_rules(&self, _link_id: i64) -> Result<Vec<RoutingRule>> {
        Err(BrandlinkError::storage_operation("backend unavailable"))
    }

    async fn get_variants(&self, _link_id: i64) -> Result<Vec<Variant>> {
        Err(BrandlinkError::storage_operation("backend unavailable"))
    }

    async fn get_domain(&self, _domain_id: i64) -> Result<Option<Domain>> {
        Err(BrandlinkError::storage_operation("backend unavailable"))
    }

    async fn load_domains(&self) -> Result<Vec<Domain>> {
        Ok(vec![])
    }

    async fn mark_domain_verified(
        &self,
        _domain_id: i64,
        _at: chrono::DateTime<Utc>,
    ) -> Result<bool> {
        Err(BrandlinkError::storage_operation("backend unavailable"))
    }

    async fn flush_clicks(&self, _updates: Vec<(i64, u64)>) -> Result<()> {
        Err(BrandlinkError::storage_operation("backend unavailable"))
    }

    async fn append_click_events(&self, _events: Vec<ClickEvent>) -> Result<()> {
        Err(BrandlinkError::storage_operation("backend unavailable"))
    }

    async fn backend_name(&self) -> String {
        "failing".to_string()
    }
}

#[tokio::test]
async fn store_failure_degrades_to_temporary_error_not_not_found() {
    let storage: Arc<dyn Storage> = Arc::new(FailingStorage);
    let directory = Arc::new(DomainDirectory::new(ROOT));
    let rule_store = Arc::new(RuleStore::new(storage.clone(), &CacheConfig::default()));
    let resolver = Resolver::new(directory, storage, rule_store, NoopMetrics::arc());

    let outcome = resolver.resolve(ROOT, "promo", &ctx()).await;
    assert_eq!(outcome, Outcome::TemporaryError);
}
