//! Core data model: links, routing rules, variants, domains, click events.
//!
//! Records are produced by the external admin/CRUD layer; the engine only
//! reads them and must re-validate invariants defensively at read time
//! (see `routing::rule_store`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device classification derived from the request User-Agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Ios,
    Android,
    Other,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Ios => "ios",
            DeviceClass::Android => "android",
            DeviceClass::Other => "other",
        }
    }
}

impl std::str::FromStr for DeviceClass {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ios" => Ok(DeviceClass::Ios),
            "android" => Ok(DeviceClass::Android),
            "other" => Ok(DeviceClass::Other),
            _ => Err(()),
        }
    }
}

/// Deep-link configuration for opening native mobile apps.
///
/// Scheme URLs open the app directly; store URLs are the per-platform
/// fallback when the app is not installed (client-side contract).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeepLinkConfig {
    pub enabled: bool,
    pub ios_scheme: Option<String>,
    pub ios_store_url: Option<String>,
    pub android_scheme: Option<String>,
    pub android_store_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub org_id: i64,
    /// Unique short code, immutable once created
    pub code: String,
    /// Primary destination, used when no rule or variant applies
    pub original_url: String,
    /// Argon2 hash; presence gates resolution behind a password
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub deep_link: Option<DeepLinkConfig>,
    pub active: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub clicks: u64,
}

impl Link {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// The attribute a routing rule matches on, as a tagged variant so the
/// precedence order stays auditable instead of stringly-typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule_type", content = "rule_value", rename_all = "lowercase")]
pub enum RuleMatch {
    /// ISO 3166-1 alpha-2 country code, case-insensitive exact match
    Country(String),
    Device(DeviceClass),
}

/// Destination override based on request attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: i64,
    pub link_id: i64,
    #[serde(flatten)]
    pub rule: RuleMatch,
    pub destination_url: String,
    /// Lower value = higher precedence
    pub priority: i32,
    pub active: bool,
    /// Insertion order, the documented tie-break for equal priorities
    #[serde(default)]
    pub position: i32,
}

/// One of several interchangeable destinations subject to weighted
/// random selection (A/B testing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: i64,
    pub link_id: i64,
    pub url: String,
    /// Positive integer; non-positive weights are dropped at read time
    pub weight: u32,
    pub active: bool,
    #[serde(default)]
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: i64,
    pub org_id: i64,
    /// Globally unique, stored lowercase
    pub hostname: String,
    pub is_default: bool,
    pub is_active: bool,
    pub verified: bool,
    /// Opaque token issued at creation, immutable; proven via DNS TXT
    pub verification_token: String,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Domain {
    /// Issue an opaque verification token for a newly created domain.
    pub fn issue_token() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// The TXT record value the domain owner must publish.
    pub fn expected_txt_value(&self) -> String {
        format!("shortlink-verify={}", self.verification_token)
    }
}

/// Best-effort geo attribution of a click; all fields may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClickGeo {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Append-only telemetry fact, one per successfully resolved redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickEvent {
    pub link_id: i64,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    #[serde(default)]
    pub geo: ClickGeo,
    pub destination: String,
    pub timestamp: DateTime<Utc>,
}
