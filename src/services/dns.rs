//! DNS lookup primitives for domain verification.
//!
//! A thin trait over TXT/CNAME/A/AAAA queries so the verifier can be
//! driven by a mock resolver in tests. NXDOMAIN and NODATA are answers,
//! not errors: they come back as an empty record set. Only transport
//! problems and resolver timeouts surface as `DnsError`.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use tracing::trace;

#[derive(Debug, Clone)]
pub enum DnsError {
    /// The query to the resolver itself timed out; the only DNS outcome
    /// that warrants operational alerting.
    Timeout,
    Resolution(String),
}

impl std::fmt::Display for DnsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DnsError::Timeout => write!(f, "DNS query timed out"),
            DnsError::Resolution(msg) => write!(f, "DNS resolution failed: {}", msg),
        }
    }
}

impl std::error::Error for DnsError {}

#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// TXT record values at `name`, empty when none exist.
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsError>;

    /// CNAME targets at `name` (diagnostics only).
    async fn lookup_cname(&self, name: &str) -> Result<Vec<String>, DnsError>;

    /// A records at `name` (diagnostics only).
    async fn lookup_a(&self, name: &str) -> Result<Vec<IpAddr>, DnsError>;

    /// AAAA records at `name` (diagnostics only).
    async fn lookup_aaaa(&self, name: &str) -> Result<Vec<IpAddr>, DnsError>;
}

fn map_resolve_error<T>(err: ResolveError) -> Result<Vec<T>, DnsError> {
    match err.kind() {
        // Absence of an answer is "not yet", never a failure
        ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
        ResolveErrorKind::Timeout => Err(DnsError::Timeout),
        other => Err(DnsError::Resolution(other.to_string())),
    }
}

/// System resolver backed by hickory with a bounded per-query timeout.
pub struct HickoryResolver {
    inner: TokioAsyncResolver,
}

impl HickoryResolver {
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 2;

        Self {
            inner: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }
}

#[async_trait]
impl DnsResolver for HickoryResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsError> {
        match self.inner.txt_lookup(name).await {
            Ok(lookup) => {
                let values: Vec<String> = lookup
                    .iter()
                    .map(|txt| {
                        txt.txt_data()
                            .iter()
                            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                            .collect::<String>()
                    })
                    .collect();
                trace!("TXT lookup {}: {} records", name, values.len());
                Ok(values)
            }
            Err(e) => map_resolve_error(e),
        }
    }

    async fn lookup_cname(&self, name: &str) -> Result<Vec<String>, DnsError> {
        use hickory_resolver::proto::rr::RecordType;

        match self.inner.lookup(name, RecordType::CNAME).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .filter_map(|rdata| rdata.as_cname())
                .map(|cname| cname.0.to_utf8())
                .collect()),
            Err(e) => map_resolve_error(e),
        }
    }

    async fn lookup_a(&self, name: &str) -> Result<Vec<IpAddr>, DnsError> {
        match self.inner.ipv4_lookup(name).await {
            Ok(lookup) => Ok(lookup.iter().map(|a| IpAddr::V4(a.0)).collect()),
            Err(e) => map_resolve_error(e),
        }
    }

    async fn lookup_aaaa(&self, name: &str) -> Result<Vec<IpAddr>, DnsError> {
        match self.inner.ipv6_lookup(name).await {
            Ok(lookup) => Ok(lookup.iter().map(|aaaa| IpAddr::V6(aaaa.0)).collect()),
            Err(e) => map_resolve_error(e),
        }
    }
}
