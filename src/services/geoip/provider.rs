//! GeoIP provider facade.
//!
//! Picks the implementation at startup: a configured and readable
//! MaxMind database wins, otherwise the null provider answers every
//! lookup with `None`.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::maxmind::MaxMindProvider;
use super::null::NullProvider;
use crate::config::GeoIpConfig;

/// Geolocation attributes, all best-effort.
#[derive(Debug, Clone, Default)]
pub struct GeoInfo {
    /// ISO 3166-1 alpha-2 country code (e.g. "FR", "US")
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[async_trait]
pub trait GeoIpLookup: Send + Sync {
    /// Look up the geolocation of an IP address; `None` means unknown.
    async fn lookup(&self, ip: IpAddr) -> Option<GeoInfo>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

pub struct GeoIpProvider {
    inner: Arc<dyn GeoIpLookup>,
}

impl GeoIpProvider {
    pub fn new(config: &GeoIpConfig) -> Self {
        let inner: Arc<dyn GeoIpLookup> = if let Some(ref path) = config.maxminddb_path {
            match MaxMindProvider::new(path) {
                Ok(provider) => {
                    info!("GeoIP: Using MaxMind database at {}", path);
                    Arc::new(provider)
                }
                Err(e) => {
                    warn!(
                        "GeoIP: Failed to load MaxMind database at {}: {}, geo enrichment disabled",
                        path, e
                    );
                    Arc::new(NullProvider)
                }
            }
        } else {
            debug!("GeoIP: No MaxMind database configured, geo enrichment disabled");
            Arc::new(NullProvider)
        };

        info!("GeoIP: Initialized with {} provider", inner.name());
        Self { inner }
    }

    /// Wrap a custom lookup implementation (tests inject fixed answers).
    pub fn from_lookup(inner: Arc<dyn GeoIpLookup>) -> Self {
        Self { inner }
    }

    pub async fn lookup(&self, ip: IpAddr) -> Option<GeoInfo> {
        self.inner.lookup(ip).await
    }

    pub fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

impl Clone for GeoIpProvider {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
