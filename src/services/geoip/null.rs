//! Null GeoIP provider: every lookup answers unknown.

use std::net::IpAddr;

use async_trait::async_trait;

use super::provider::{GeoInfo, GeoIpLookup};

pub struct NullProvider;

#[async_trait]
impl GeoIpLookup for NullProvider {
    async fn lookup(&self, _ip: IpAddr) -> Option<GeoInfo> {
        None
    }

    fn name(&self) -> &'static str {
        "Null"
    }
}
