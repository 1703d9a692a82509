//! External collaborator services: GeoIP lookup and DNS resolution.

pub mod dns;
pub mod geoip;

pub use dns::{DnsError, DnsResolver, HickoryResolver};
pub use geoip::{GeoInfo, GeoIpLookup, GeoIpProvider};
