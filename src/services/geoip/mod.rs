//! GeoIP lookup service.
//!
//! Best-effort IP geolocation for click telemetry, backed by a local
//! MaxMind GeoLite2 database when one is configured. Lookup failure is
//! never an error; the click is simply recorded without geo fields.

mod maxmind;
mod null;
mod provider;

pub use provider::{GeoInfo, GeoIpLookup, GeoIpProvider};
