//! Brandlink - branded-link resolution and routing engine
//!
//! Core of a branded-link platform: short codes resolve to destination
//! URLs under per-link device/geo routing rules, weighted A/B variants,
//! mobile deep links, and access gates, scoped by verified custom
//! domains.
//!
//! # Architecture
//! - `routing`: resolver pipeline, rule store, variant selection
//! - `domains`: hostname directory, DNS verification state machine, poller
//! - `analytics`: buffered click counters and telemetry events
//! - `storage`: storage trait and backends
//! - `services`: external collaborators (GeoIP, DNS)
//! - `api`: thin HTTP boundary
//! - `config` / `system`: configuration and process wiring

pub mod analytics;
pub mod api;
pub mod config;
pub mod domains;
pub mod errors;
pub mod metrics_core;
pub mod routing;
pub mod services;
pub mod storage;
pub mod system;
pub mod utils;
