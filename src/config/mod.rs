//! Application configuration
//!
//! Environment-driven configuration loaded once at startup into a global
//! `ArcSwap`, so readers get a cheap Arc clone without holding locks.

mod structs;

pub use structs::{
    AppConfig, CacheConfig, ClickConfig, GeoIpConfig, LoggingConfig, ServerConfig, StorageConfig,
    VerifierConfig,
};

use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;

static CONFIG: OnceLock<ArcSwap<AppConfig>> = OnceLock::new();

/// Get the global configuration instance
///
/// Returns an Arc pointer to the configuration, which is cheap to clone
/// and doesn't hold any locks.
pub fn get_config() -> Arc<AppConfig> {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
        .load_full()
}

/// Initialize the global configuration from environment variables.
pub fn init_config() {
    CONFIG.get_or_init(|| ArcSwap::from_pointee(AppConfig::from_env()));
}

/// Replace the global configuration (test helper and reload hook).
pub fn replace_config(config: AppConfig) {
    CONFIG
        .get_or_init(|| ArcSwap::from_pointee(AppConfig::default()))
        .store(Arc::new(config));
}
