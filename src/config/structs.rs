use std::env;

use serde::{Deserialize, Serialize};

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `memory` or `file`
    pub backend: String,
    /// Snapshot path for the file backend
    pub data_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            data_file: "brandlink.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Rule-set cache TTL in seconds; bounds how stale a resolution can be
    /// after a link/rule/variant edit.
    pub rule_ttl_secs: u64,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            rule_ttl_secs: 3,
            max_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickConfig {
    pub flush_interval_secs: u64,
    /// When false only the click counter is kept; no ClickEvent rows
    pub detailed_events: bool,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: 5,
            detailed_events: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Poll cadence while a pending domain is inside the fast window
    pub fast_interval_secs: u64,
    /// Length of the fast window, measured from domain creation
    pub fast_window_secs: u64,
    /// Poll cadence after the fast window has elapsed
    pub slow_interval_secs: u64,
    /// Upper bound on a single DNS check round-trip
    pub dns_timeout_secs: u64,
    /// Cadence of the diagnostic record refresh job
    pub diagnostics_interval_secs: u64,
    /// Minimum spacing between diagnostic refreshes of one domain
    pub diagnostics_min_spacing_secs: u64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            fast_interval_secs: 30,
            fast_window_secs: 600,
            slow_interval_secs: 300,
            dns_timeout_secs: 5,
            diagnostics_interval_secs: 3600,
            diagnostics_min_spacing_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoIpConfig {
    /// Path to a MaxMind GeoLite2 database; geo enrichment is disabled
    /// when unset or unreadable.
    pub maxminddb_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    /// `plain` or `json`
    pub format: String,
    pub enable_rotation: bool,
    pub max_backups: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: "plain".to_string(),
            enable_rotation: true,
            max_backups: 7,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// The platform's own hostname; always eligible for redirects and
    /// scoped globally rather than to one org.
    pub root_domain: String,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub clicks: ClickConfig,
    pub verifier: VerifierConfig,
    pub geoip: GeoIpConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("SERVER_HOST", "127.0.0.1".to_string()),
                port: env_or("SERVER_PORT", 8080),
            },
            root_domain: env_or("ROOT_DOMAIN", "bl.example".to_string()),
            storage: StorageConfig {
                backend: env_or("STORAGE_BACKEND", "memory".to_string()),
                data_file: env_or("DATA_FILE", "brandlink.json".to_string()),
            },
            cache: CacheConfig {
                rule_ttl_secs: env_or("RULE_CACHE_TTL_SECS", 3),
                max_capacity: env_or("RULE_CACHE_CAPACITY", 10_000),
            },
            clicks: ClickConfig {
                flush_interval_secs: env_or("CLICK_FLUSH_INTERVAL_SECS", 5),
                detailed_events: env_or("CLICK_DETAILED_EVENTS", true),
            },
            verifier: VerifierConfig {
                fast_interval_secs: env_or("VERIFY_FAST_INTERVAL_SECS", 30),
                fast_window_secs: env_or("VERIFY_FAST_WINDOW_SECS", 600),
                slow_interval_secs: env_or("VERIFY_SLOW_INTERVAL_SECS", 300),
                dns_timeout_secs: env_or("VERIFY_DNS_TIMEOUT_SECS", 5),
                diagnostics_interval_secs: env_or("VERIFY_DIAG_INTERVAL_SECS", 3600),
                diagnostics_min_spacing_secs: env_or("VERIFY_DIAG_MIN_SPACING_SECS", 900),
            },
            geoip: GeoIpConfig {
                maxminddb_path: env_opt("MAXMINDDB_PATH"),
            },
            logging: LoggingConfig {
                level: env_or("LOG_LEVEL", "info".to_string()),
                file: env_opt("LOG_FILE"),
                format: env_or("LOG_FORMAT", "plain".to_string()),
                enable_rotation: env_or("LOG_ROTATION", true),
                max_backups: env_or("LOG_MAX_BACKUPS", 7),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.rule_ttl_secs, 3);
        assert!(config.verifier.fast_interval_secs < config.verifier.slow_interval_secs);
        assert!(config.geoip.maxminddb_path.is_none());
    }

    #[test]
    fn env_or_falls_back_on_unset() {
        assert_eq!(env_or("BRANDLINK_TEST_UNSET_KEY", 42u16), 42);
    }
}
