pub mod ip;
pub mod password;
pub mod url_validator;

pub use url_validator::validate_url;

/// Short codes are path segments: alphanumerics plus `-` and `_`,
/// bounded length. Anything else is rejected before any lookup runs.
pub fn is_valid_short_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= 64
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Normalize a request Host header to a directory key: lowercase,
/// trailing dot and port stripped.
pub fn normalize_hostname(host: &str) -> String {
    let host = host.trim().trim_end_matches('.');
    // IPv6 literals keep their brackets, everything else loses the port
    let host = if host.starts_with('[') {
        host.split(']').next().map(|h| &h[1..]).unwrap_or(host)
    } else {
        host.split(':').next().unwrap_or(host)
    };
    host.to_ascii_lowercase()
}
