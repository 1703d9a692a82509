//! Client IP extraction.
//!
//! The resolved IP feeds geo routing and click telemetry only; it is
//! never used for authorization. Forwarded headers are trusted only when
//! the direct peer is a private address (reverse-proxy deployment),
//! which prevents spoofing on public-facing direct connections.

use std::net::IpAddr;

use actix_web::HttpRequest;

/// Check whether an IP is a private address or localhost.
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            // fc00::/7 (ULA), fe80::/10 (link-local), ::1
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

fn first_forwarded_ip(req: &HttpRequest) -> Option<IpAddr> {
    let header = req
        .headers()
        .get("x-forwarded-for")
        .or_else(|| req.headers().get("x-real-ip"))?;
    let value = header.to_str().ok()?;
    value.split(',').next()?.trim().parse().ok()
}

/// Extract the real client IP from a request.
///
/// Peer address wins unless the peer is private/local, in which case the
/// first `X-Forwarded-For` (or `X-Real-IP`) entry is used.
pub fn extract_client_ip(req: &HttpRequest) -> Option<IpAddr> {
    let peer = req.peer_addr().map(|addr| addr.ip());

    match peer {
        Some(peer_ip) if is_private_or_local(&peer_ip) => {
            first_forwarded_ip(req).or(Some(peer_ip))
        }
        Some(peer_ip) => Some(peer_ip),
        None => first_forwarded_ip(req),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn private_and_loopback_detection() {
        assert!(is_private_or_local(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"10.1.2.3".parse().unwrap()));
        assert!(is_private_or_local(&"192.168.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"::1".parse().unwrap()));
        assert!(is_private_or_local(&"fe80::1".parse().unwrap()));
        assert!(!is_private_or_local(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_or_local(&"2001:4860:4860::8888".parse().unwrap()));
    }

    #[test]
    fn forwarded_header_used_behind_private_peer() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "203.0.113.9, 10.0.0.1"))
            .peer_addr("127.0.0.1:40000".parse().unwrap())
            .to_http_request();
        assert_eq!(
            extract_client_ip(&req),
            Some("203.0.113.9".parse().unwrap())
        );
    }

    #[test]
    fn forwarded_header_ignored_for_public_peer() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "203.0.113.9"))
            .peer_addr("198.51.100.4:40000".parse().unwrap())
            .to_http_request();
        assert_eq!(
            extract_client_ip(&req),
            Some("198.51.100.4".parse().unwrap())
        );
    }
}
