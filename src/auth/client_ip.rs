//! Client address as seen through a reverse proxy.

use axum::http::HeaderMap;
use std::net::IpAddr;

/// Pick the client address from forwarding headers, falling back to `peer`.
///
/// The first `X-Forwarded-For` entry wins, then `X-Real-IP`. An unparsable
/// header is skipped.
pub fn resolve(
    x_forwarded_for: Option<&str>,
    x_real_ip: Option<&str>,
    peer: Option<IpAddr>,
) -> Option<IpAddr> {
    let forwarded = x_forwarded_for
        .and_then(|xff| xff.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    forwarded
        .or_else(|| x_real_ip.and_then(|ip| ip.trim().parse::<IpAddr>().ok()))
        .or(peer)
}

pub fn from_headers(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());
    resolve(header("x-forwarded-for"), header("x-real-ip"), peer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_first_forwarded_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.2".parse().unwrap());

        assert_eq!(
            from_headers(&headers, Some(ip("127.0.0.1"))),
            Some(ip("203.0.113.7"))
        );
    }

    #[test]
    fn test_real_ip_then_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "2001:db8::1".parse().unwrap());
        assert_eq!(from_headers(&headers, None), Some(ip("2001:db8::1")));

        let headers = HeaderMap::new();
        assert_eq!(
            from_headers(&headers, Some(ip("127.0.0.1"))),
            Some(ip("127.0.0.1"))
        );
        assert_eq!(from_headers(&headers, None), None);
    }

    #[test]
    fn test_garbage_header_falls_through() {
        assert_eq!(
            resolve(Some("unknown"), Some("10.1.2.3"), None),
            Some(ip("10.1.2.3"))
        );
    }
}
