//! SSRF (Server-Side Request Forgery) protection.
//!
//! Preview URLs come straight from users, so before any request is sent the
//! host is resolved and every answer must be a public address.
use std::net::IpAddr;

use url::{Host, Url};

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),

    #[error("DNS resolution failed: {0}")]
    DnsError(String),

    #[error("host resolved to no addresses: {0}")]
    NoAddresses(String),
}

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// This covers:
/// - Loopback addresses (127.0.0.0/8, ::1)
/// - RFC 1918 private ranges (10/8, 172.16/12, 192.168/16)
/// - Carrier-grade NAT (100.64/10)
/// - Link-local addresses (169.254/16, fe80::/10)
/// - Multicast addresses (224/4, ff00::/8)
/// - Unspecified addresses (0.0.0.0/8, ::)
/// - IPv6 unique local (fc00::/7)
/// - IPv4-mapped IPv6 addresses of any of the above
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || o[0] == 0
                || (o[0] == 100 && (64..=127).contains(&o[1]))
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_or_reserved(IpAddr::V4(v4));
            }
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Validate that an IP address is not private or reserved.
///
/// Returns an error if the IP is blocked.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// The IP literal a URL points at, if its host is one.
pub fn literal_ip(url: &Url) -> Option<IpAddr> {
    match url.host()? {
        Host::Ipv4(v4) => Some(IpAddr::V4(v4)),
        Host::Ipv6(v6) => Some(IpAddr::V6(v6)),
        Host::Domain(_) => None,
    }
}

/// Resolve the URL's host and validate every A/AAAA answer.
pub async fn validate_host(url: &Url) -> Result<(), SsrfError> {
    if let Some(ip) = literal_ip(url) {
        return validate_ip(ip);
    }

    let host = url.host_str().unwrap_or_default();
    let port = url.port_or_known_default().unwrap_or(443);

    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| SsrfError::DnsError(format!("{host}: {e}")))?;

    let mut resolved = 0usize;
    for addr in addrs {
        validate_ip(addr.ip())?;
        resolved += 1;
    }

    if resolved == 0 {
        return Err(SsrfError::NoAddresses(host.to_string()));
    }

    tracing::debug!(host, resolved, "host resolved to public addresses");
    Ok(())
}
