// Validation utilities
use crate::error::{Error, Result};
use std::net::IpAddr;
use tracing::warn;
use url::Url;

// List of commonly blocked ports
const BLOCKED_PORTS: &[u16] = &[
    22,    // SSH
    23,    // Telnet
    25,    // SMTP
    3306,  // MySQL
    5432,  // PostgreSQL
    6379,  // Redis
    27017, // MongoDB
];

/// Check if an IP address is in a private range
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            let octets = ipv4.octets();
            // 10.0.0.0/8
            octets[0] == 10
                // 172.16.0.0/12
                || (octets[0] == 172 && (16..=31).contains(&octets[1]))
                // 192.168.0.0/16
                || (octets[0] == 192 && octets[1] == 168)
                // 169.254.0.0/16 (link-local)
                || (octets[0] == 169 && octets[1] == 254)
        }
        IpAddr::V6(ipv6) => {
            // fe80::/10 link-local
            (ipv6.segments()[0] & 0xffc0) == 0xfe80
                // fc00::/7 unique local
                || (ipv6.segments()[0] & 0xfe00) == 0xfc00
        }
    }
}

fn is_local_host(host: &str) -> bool {
    let host_for_ip = host.trim_start_matches('[').trim_end_matches(']');
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }
    match host_for_ip.parse::<IpAddr>() {
        Ok(ip) => ip.is_loopback() || ip.is_unspecified() || is_private_ip(&ip),
        Err(_) => false,
    }
}

/// Validate a remote repository URL: http/https only, no restricted ports,
/// and no loopback or private hosts unless `allow_private_hosts` is set
pub fn validate_repository_url(url_str: &str, allow_private_hosts: bool) -> Result<Url> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            warn!(
                "Security: Blocked non-HTTP(S) URL scheme: {} in URL: {}",
                scheme, url_str
            );
            return Err(Error::Validation(format!(
                "URL must use http or https scheme: {url_str}"
            )));
        }
    }

    let host = url
        .host_str()
        .ok_or_else(|| Error::Validation("URL must have a valid host".to_string()))?;

    if !allow_private_hosts && is_local_host(host) {
        warn!("Security: Blocked local or private host in URL: {}", url_str);
        return Err(Error::Validation(format!(
            "Local and private hosts are not allowed: {host}"
        )));
    }

    if let Some(port) = url.port() {
        if BLOCKED_PORTS.contains(&port) {
            warn!(
                "Security: Blocked restricted port {} in URL: {}",
                port, url_str
            );
            return Err(Error::Validation(format!(
                "Port {port} is not allowed for security reasons"
            )));
        }
    }

    Ok(url)
}
