//! SSRF-safe URL validation for outbound monitor fetches.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Reject anything but a plain http(s) URL pointed at a public host.
///
/// Blocks non-http(s) schemes, userinfo tricks, loopback/private/link-local
/// addresses (including cloud metadata endpoints), and known internal
/// hostnames.
pub fn validate_url(url: &str) -> Result<(), String> {
    let lower = url.to_ascii_lowercase();

    let after_scheme = if let Some(r) = lower.strip_prefix("https://") {
        r
    } else if let Some(r) = lower.strip_prefix("http://") {
        r
    } else {
        return Err("URL must use http or https scheme".into());
    };

    let after_userinfo = match after_scheme.split_once('@') {
        Some((_, rest)) => rest,
        None => after_scheme,
    };

    let authority = after_userinfo.split('/').next().unwrap_or("");

    let host = if let Some(rest) = authority.strip_prefix('[') {
        rest.split(']').next().unwrap_or("")
    } else {
        authority.split(':').next().unwrap_or("")
    };

    if host.is_empty() {
        return Err("URL has empty host".into());
    }

    if host == "localhost" || host.ends_with(".localhost") || host == "metadata.google.internal" {
        return Err(format!("URL must not target internal host: {host}"));
    }

    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        if ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified() || ip.is_broadcast() {
            return Err(format!("URL must not target private/internal IP: {ip}"));
        }
    }

    if let Ok(ip) = host.parse::<Ipv6Addr>() {
        if ip.is_loopback() || ip.is_unspecified() {
            return Err(format!("URL must not target private/internal IPv6: {ip}"));
        }
        let segs = ip.segments();
        if segs[..6] == [0, 0, 0, 0, 0, 0xffff] {
            let mapped = Ipv4Addr::new((segs[6] >> 8) as u8, segs[6] as u8, (segs[7] >> 8) as u8, segs[7] as u8);
            if mapped.is_loopback() || mapped.is_private() || mapped.is_link_local() || mapped.is_unspecified() {
                return Err(format!("URL must not target private/internal IP: {mapped}"));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_public_urls() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("https://api.github.com/repos/rust-lang/rust").is_ok());
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn rejects_private_and_loopback() {
        assert!(validate_url("http://127.0.0.1").is_err());
        assert!(validate_url("http://10.0.0.5").is_err());
        assert!(validate_url("http://169.254.169.254/latest/meta-data/").is_err());
        assert!(validate_url("http://[::1]").is_err());
    }

    #[test]
    fn rejects_localhost_and_metadata_hosts() {
        assert!(validate_url("http://localhost:3000").is_err());
        assert!(validate_url("http://metadata.google.internal").is_err());
    }

    #[test]
    fn rejects_userinfo_tricks() {
        assert!(validate_url("http://evil@10.0.0.1").is_err());
    }
}
