//! Webhook source allowlist.

use std::net::IpAddr;

#[derive(Debug, Clone, Default)]
pub struct SecurityConfig {
    /// Sources allowed to post webhooks. Empty means any source.
    pub allowed_ips: Vec<IpAddr>,
    /// Take the client address from the first `X-Forwarded-For` entry.
    /// Only enable behind a reverse proxy that sets the header.
    pub trust_forwarded_for: bool,
}

impl SecurityConfig {
    /// Loopback is always allowed.
    pub fn is_ip_allowed(&self, ip: IpAddr) -> bool {
        self.allowed_ips.is_empty() || ip.is_loopback() || self.allowed_ips.contains(&ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowlist() {
        let open = SecurityConfig::default();
        assert!(open.is_ip_allowed("203.0.113.9".parse().unwrap()));

        let restricted = SecurityConfig {
            allowed_ips: vec!["52.89.214.238".parse().unwrap()],
            trust_forwarded_for: false,
        };
        assert!(restricted.is_ip_allowed("52.89.214.238".parse().unwrap()));
        assert!(restricted.is_ip_allowed("127.0.0.1".parse().unwrap()));
        assert!(restricted.is_ip_allowed("::1".parse().unwrap()));
        assert!(!restricted.is_ip_allowed("203.0.113.9".parse().unwrap()));
    }
}
