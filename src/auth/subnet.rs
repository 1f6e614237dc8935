use ipnet::IpNet;
use std::net::IpAddr;

use super::AuthError;
use crate::config::TrustedSubnetConfig;

/// Network allowed to reach internal endpoints.
#[derive(Debug, Clone, Default)]
pub struct TrustedSubnet {
    cidr: Option<IpNet>,
    deny_if_not_configured: bool,
}

impl TrustedSubnet {
    pub fn new(cidr: Option<IpNet>, deny_if_not_configured: bool) -> Self {
        Self {
            cidr,
            deny_if_not_configured,
        }
    }

    pub fn from_config(config: &TrustedSubnetConfig) -> Result<Self, AuthError> {
        let cidr = match config.cidr.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<IpNet>().map_err(|source| AuthError::InvalidSubnet {
                cidr: raw.to_string(),
                source,
            })?),
        };
        Ok(Self::new(cidr, config.deny_if_not_configured))
    }

    pub fn is_configured(&self) -> bool {
        self.cidr.is_some()
    }

    /// Whether a client at `ip` may pass.
    ///
    /// Without a configured CIDR everyone passes unless
    /// `deny_if_not_configured` is set. With one, an unknown address is denied.
    pub fn allows(&self, ip: Option<IpAddr>) -> bool {
        match (&self.cidr, ip) {
            (None, _) => !self.deny_if_not_configured,
            (Some(_), None) => false,
            (Some(net), Some(ip)) => net.contains(&ip.to_canonical()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(cidr: &str, deny: bool) -> TrustedSubnetConfig {
        TrustedSubnetConfig {
            cidr: Some(cidr.to_string()),
            deny_if_not_configured: deny,
        }
    }

    #[test]
    fn test_membership() {
        let subnet = TrustedSubnet::from_config(&config("10.0.0.0/8", false)).unwrap();
        assert!(subnet.allows(Some("10.1.2.3".parse().unwrap())));
        assert!(subnet.allows(Some("::ffff:10.1.2.3".parse().unwrap())));
        assert!(!subnet.allows(Some("192.168.1.1".parse().unwrap())));
        assert!(!subnet.allows(None));
    }

    #[test]
    fn test_unconfigured_policy() {
        let open = TrustedSubnet::from_config(&config("", false)).unwrap();
        assert!(!open.is_configured());
        assert!(open.allows(Some("192.168.1.1".parse().unwrap())));
        assert!(open.allows(None));

        let closed = TrustedSubnet::from_config(&config("  ", true)).unwrap();
        assert!(!closed.allows(Some("10.0.0.1".parse().unwrap())));
    }

    #[test]
    fn test_invalid_cidr_is_an_error() {
        let err = TrustedSubnet::from_config(&config("10.0.0.0/99", false)).unwrap_err();
        assert!(matches!(err, AuthError::InvalidSubnet { .. }));
    }
}
