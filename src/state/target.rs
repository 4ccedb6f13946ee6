use serde::{Deserialize, Serialize};
use std::net::{IpAddr, ToSocketAddrs};

use crate::config::AddressFamily;
use crate::error::PingError;

/// Destination as given by the caller, plus every address it resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub original: String,
    pub addrs: Vec<IpAddr>,
}

impl Target {
    pub fn new(original: String, addrs: Vec<IpAddr>) -> Self {
        Self { original, addrs }
    }

    /// Resolve a hostname or literal address
    ///
    /// A literal address is used as-is. Hostnames go through the system
    /// resolver; the result keeps both families so the session can prefer
    /// IPv6 and still fall back to IPv4.
    pub fn resolve(target: &str, family: AddressFamily) -> Result<Self, PingError> {
        let addrs: Vec<IpAddr> = if let Ok(ip) = target.parse::<IpAddr>() {
            vec![ip]
        } else {
            let mut addrs = Vec::new();
            let resolved = (target, 0)
                .to_socket_addrs()
                .map_err(|source| PingError::Resolution {
                    target: target.to_string(),
                    source,
                })?;
            for addr in resolved {
                if !addrs.contains(&addr.ip()) {
                    addrs.push(addr.ip());
                }
            }
            addrs
        };

        let filtered: Vec<IpAddr> = addrs
            .into_iter()
            .filter(|ip| family.allows(ip))
            .collect();

        if filtered.is_empty() {
            return Err(PingError::NoAddress {
                target: target.to_string(),
                family: family.label(),
            });
        }

        Ok(Self::new(target.to_string(), filtered))
    }

    /// First address of the requested family
    pub fn select(&self, ipv6: bool) -> Option<IpAddr> {
        self.addrs.iter().copied().find(|ip| ip.is_ipv6() == ipv6)
    }

    /// Preferred destination: IPv6 when available, otherwise IPv4
    pub fn preferred(&self) -> Option<IpAddr> {
        self.select(true).or_else(|| self.select(false))
    }
}
