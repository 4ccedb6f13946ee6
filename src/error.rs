use std::io;
use thiserror::Error;

/// Fatal errors surfaced by a ping session
#[derive(Debug, Error)]
pub enum PingError {
    #[error("Could not resolve hostname {target}: {source}")]
    Resolution {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("No {family} address found for {target}")]
    NoAddress { target: String, family: &'static str },

    #[error(
        "Insufficient permissions for raw sockets: {source}\n\n\
         Fix options:\n\
         \u{2022} Run with sudo: sudo rping <target>\n\
         \u{2022} Add capability: sudo setcap cap_net_raw+ep $(which rping)"
    )]
    Permission {
        #[source]
        source: io::Error,
    },

    #[error("Socket error over {}: {source}", family_name(.ipv6))]
    Socket {
        ipv6: bool,
        #[source]
        source: io::Error,
    },
}

fn family_name(ipv6: &bool) -> &'static str {
    if *ipv6 { "IPv6" } else { "IPv4" }
}

impl PingError {
    /// Classify a socket-level failure for the given family
    pub fn from_socket(source: io::Error, ipv6: bool) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            PingError::Permission { source }
        } else {
            PingError::Socket { ipv6, source }
        }
    }

    /// Transport failure over IPv6 (triggers the one-shot IPv4 rerun)
    pub fn is_ipv6_transport(&self) -> bool {
        matches!(self, PingError::Socket { ipv6: true, .. })
    }
}

/// Why an inbound datagram could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("datagram too short: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    #[error("invalid IPv4 header length: {0} words")]
    BadHeaderLength(u8),
}
