use std::io;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{Config, MAX_WAIT};
use crate::error::PingError;
use crate::probe::{ChannelFactory, IcmpChannel, RecvResult, decode, encode, get_identifier, matches};
use crate::state::{ProbeResult, SessionStats, Target};

/// Receive buffer (one Ethernet MTU)
const RECV_BUFFER_SIZE: usize = 1500;

/// Granularity for noticing cancellation during the inter-probe pause
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Progress reported while a session runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEvent {
    /// Socket is open and probing is about to start
    Started { destination: IpAddr, ipv6: bool },
    /// A probe finished (`Success` or `Timeout`)
    Probe(ProbeResult),
    /// IPv6 transport failed; the session restarts over IPv4
    Fallback { reason: String },
}

/// Sends `count` echo requests to one target, one at a time
///
/// Each probe is sent, then replies are read until one matches or the
/// per-probe timeout elapses. Non-matching traffic does not extend the
/// timeout. The channel lives for one run and is dropped on every exit path.
pub struct ProbeSession<F: ChannelFactory> {
    config: Config,
    target: Target,
    factory: F,
    identifier: u16,
    cancel: CancellationToken,
    /// Set on the IPv4 rerun after an IPv6 transport failure
    force_ipv4: bool,
}

impl<F: ChannelFactory> ProbeSession<F> {
    pub fn new(config: Config, target: Target, factory: F) -> Self {
        Self {
            config,
            target,
            factory,
            identifier: get_identifier(),
            cancel: CancellationToken::new(),
            force_ipv4: false,
        }
    }

    /// Stop between probes once `cancel` fires
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Override the process-derived ICMP identifier
    pub fn with_identifier(mut self, identifier: u16) -> Self {
        self.identifier = identifier;
        self
    }

    /// Run the session
    ///
    /// A socket-level failure over IPv6 restarts the whole session once over
    /// IPv4 with the same configuration. The returned stats cover only the
    /// run that completed.
    pub fn run<E>(self, mut on_event: E) -> Result<SessionStats, PingError>
    where
        E: FnMut(ProbeEvent),
    {
        match self.run_once(&mut on_event) {
            Err(e) if e.is_ipv6_transport() && !self.force_ipv4 => {
                if self.target.select(false).is_none() {
                    debug!("No IPv4 address for {}, cannot fall back", self.target.original);
                    return Err(e);
                }

                warn!("{}; falling back to IPv4", e);
                on_event(ProbeEvent::Fallback {
                    reason: e.to_string(),
                });

                let fallback = ProbeSession {
                    force_ipv4: true,
                    ..self
                };
                fallback.run_once(&mut on_event)
            }
            result => result,
        }
    }

    fn destination(&self) -> Result<IpAddr, PingError> {
        let (destination, family) = if self.force_ipv4 {
            (self.target.select(false), "IPv4")
        } else {
            (self.target.preferred(), "IP")
        };
        destination.ok_or_else(|| PingError::NoAddress {
            target: self.target.original.clone(),
            family,
        })
    }

    fn run_once<E>(&self, on_event: &mut E) -> Result<SessionStats, PingError>
    where
        E: FnMut(ProbeEvent),
    {
        let destination = self.destination()?;
        let ipv6 = destination.is_ipv6();

        let mut channel = self
            .factory
            .open(ipv6, self.config.ttl)
            .map_err(|e| PingError::from_socket(e, ipv6))?;
        debug!(
            "Opened {} channel to {} (identifier {})",
            if ipv6 { "ICMPv6" } else { "ICMP" },
            destination,
            self.identifier
        );
        on_event(ProbeEvent::Started { destination, ipv6 });

        let mut stats = SessionStats::new();
        let mut buffer = [0u8; RECV_BUFFER_SIZE];

        for sequence in 0..self.config.count {
            if self.cancel.is_cancelled() {
                debug!("Cancelled before icmp_seq {}", sequence);
                break;
            }

            let result = self.probe(&mut channel, destination, sequence, &mut stats, &mut buffer)?;
            stats.record(&result);
            on_event(ProbeEvent::Probe(result));

            if sequence + 1 < self.config.count {
                self.pause();
            }
        }

        Ok(stats)
    }

    /// Send one echo request and wait for its reply
    fn probe<C: IcmpChannel>(
        &self,
        channel: &mut C,
        destination: IpAddr,
        sequence: u16,
        stats: &mut SessionStats,
        buffer: &mut [u8],
    ) -> Result<ProbeResult, PingError> {
        let ipv6 = destination.is_ipv6();
        let packet = encode(ipv6, self.identifier, sequence);

        let sent_at = Instant::now();
        channel
            .send_to(&packet, destination)
            .map_err(|e| PingError::from_socket(e, ipv6))?;
        stats.record_sent();

        let deadline = deadline_after(sent_at, self.config.timeout);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(ProbeResult::Timeout { sequence });
            }

            let recv = match channel.recv_from(buffer, remaining) {
                Ok(Some(recv)) => recv,
                Ok(None) => return Ok(ProbeResult::Timeout { sequence }),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(PingError::from_socket(e, ipv6)),
            };
            let rtt = sent_at.elapsed();

            let len = recv.len.min(buffer.len());
            match correlate(&buffer[..len], &recv, ipv6, self.identifier, sequence, rtt) {
                ProbeResult::Mismatch => continue,
                result => return Ok(result),
            }
        }
    }

    /// Inter-probe delay, cut short by cancellation
    fn pause(&self) {
        let deadline = deadline_after(Instant::now(), self.config.interval);
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            std::thread::sleep(remaining.min(CANCEL_POLL));
        }
    }
}

/// `start + wait`, with `wait` capped at `MAX_WAIT` so the addition cannot overflow
fn deadline_after(start: Instant, wait: Duration) -> Instant {
    start.checked_add(wait.min(MAX_WAIT)).unwrap_or(start)
}

/// Classify one received datagram against the outstanding probe
pub fn correlate(
    data: &[u8],
    recv: &RecvResult,
    ipv6: bool,
    identifier: u16,
    sequence: u16,
    rtt: Duration,
) -> ProbeResult {
    let reply = match decode(data, ipv6) {
        Ok(reply) => reply,
        Err(e) => {
            debug!("Discarding datagram from {}: {}", recv.source, e);
            return ProbeResult::Mismatch;
        }
    };

    if !matches(&reply, identifier, sequence, ipv6) {
        debug!(
            "Discarding ICMP type {} id {} seq {} from {}",
            reply.icmp_type, reply.identifier, reply.sequence, recv.source
        );
        return ProbeResult::Mismatch;
    }

    ProbeResult::Success {
        sequence,
        source: recv.source,
        rtt,
        ttl: reply.ttl.or(recv.hop_limit),
        size: reply.size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ICMP_ECHO_REPLY, ICMPV6_ECHO_REPLY};

    fn recv_from(source: &str, len: usize, hop_limit: Option<u8>) -> RecvResult {
        RecvResult {
            len,
            source: source.parse().unwrap(),
            hop_limit,
        }
    }

    fn ipv4_reply(identifier: u16, sequence: u16, ttl: u8) -> Vec<u8> {
        let mut icmp = encode(false, identifier, sequence);
        icmp[0] = ICMP_ECHO_REPLY;
        let mut data = vec![0u8; 20];
        data[0] = 0x45;
        data[8] = ttl;
        data[9] = 1;
        data.extend_from_slice(&icmp);
        data
    }

    #[test]
    fn test_deadline_after_caps_huge_waits() {
        let start = Instant::now();
        let short = Duration::from_millis(5);
        assert_eq!(deadline_after(start, short), start + short);
        assert_eq!(deadline_after(start, Duration::MAX), start + MAX_WAIT);
        assert_eq!(deadline_after(start, Duration::from_secs(u64::MAX / 2)), start + MAX_WAIT);
    }

    #[test]
    fn test_correlate_ipv4_match() {
        let data = ipv4_reply(77, 3, 55);
        let recv = recv_from("192.0.2.9", data.len(), None);
        let rtt = Duration::from_millis(4);

        let result = correlate(&data, &recv, false, 77, 3, rtt);
        assert_eq!(
            result,
            ProbeResult::Success {
                sequence: 3,
                source: recv.source,
                rtt,
                ttl: Some(55),
                size: 40,
            }
        );
    }

    #[test]
    fn test_correlate_ipv6_uses_hop_limit() {
        let mut data = encode(true, 77, 0);
        data[0] = ICMPV6_ECHO_REPLY;
        let recv = recv_from("2001:db8::9", data.len(), Some(60));

        let result = correlate(&data, &recv, true, 77, 0, Duration::from_millis(1));
        assert!(matches!(result, ProbeResult::Success { ttl: Some(60), .. }));
    }

    #[test]
    fn test_correlate_foreign_traffic_is_mismatch() {
        let recv = recv_from("192.0.2.9", 60, None);
        let rtt = Duration::from_millis(1);

        // Another process's reply
        let data = ipv4_reply(78, 3, 64);
        assert_eq!(correlate(&data, &recv, false, 77, 3, rtt), ProbeResult::Mismatch);

        // Stale reply to an earlier probe
        let data = ipv4_reply(77, 2, 64);
        assert_eq!(correlate(&data, &recv, false, 77, 3, rtt), ProbeResult::Mismatch);

        // Garbage
        assert_eq!(correlate(&[0x45, 0], &recv, false, 77, 3, rtt), ProbeResult::Mismatch);
    }
}
