use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Outcome of a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// Matching echo reply received
    Success {
        sequence: u16,
        source: IpAddr,
        rtt: Duration,
        /// Reply TTL / hop limit, when the platform reports it
        ttl: Option<u8>,
        /// ICMP bytes received
        size: usize,
    },
    /// No matching reply within the timeout
    Timeout { sequence: u16 },
    /// Datagram that was not our reply (discarded)
    Mismatch,
}

/// Convert a Duration to fractional milliseconds
pub fn duration_ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

/// Per-session counters and RTT series
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub started_at: DateTime<Utc>,
    pub sent: u64,
    pub received: u64,
    /// Measured latencies in arrival order
    pub rtts: Vec<Duration>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            sent: 0,
            received: 0,
            rtts: Vec::new(),
        }
    }

    /// Count a transmitted probe
    pub fn record_sent(&mut self) {
        self.sent += 1;
    }

    /// Fold a probe outcome into the statistics
    ///
    /// Sends are counted separately by `record_sent`; only successes change
    /// anything here.
    pub fn record(&mut self, result: &ProbeResult) {
        if let ProbeResult::Success { rtt, .. } = result {
            self.received += 1;
            self.rtts.push(*rtt);
        }
    }

    /// Packet loss percentage (None if nothing was sent)
    pub fn loss_pct(&self) -> Option<f64> {
        if self.sent == 0 {
            return None;
        }
        let lost = self.sent.saturating_sub(self.received);
        Some(100.0 * lost as f64 / self.sent as f64)
    }

    /// Latency summary (None if nothing was received)
    pub fn rtt_summary(&self) -> Option<RttSummary> {
        if self.rtts.is_empty() {
            return None;
        }

        let samples: Vec<f64> = self.rtts.iter().map(|rtt| rtt.as_nanos() as f64).collect();
        let n = samples.len() as f64;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        Some(RttSummary {
            min_ms: min / 1_000_000.0,
            avg_ms: mean / 1_000_000.0,
            max_ms: max / 1_000_000.0,
            mdev_ms: variance.sqrt() / 1_000_000.0,
        })
    }

    pub fn summarize(&self) -> Summary {
        Summary {
            sent: self.sent,
            received: self.received,
            loss_pct: self.loss_pct(),
            rtt: self.rtt_summary(),
        }
    }
}

/// Final statistics handed back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub sent: u64,
    pub received: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loss_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt: Option<RttSummary>,
}

/// Latency aggregates in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RttSummary {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    /// Population standard deviation
    pub mdev_ms: f64,
}
