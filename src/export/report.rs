use std::io::Write;
use std::net::IpAddr;

use crate::probe::PAYLOAD_SIZE;
use crate::state::{ProbeResult, SessionStats, duration_ms};

/// Banner printed when probing starts
pub fn write_header<W: Write>(mut writer: W, target: &str, destination: IpAddr) -> std::io::Result<()> {
    writeln!(writer, "PING {} ({}): {} data bytes", target, destination, PAYLOAD_SIZE)
}

/// One line per finished probe
pub fn write_probe<W: Write>(mut writer: W, result: &ProbeResult) -> std::io::Result<()> {
    match result {
        ProbeResult::Success {
            sequence,
            source,
            rtt,
            ttl,
            size,
        } => {
            write!(writer, "{} bytes from {}: icmp_seq={}", size, source, sequence)?;
            if let Some(ttl) = ttl {
                write!(writer, " ttl={}", ttl)?;
            }
            writeln!(writer, " time={:.2} ms", duration_ms(*rtt))
        }
        ProbeResult::Timeout { sequence } => {
            writeln!(writer, "Request timeout for icmp_seq {}", sequence)
        }
        ProbeResult::Mismatch => Ok(()),
    }
}

/// Notice that the session is restarting over IPv4
pub fn write_fallback<W: Write>(mut writer: W, reason: &str) -> std::io::Result<()> {
    writeln!(writer, "{}", reason)?;
    writeln!(writer, "Falling back to IPv4...")
}

/// Final statistics block (nothing if no probe was sent)
pub fn write_summary<W: Write>(mut writer: W, target: &str, stats: &SessionStats) -> std::io::Result<()> {
    let summary = stats.summarize();
    let Some(loss) = summary.loss_pct else {
        return Ok(());
    };

    writeln!(writer)?;
    writeln!(writer, "--- {} ping statistics ---", target)?;
    writeln!(
        writer,
        "{} packets transmitted, {} received, {:.0}% packet loss",
        summary.sent, summary.received, loss
    )?;
    if let Some(rtt) = summary.rtt {
        writeln!(
            writer,
            "rtt min/avg/max/mdev = {:.3}/{:.3}/{:.3}/{:.3} ms",
            rtt.min_ms, rtt.avg_ms, rtt.max_ms, rtt.mdev_ms
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> std::io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_header() {
        let out = render(|w| write_header(w, "example.com", "192.0.2.1".parse().unwrap()));
        assert_eq!(out, "PING example.com (192.0.2.1): 32 data bytes\n");
    }

    #[test]
    fn test_probe_lines() {
        let success = ProbeResult::Success {
            sequence: 2,
            source: "2001:db8::1".parse().unwrap(),
            rtt: Duration::from_micros(12_346),
            ttl: Some(57),
            size: 40,
        };
        let out = render(|w| write_probe(w, &success));
        assert_eq!(out, "40 bytes from 2001:db8::1: icmp_seq=2 ttl=57 time=12.35 ms\n");

        let no_ttl = ProbeResult::Success {
            sequence: 0,
            source: "192.0.2.1".parse().unwrap(),
            rtt: Duration::from_millis(1),
            ttl: None,
            size: 40,
        };
        let out = render(|w| write_probe(w, &no_ttl));
        assert_eq!(out, "40 bytes from 192.0.2.1: icmp_seq=0 time=1.00 ms\n");

        let out = render(|w| write_probe(w, &ProbeResult::Timeout { sequence: 3 }));
        assert_eq!(out, "Request timeout for icmp_seq 3\n");
    }

    #[test]
    fn test_summary_with_rtt() {
        let mut stats = SessionStats::new();
        for ms in [10, 12, 11, 9] {
            stats.record_sent();
            stats.record(&ProbeResult::Success {
                sequence: 0,
                source: "192.0.2.1".parse().unwrap(),
                rtt: Duration::from_millis(ms),
                ttl: None,
                size: 40,
            });
        }
        stats.record_sent();

        let out = render(|w| write_summary(w, "host", &stats));
        assert!(out.contains("--- host ping statistics ---"));
        assert!(out.contains("5 packets transmitted, 4 received, 20% packet loss"));
        assert!(out.contains("rtt min/avg/max/mdev = 9.000/10.500/12.000/1.118 ms"));
    }

    #[test]
    fn test_summary_all_lost_has_no_rtt_line() {
        let mut stats = SessionStats::new();
        stats.record_sent();
        stats.record(&ProbeResult::Timeout { sequence: 0 });

        let out = render(|w| write_summary(w, "host", &stats));
        assert!(out.contains("1 packets transmitted, 0 received, 100% packet loss"));
        assert!(!out.contains("rtt"));
    }

    #[test]
    fn test_summary_nothing_sent() {
        let out = render(|w| write_summary(w, "host", &SessionStats::new()));
        assert!(out.is_empty());
    }
}
