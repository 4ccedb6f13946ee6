use clap::Parser;

use crate::config::{MAX_WAIT, wait_from_secs};

/// Send ICMP echo requests and report round-trip statistics
#[derive(Parser, Debug, Clone)]
#[command(name = "rping")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target host (IPv4/IPv6 address or hostname)
    pub target: String,

    /// Number of echo requests to send [default: 4]
    #[arg(short = 'c', long = "count")]
    pub count: Option<u16>,

    /// Time to live / hop limit [default: 64]
    #[arg(short = 't', long = "ttl")]
    pub ttl: Option<u8>,

    /// Reply timeout in seconds [default: 2]
    #[arg(short = 'W', long = "timeout")]
    pub timeout: Option<f64>,

    /// Pause between probes in seconds [default: 1]
    #[arg(short = 'i', long = "interval")]
    pub interval: Option<f64>,

    /// Force IPv4
    #[arg(short = '4', long = "ipv4", conflicts_with = "ipv6")]
    pub ipv4: bool,

    /// Force IPv6
    #[arg(short = '6', long = "ipv6")]
    pub ipv6: bool,

    /// Print the final statistics as JSON
    #[arg(long = "json")]
    pub json: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.target.is_empty() {
            return Err("Target cannot be empty".into());
        }

        if self.count == Some(0) {
            return Err("Count must be at least 1".into());
        }

        if self.ttl == Some(0) {
            return Err("TTL must be at least 1".into());
        }

        if let Some(timeout) = self.timeout
            && !wait_from_secs(timeout).is_some_and(|t| !t.is_zero())
        {
            return Err(format!(
                "Timeout must be positive and at most {} seconds",
                MAX_WAIT.as_secs()
            ));
        }

        if let Some(interval) = self.interval
            && wait_from_secs(interval).is_none()
        {
            return Err(format!(
                "Interval must be between 0 and {} seconds",
                MAX_WAIT.as_secs()
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("rping").chain(argv.iter().copied()))
    }

    #[test]
    fn test_parse_short_flags() {
        let args = parse(&["-c", "10", "-t", "32", "-W", "1.5", "example.com"]).unwrap();
        assert_eq!(args.target, "example.com");
        assert_eq!(args.count, Some(10));
        assert_eq!(args.ttl, Some(32));
        assert_eq!(args.timeout, Some(1.5));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_defaults_are_unset() {
        let args = parse(&["192.0.2.1"]).unwrap();
        assert_eq!(args.count, None);
        assert_eq!(args.ttl, None);
        assert!(!args.json);
    }

    #[test]
    fn test_target_required() {
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn test_ipv4_ipv6_conflict() {
        assert!(parse(&["-4", "-6", "host"]).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_and_negative() {
        assert!(parse(&["-c", "0", "h"]).unwrap().validate().is_err());
        assert!(parse(&["-t", "0", "h"]).unwrap().validate().is_err());
        assert!(parse(&["-W", "0", "h"]).unwrap().validate().is_err());
        assert!(parse(&["--interval=-1", "h"]).unwrap().validate().is_err());
        assert!(parse(&["-i", "0", "h"]).unwrap().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overlong_waits() {
        for argv in [
            ["-W", "1e20", "h"],
            ["-W", "1e19", "h"],
            ["-W", "86401", "h"],
            ["-W", "inf", "h"],
            ["-i", "1e19", "h"],
            ["-i", "NaN", "h"],
        ] {
            assert!(parse(&argv).unwrap().validate().is_err(), "{:?}", argv);
        }
        assert!(parse(&["-W", "86400", "-i", "86400", "h"]).unwrap().validate().is_ok());
    }
}
