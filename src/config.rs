use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

use crate::cli::Args;
use crate::prefs::Prefs;

pub const DEFAULT_COUNT: u16 = 4;
pub const DEFAULT_TTL: u8 = 64;
pub const DEFAULT_TIMEOUT_SECS: f64 = 2.0;
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;
/// Longest accepted timeout or interval (one day)
pub const MAX_WAIT: Duration = Duration::from_secs(86_400);

/// Convert a user-supplied number of seconds into a wait duration
///
/// Returns `None` for negative, non-finite, or over-long values.
pub fn wait_from_secs(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|wait| *wait <= MAX_WAIT)
}

/// Address family restriction for target resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// Prefer IPv6, fall back to IPv4
    #[default]
    Any,
    V4,
    V6,
}

impl AddressFamily {
    pub fn allows(&self, ip: &IpAddr) -> bool {
        match self {
            Self::Any => true,
            Self::V4 => ip.is_ipv4(),
            Self::V6 => ip.is_ipv6(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Any => "IP",
            Self::V4 => "IPv4",
            Self::V6 => "IPv6",
        }
    }
}

/// Runtime configuration for a ping session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Number of echo requests to send
    pub count: u16,
    /// Outgoing TTL / hop limit
    pub ttl: u8,
    /// Per-probe reply timeout
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
    /// Pause between probes
    #[serde(with = "duration_serde")]
    pub interval: Duration,
    pub family: AddressFamily,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            ttl: DEFAULT_TTL,
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            interval: Duration::from_secs_f64(DEFAULT_INTERVAL_SECS),
            family: AddressFamily::Any,
        }
    }
}

impl Config {
    /// Merge CLI arguments over saved preferences over defaults
    pub fn resolve(args: &Args, prefs: &Prefs) -> Self {
        let defaults = Self::default();

        let family = if args.ipv4 {
            AddressFamily::V4
        } else if args.ipv6 {
            AddressFamily::V6
        } else {
            AddressFamily::Any
        };

        Self {
            count: args.count.or(prefs.count).unwrap_or(defaults.count),
            ttl: args.ttl.or(prefs.ttl).unwrap_or(defaults.ttl),
            timeout: args
                .timeout
                .or(prefs.timeout)
                .and_then(wait_from_secs)
                .unwrap_or(defaults.timeout),
            interval: args
                .interval
                .or(prefs.interval)
                .and_then(wait_from_secs)
                .unwrap_or(defaults.interval),
            family,
        }
    }
}

/// Serde helper for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        Args::parse_from(std::iter::once("rping").chain(argv.iter().copied()))
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.count, 4);
        assert_eq!(config.ttl, 64);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.interval, Duration::from_secs(1));
        assert_eq!(config.family, AddressFamily::Any);
    }

    #[test]
    fn test_config_cli_overrides_prefs() {
        let prefs = Prefs {
            count: Some(10),
            ttl: Some(32),
            timeout: Some(5.0),
            interval: None,
        };
        let config = Config::resolve(&args(&["-c", "3", "example.com"]), &prefs);
        assert_eq!(config.count, 3);
        assert_eq!(config.ttl, 32);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_wait_from_secs_bounds() {
        assert_eq!(wait_from_secs(0.0), Some(Duration::ZERO));
        assert_eq!(wait_from_secs(1.5), Some(Duration::from_millis(1500)));
        assert_eq!(wait_from_secs(86_400.0), Some(MAX_WAIT));
        assert_eq!(wait_from_secs(86_400.5), None);
        assert_eq!(wait_from_secs(1e20), None);
        assert_eq!(wait_from_secs(-0.5), None);
        assert_eq!(wait_from_secs(f64::NAN), None);
        assert_eq!(wait_from_secs(f64::INFINITY), None);
    }

    #[test]
    fn test_config_ignores_unrepresentable_waits() {
        // resolve() may see values that skipped validation
        let prefs = Prefs {
            interval: Some(1e19),
            ..Prefs::default()
        };
        let config = Config::resolve(&args(&["-W", "1e20", "host"]), &prefs);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_config_family_flags() {
        let prefs = Prefs::default();
        assert_eq!(
            Config::resolve(&args(&["-4", "host"]), &prefs).family,
            AddressFamily::V4
        );
        assert_eq!(
            Config::resolve(&args(&["-6", "host"]), &prefs).family,
            AddressFamily::V6
        );
    }

    #[test]
    fn test_address_family_allows() {
        let v4: IpAddr = "192.0.2.1".parse().unwrap();
        let v6: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(AddressFamily::Any.allows(&v4) && AddressFamily::Any.allows(&v6));
        assert!(AddressFamily::V4.allows(&v4) && !AddressFamily::V4.allows(&v6));
        assert!(AddressFamily::V6.allows(&v6) && !AddressFamily::V6.allows(&v4));
    }

    #[test]
    fn test_config_serde_durations_as_seconds() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("\"timeout\":2.0"));
        assert!(json.contains("\"family\":\"any\""));

        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Config::default());
    }
}
