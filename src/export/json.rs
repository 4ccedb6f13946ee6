use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::net::IpAddr;

use crate::state::{SessionStats, Summary, duration_ms};

/// JSON document describing a finished session
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<IpAddr>,
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub summary: Summary,
    pub rtts_ms: Vec<f64>,
}

impl<'a> JsonReport<'a> {
    pub fn new(target: &'a str, address: Option<IpAddr>, stats: &SessionStats) -> Self {
        Self {
            target,
            address,
            started_at: stats.started_at,
            summary: stats.summarize(),
            rtts_ms: stats.rtts.iter().map(|rtt| duration_ms(*rtt)).collect(),
        }
    }
}

/// Export session statistics as pretty-printed JSON
pub fn export_json<W: Write>(
    target: &str,
    address: Option<IpAddr>,
    stats: &SessionStats,
    mut writer: W,
) -> Result<()> {
    let report = JsonReport::new(target, address, stats);
    serde_json::to_writer_pretty(&mut writer, &report)?;
    writeln!(writer)?;
    Ok(())
}
