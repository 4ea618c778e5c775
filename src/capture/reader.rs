//! Capture reading through an external tool
//!
//! Packet dissection is left to the capture reader (tcpdump by default). The
//! pipeline only asks two questions of a capture: how many packets match a
//! filter, and which source identifier each packet carries.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{ForensicError, ForensicResult};

/// The fixed set of metrics counted over every capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrafficFilter {
    All,
    Tcp,
    Udp,
    /// TCP port 80
    Http,
    /// SYN flag set
    Syn,
    /// SYN and ACK both set
    SynAck,
    /// ACK flag set
    Ack,
    /// SYN set, ACK clear
    SynWithoutAck,
}

impl TrafficFilter {
    /// Every metric, total first
    pub const ALL: [TrafficFilter; 8] = [
        TrafficFilter::All,
        TrafficFilter::Tcp,
        TrafficFilter::Udp,
        TrafficFilter::Http,
        TrafficFilter::Syn,
        TrafficFilter::SynAck,
        TrafficFilter::Ack,
        TrafficFilter::SynWithoutAck,
    ];

    /// Metric name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            TrafficFilter::All => "total",
            TrafficFilter::Tcp => "tcp",
            TrafficFilter::Udp => "udp",
            TrafficFilter::Http => "http",
            TrafficFilter::Syn => "syn",
            TrafficFilter::SynAck => "syn-ack",
            TrafficFilter::Ack => "ack",
            TrafficFilter::SynWithoutAck => "syn-without-ack",
        }
    }

    /// BPF expression selecting the packets for this metric. Byte 13 of the
    /// TCP header holds the flags: SYN = 0x02, ACK = 0x10.
    pub fn expression(&self) -> Option<&'static str> {
        match self {
            TrafficFilter::All => None,
            TrafficFilter::Tcp => Some("tcp"),
            TrafficFilter::Udp => Some("udp"),
            TrafficFilter::Http => Some("tcp port 80"),
            TrafficFilter::Syn => Some("tcp[13] & 2 != 0"),
            TrafficFilter::SynAck => Some("tcp[13] & 18 == 18"),
            TrafficFilter::Ack => Some("tcp[13] & 16 != 0"),
            TrafficFilter::SynWithoutAck => Some("tcp[13] & 18 == 2"),
        }
    }
}

/// Read-only queries against a stored capture.
///
/// Implementations must be safe to call concurrently on the same file.
pub trait CaptureReader: Send + Sync {
    /// Count packets matching `filter`
    fn count(&self, capture: &Path, filter: TrafficFilter) -> ForensicResult<u64>;

    /// Source identifier of every packet, in capture order
    fn source_addresses(&self, capture: &Path) -> ForensicResult<Vec<String>>;
}

/// `CaptureReader` backed by `tcpdump -r <file> -n [expr]`
#[derive(Debug, Clone)]
pub struct TcpdumpReader {
    program: PathBuf,
}

impl TcpdumpReader {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    fn command(&self, capture: &Path, expression: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-r").arg(capture).arg("-n");
        if let Some(expr) = expression {
            cmd.arg(expr);
        }
        cmd
    }

    /// Run the reader and return its text rendering of the matching packets
    fn read_lines(&self, capture: &Path, metric: &str, expression: Option<&str>) -> ForensicResult<String> {
        trace!(metric, expression = expression.unwrap_or(""), "Running capture reader");

        let output = self
            .command(capture, expression)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                ForensicError::extraction(
                    metric,
                    format!("failed to run {}: {}", self.program.display(), e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ForensicError::extraction(
                metric,
                format!("{} exited with {}: {}", self.program.display(), output.status, stderr.trim()),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Stream the reader's rendering of a capture straight to the terminal
    pub fn display(&self, capture: &Path) -> ForensicResult<()> {
        let status = self
            .command(capture, None)
            .status()
            .map_err(|e| ForensicError::extraction("display", e.to_string()))?;
        if !status.success() {
            return Err(ForensicError::extraction(
                "display",
                format!("{} exited with {}", self.program.display(), status),
            ));
        }
        Ok(())
    }
}

impl CaptureReader for TcpdumpReader {
    fn count(&self, capture: &Path, filter: TrafficFilter) -> ForensicResult<u64> {
        let text = self.read_lines(capture, filter.name(), filter.expression())?;
        let count = count_packet_lines(&text);
        debug!(metric = filter.name(), count, "Metric counted");
        Ok(count)
    }

    fn source_addresses(&self, capture: &Path) -> ForensicResult<Vec<String>> {
        let text = self.read_lines(capture, "top-talkers", None)?;
        Ok(parse_source_addresses(&text))
    }
}

/// One packet per non-empty line
pub fn count_packet_lines(text: &str) -> u64 {
    text.lines().filter(|l| !l.trim().is_empty()).count() as u64
}

/// Third whitespace-separated field of each line: `<time> <proto> <src> > <dst> ...`
pub fn parse_source_addresses(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.split_whitespace().nth(2))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
12:00:00.000001 IP 10.0.0.1.51000 > 10.0.0.9.80: Flags [S], seq 1, win 64240, length 0
12:00:00.000002 IP 10.0.0.9.80 > 10.0.0.1.51000: Flags [S.], seq 9, ack 2, win 65160, length 0

12:00:00.000003 IP 10.0.0.1.51000 > 10.0.0.9.80: Flags [.], ack 1, win 502, length 0
";

    #[test]
    fn test_count_packet_lines_skips_blank() {
        assert_eq!(count_packet_lines(SAMPLE), 3);
        assert_eq!(count_packet_lines(""), 0);
    }

    #[test]
    fn test_parse_source_addresses() {
        let sources = parse_source_addresses(SAMPLE);
        assert_eq!(sources, vec!["10.0.0.1.51000", "10.0.0.9.80", "10.0.0.1.51000"]);
    }

    #[test]
    fn test_filter_expressions() {
        assert_eq!(TrafficFilter::All.expression(), None);
        assert_eq!(TrafficFilter::Http.expression(), Some("tcp port 80"));
        assert_eq!(TrafficFilter::SynWithoutAck.expression(), Some("tcp[13] & 18 == 2"));
        assert_eq!(TrafficFilter::ALL.len(), 8);
    }

    #[test]
    fn test_missing_reader_is_extraction_error() {
        let reader = TcpdumpReader::new("/nonexistent/capture-reader-binary");
        let err = reader.count(Path::new("x.pcap"), TrafficFilter::Tcp).unwrap_err();
        assert_eq!(err.kind(), "ExtractionError");
        assert!(err.to_string().contains("tcp"));
    }
}
