//! DoS detection heuristics
//!
//! Two independent checks over already-extracted counters. Both are pure:
//! no I/O, no clock, same inputs always give the same verdict.
//!
//! The thresholds are provisional defaults carried over from the legacy tool.
//! Nothing validates them as detection science; they are configurable so an
//! investigator can tune them per case.

use serde::{Deserialize, Serialize};

use super::record::TrafficCounters;

/// Default SYN/SYN-ACK ratio above which a SYN flood is suspected
pub const DEFAULT_SYN_ACK_RATIO: f64 = 4.0;
/// Default SYN count that flags a flood when no SYN-ACK was seen at all
pub const DEFAULT_SYN_ONLY_COUNT: u64 = 1000;
/// Default divisor applied to the TCP/UDP totals in the proportionality check
pub const DEFAULT_PROPORTIONALITY_DIVISOR: f64 = 2.0;

/// Tunable detection thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Flood if `syn / syn_ack` is strictly greater than this
    pub syn_ack_ratio: f64,
    /// Flood if no SYN-ACK was seen and `syn` is strictly greater than this
    pub syn_only_count: u64,
    /// Flood if the handshake-related volume is below `total / divisor`
    pub proportionality_divisor: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            syn_ack_ratio: DEFAULT_SYN_ACK_RATIO,
            syn_only_count: DEFAULT_SYN_ONLY_COUNT,
            proportionality_divisor: DEFAULT_PROPORTIONALITY_DIVISOR,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.syn_ack_ratio.is_finite() && self.syn_ack_ratio > 0.0) {
            return Err(format!("syn_ack_ratio must be positive, got {}", self.syn_ack_ratio));
        }
        if !(self.proportionality_divisor.is_finite() && self.proportionality_divisor > 0.0) {
            return Err(format!(
                "proportionality_divisor must be positive, got {}",
                self.proportionality_divisor
            ));
        }
        Ok(())
    }
}

// =============================================================================
// SYN/ACK ratio check
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynAckVerdict {
    #[serde(rename = "SYN-flood suspected")]
    FloodSuspected,
    #[serde(rename = "within threshold")]
    WithinThreshold,
}

impl SynAckVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            SynAckVerdict::FloodSuspected => "SYN-flood suspected",
            SynAckVerdict::WithinThreshold => "within threshold",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SYN-flood suspected" => Some(SynAckVerdict::FloodSuspected),
            "within threshold" => Some(SynAckVerdict::WithinThreshold),
            _ => None,
        }
    }

    pub fn is_alert(&self) -> bool {
        matches!(self, SynAckVerdict::FloodSuspected)
    }
}

/// Result of the SYN/ACK ratio check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynAckAssessment {
    /// `syn / syn_ack`, or 0 when no SYN-ACK was seen
    pub ratio: f64,
    /// False when `syn_ack` was 0 and the ratio is undefined
    pub defined: bool,
    pub verdict: SynAckVerdict,
}

impl SynAckAssessment {
    /// The undefined ratio prints as a bare "0"; every defined ratio
    /// (including a real zero) prints with four decimals.
    pub fn ratio_display(&self) -> String {
        if self.defined {
            format!("{:.4}", self.ratio)
        } else {
            "0".to_string()
        }
    }

    /// Investigator-facing explanation of the verdict
    pub fn detail(&self) -> &'static str {
        match (self.verdict, self.defined) {
            (SynAckVerdict::FloodSuspected, true) => {
                "SYN-ACK ratio above threshold. Possible SYN flood attack."
            }
            (SynAckVerdict::FloodSuspected, false) => {
                "No SYN-ACK replies to a large SYN volume. Possible SYN flood attack."
            }
            (SynAckVerdict::WithinThreshold, _) => "SYN-ACK ratio within threshold.",
        }
    }
}

/// SYN/ACK ratio check.
///
/// Flood is suspected when the ratio exceeds the ratio threshold, or when no
/// SYN-ACK was seen and the SYN count exceeds the SYN-only threshold.
pub fn assess_syn_ack(syn_count: u64, syn_ack_count: u64, thresholds: &Thresholds) -> SynAckAssessment {
    let defined = syn_ack_count > 0;
    let ratio = if defined {
        syn_count as f64 / syn_ack_count as f64
    } else {
        0.0
    };

    let flood = ratio > thresholds.syn_ack_ratio
        || (!defined && syn_count > thresholds.syn_only_count);

    SynAckAssessment {
        ratio,
        defined,
        verdict: if flood {
            SynAckVerdict::FloodSuspected
        } else {
            SynAckVerdict::WithinThreshold
        },
    }
}

// =============================================================================
// Proportionality check
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProportionalityVerdict {
    #[serde(rename = "possible TCP flood")]
    TcpFlood,
    #[serde(rename = "possible UDP flood")]
    UdpFlood,
    #[serde(rename = "proportional")]
    Proportional,
}

impl ProportionalityVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProportionalityVerdict::TcpFlood => "possible TCP flood",
            ProportionalityVerdict::UdpFlood => "possible UDP flood",
            ProportionalityVerdict::Proportional => "proportional",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "possible TCP flood" => Some(ProportionalityVerdict::TcpFlood),
            "possible UDP flood" => Some(ProportionalityVerdict::UdpFlood),
            "proportional" => Some(ProportionalityVerdict::Proportional),
            _ => None,
        }
    }

    pub fn is_alert(&self) -> bool {
        !matches!(self, ProportionalityVerdict::Proportional)
    }
}

/// Handshake-related volume compared against the protocol totals
pub fn proportionality_value(counters: &TrafficCounters) -> u64 {
    counters.http + counters.syn + counters.syn_ack + counters.ack
}

/// Proportionality check.
///
/// The TCP branch is evaluated first and wins whenever the value is below
/// both cut-offs. Keep that order.
pub fn assess_proportionality(counters: &TrafficCounters, thresholds: &Thresholds) -> ProportionalityVerdict {
    let value = proportionality_value(counters) as f64;
    let divisor = thresholds.proportionality_divisor;

    if value < counters.tcp as f64 / divisor {
        ProportionalityVerdict::TcpFlood
    } else if value < counters.udp as f64 / divisor {
        ProportionalityVerdict::UdpFlood
    } else {
        ProportionalityVerdict::Proportional
    }
}
