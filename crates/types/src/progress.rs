// crates/types/src/progress.rs
//! Configuration for client-synthesized progress interpolation.

use serde::{Deserialize, Serialize};

/// Thresholds governing how far displayed progress may run ahead of the
/// last real measurement. Servers may override any of these per job via
/// the start response; the defaults match product tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressConfig {
    /// Ceiling the startup ramp climbs toward (percent).
    pub startup_target_pct: u8,
    /// Duration of the startup ramp.
    pub startup_duration_ms: u64,
    /// Post-startup synthetic increment size (percent).
    pub increment_pct: u8,
    /// Minimum gap between synthetic increments.
    pub increment_interval_ms: u64,
    /// Maximum lead of synthetic over real progress once past startup.
    pub max_lead_pct: u8,
    /// Synthetic progress never exceeds this without a real measurement.
    pub ceiling_pct: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            startup_target_pct: 30,
            startup_duration_ms: 45_000,
            increment_pct: 1,
            increment_interval_ms: 30_000,
            max_lead_pct: 10,
            ceiling_pct: 85,
        }
    }
}
