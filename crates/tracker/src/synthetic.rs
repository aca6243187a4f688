// crates/tracker/src/synthetic.rs
//! Client-synthesized progress interpolation.
//!
//! Real progress arrives every poll interval (up to 30 s apart), which
//! reads as a frozen bar. Between real updates the displayed value is
//! allowed to creep ahead under strict caps. All timing is passed in as
//! epoch ms so the state machine is deterministic under test.

use respond_types::{JobStatus, ProgressConfig};

/// Which regime the interpolation is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticPhase {
    /// Initial ramp toward `startup_target_pct` over `startup_duration_ms`.
    Startup,
    /// Post-startup: small increments, capped lead over real progress.
    Processing,
}

/// Per-job synthetic progress state. Lives only in the in-memory tracked
/// entry; never persisted.
#[derive(Debug, Clone)]
pub struct SyntheticProgress {
    current: u8,
    phase: SyntheticPhase,
    started_at: i64,
    last_increment_at: i64,
    /// Last real measurement reported by the server.
    real: u8,
    config: ProgressConfig,
}

impl SyntheticProgress {
    pub fn new(config: ProgressConfig, now: i64) -> Self {
        Self {
            current: 0,
            phase: SyntheticPhase::Startup,
            started_at: now,
            last_increment_at: now,
            real: 0,
            config,
        }
    }

    /// Displayed progress value.
    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn phase(&self) -> SyntheticPhase {
        self.phase
    }

    /// Record a real measurement. A real value above the current
    /// synthetic value overrides it immediately; a lower one only raises
    /// the floor future synthetic values may not regress below.
    pub fn observe_real(&mut self, real: u8) -> u8 {
        self.real = self.real.max(real.min(100));
        if self.real > self.current {
            self.current = self.real;
        }
        if self.real >= self.config.startup_target_pct {
            self.phase = SyntheticPhase::Processing;
        }
        self.current
    }

    /// Advance the interpolation to `now`. Returns the displayed value.
    /// Monotone while the job is non-terminal.
    pub fn tick(&mut self, now: i64, status: JobStatus) -> u8 {
        if status.is_terminal() {
            // Completion snaps to 100; every other terminal freezes.
            if status == JobStatus::Completed {
                self.current = 100;
            }
            return self.current;
        }

        match self.phase {
            SyntheticPhase::Startup => {
                let elapsed = now.saturating_sub(self.started_at);
                let duration = self.config.startup_duration_ms.max(1) as i64;
                let target = self.config.startup_target_pct as i64;
                let ramp = (elapsed.min(duration) * target / duration) as u8;
                if ramp > self.current {
                    self.current = ramp;
                }
                if elapsed >= duration {
                    self.phase = SyntheticPhase::Processing;
                    self.last_increment_at = now;
                }
            }
            SyntheticPhase::Processing => {
                let due =
                    now.saturating_sub(self.last_increment_at)
                        >= self.config.increment_interval_ms as i64;
                if due {
                    let cap = self
                        .real
                        .saturating_add(self.config.max_lead_pct)
                        .min(self.config.ceiling_pct);
                    let next = self.current.saturating_add(self.config.increment_pct);
                    if next <= cap {
                        self.current = next;
                        self.last_increment_at = now;
                    }
                }
            }
        }
        self.current
    }
}
