//! Phase clock and escalation plan
//!
//! A phase is the number of check intervals a device has been silent for,
//! rounded up: `phase = ceil(elapsed / interval)`. The plan maps a phase to
//! the action a tick landing on it asks for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Action implied by a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    /// Re-evaluate liveness (check phase, or at/after the deadline)
    Refresh,
    /// Ask the transport to reconnect
    Reconnect,
    /// Nothing to do on this tick
    Quiet,
}

impl fmt::Display for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Escalation::Refresh => "refresh",
            Escalation::Reconnect => "reconnect",
            Escalation::Quiet => "quiet",
        })
    }
}

/// Check phases, connect phases and the deadline phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationPlan {
    check_phases: Vec<u32>,
    connect_phases: Vec<u32>,
    deadline_phase: u32,
}

impl EscalationPlan {
    pub fn new(mut check_phases: Vec<u32>, mut connect_phases: Vec<u32>, deadline_phase: u32) -> Self {
        check_phases.sort_unstable();
        check_phases.dedup();
        connect_phases.sort_unstable();
        connect_phases.dedup();
        Self {
            check_phases,
            connect_phases,
            deadline_phase,
        }
    }

    /// Check phases win over connect phases; anything at or past the
    /// deadline is a refresh.
    pub fn action(&self, phase: u32) -> Escalation {
        if self.check_phases.contains(&phase) || phase >= self.deadline_phase {
            Escalation::Refresh
        } else if self.connect_phases.contains(&phase) {
            Escalation::Reconnect
        } else {
            Escalation::Quiet
        }
    }

    pub fn check_phases(&self) -> &[u32] {
        &self.check_phases
    }

    pub fn connect_phases(&self) -> &[u32] {
        &self.connect_phases
    }

    pub fn deadline_phase(&self) -> u32 {
        self.deadline_phase
    }
}

/// Converts silence into a phase on a fixed cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseClock {
    interval: Duration,
}

impl PhaseClock {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Seconds between `since` and `now`; negative under clock skew
    pub fn elapsed_seconds(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        now.signed_duration_since(since).num_milliseconds() as f64 / 1000.0
    }

    /// `ceil(elapsed / interval)`, 0 when nothing has elapsed
    pub fn phase(&self, elapsed_seconds: f64) -> u32 {
        let interval = self.interval.as_secs_f64();
        if elapsed_seconds.is_nan() || elapsed_seconds <= 0.0 || interval <= 0.0 {
            return 0;
        }
        let phase = (elapsed_seconds / interval).ceil();
        if phase >= u32::MAX as f64 {
            u32::MAX
        } else {
            phase as u32
        }
    }

    /// Silence after which a refresh declares the device offline
    pub fn deadline_seconds(&self, deadline_phase: u32) -> f64 {
        self.interval.as_secs_f64() * deadline_phase as f64
    }
}
