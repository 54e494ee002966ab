use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Online/offline classification of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Unknown, // Not evaluated yet
    Online,
    Offline,
}

/// Value shown by the status entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusDisplay {
    Unknown,
    AssumeOnline,  // Inferred from telemetry silence
    AssumeOffline, // Inferred from telemetry silence
    Online,        // Confirmed by a status reply
    Offline,       // Confirmed by a status reply
}

impl StatusDisplay {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusDisplay::Unknown => "unknown",
            StatusDisplay::AssumeOnline => "assume_online",
            StatusDisplay::AssumeOffline => "assume_offline",
            StatusDisplay::Online => "online",
            StatusDisplay::Offline => "offline",
        }
    }
}

impl fmt::Display for StatusDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Liveness of one monitored device. Owned by exactly one monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct LivenessState {
    pub device_id: String,
    pub liveness: Liveness,
    pub display: StatusDisplay,
    /// When monitoring started
    pub started_at: DateTime<Utc>,
    /// Last telemetry arrival, `None` if the device never reported
    pub last_data_at: Option<DateTime<Utc>>,
    pub last_status_update_at: Option<DateTime<Utc>>,
    pub update_count: u64,
    pub reconnect_count: u64,
    pub phase: u32,
}

impl LivenessState {
    pub fn new(
        device_id: impl Into<String>,
        last_data_at: Option<DateTime<Utc>>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            liveness: Liveness::Unknown,
            display: StatusDisplay::Unknown,
            started_at,
            last_data_at,
            last_status_update_at: None,
            update_count: 0,
            reconnect_count: 0,
            phase: 0,
        }
    }

    pub fn is_online(&self) -> bool {
        self.liveness == Liveness::Online
    }

    /// Set liveness and display value. A transition resets the phase.
    /// Returns whether liveness changed.
    pub fn set_liveness(&mut self, liveness: Liveness, display: StatusDisplay) -> bool {
        self.display = display;
        if self.liveness == liveness {
            return false;
        }
        self.liveness = liveness;
        self.phase = 0;
        true
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            device_id: self.device_id.clone(),
            liveness: self.liveness,
            display: self.display,
            last_data_at: self.last_data_at,
            last_status_update_at: self.last_status_update_at,
            update_count: self.update_count,
            reconnect_count: self.reconnect_count,
            phase: self.phase,
        }
    }
}

/// Immutable copy of a device's liveness handed to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub device_id: String,
    pub liveness: Liveness,
    pub display: StatusDisplay,
    pub last_data_at: Option<DateTime<Utc>>,
    pub last_status_update_at: Option<DateTime<Utc>>,
    pub update_count: u64,
    pub reconnect_count: u64,
    pub phase: u32,
}

impl StatusSnapshot {
    pub fn is_online(&self) -> bool {
        self.liveness == Liveness::Online
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_state_is_unknown() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let state = LivenessState::new("dev-1", None, now);
        assert_eq!(state.liveness, Liveness::Unknown);
        assert_eq!(state.display, StatusDisplay::Unknown);
        assert_eq!(state.update_count, 0);
        assert_eq!(state.reconnect_count, 0);
        assert_eq!(state.phase, 0);
        assert!(!state.is_online());
    }

    #[test]
    fn test_transition_resets_phase() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut state = LivenessState::new("dev-1", Some(now), now);
        state.liveness = Liveness::Online;
        state.phase = 4;

        assert!(!state.set_liveness(Liveness::Online, StatusDisplay::AssumeOnline));
        assert_eq!(state.phase, 4);

        assert!(state.set_liveness(Liveness::Offline, StatusDisplay::AssumeOffline));
        assert_eq!(state.phase, 0);
        assert_eq!(state.display, StatusDisplay::AssumeOffline);
    }

    #[test]
    fn test_snapshot_serializes_snake_case() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut state = LivenessState::new("dev-1", Some(now), now);
        state.set_liveness(Liveness::Online, StatusDisplay::AssumeOnline);
        let json = serde_json::to_value(state.snapshot()).unwrap();
        assert_eq!(json["liveness"], "online");
        assert_eq!(json["display"], "assume_online");
        assert_eq!(json["device_id"], "dev-1");
    }
}
