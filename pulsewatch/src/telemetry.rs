use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a monitored device's telemetry comes from
pub trait TelemetrySource: Send + Sync {
    /// Identifier of the device producing the telemetry
    fn device_id(&self) -> String;

    /// Timestamp of the most recent telemetry, if any was ever received
    fn last_data_at(&self) -> Option<DateTime<Utc>>;
}

/// Source whose identity and last timestamp are known up front
#[derive(Debug, Clone)]
pub struct KnownDevice {
    device_id: String,
    last_data_at: Option<DateTime<Utc>>,
}

impl KnownDevice {
    pub fn new(device_id: impl Into<String>, last_data_at: Option<DateTime<Utc>>) -> Self {
        Self {
            device_id: device_id.into(),
            last_data_at,
        }
    }
}

impl TelemetrySource for KnownDevice {
    fn device_id(&self) -> String {
        self.device_id.clone()
    }

    fn last_data_at(&self) -> Option<DateTime<Utc>> {
        self.last_data_at
    }
}

/// One telemetry payload arriving for a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataArrival {
    pub device_id: String,
    pub received_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
}

impl DataArrival {
    pub fn new(device_id: impl Into<String>, received_at: DateTime<Utc>, payload: Value) -> Self {
        Self {
            device_id: device_id.into(),
            received_at,
            payload,
        }
    }

    /// Arrival stamped with the current time
    pub fn now(device_id: impl Into<String>, payload: Value) -> Self {
        Self::new(device_id, Utc::now(), payload)
    }
}
