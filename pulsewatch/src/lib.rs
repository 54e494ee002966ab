//! pulsewatch - liveness monitoring for devices that stream telemetry
//!
//! A device is considered reachable while its telemetry keeps flowing. When
//! it goes quiet, a recurring check turns the length of the silence into a
//! discrete *phase* and escalates:
//! - check phases re-evaluate the online/offline status
//! - connect phases ask the transport to reconnect
//! - the deadline phase forces a final re-evaluation on every tick
//!
//! Two strategies decide what "re-evaluate" means:
//! - **passive**: infer liveness from how long the device has been silent
//! - **active**: send a `latestQuotas` status request and trust the reply
//!
//! Each device is owned by one [`runtime`] task; telemetry, status replies
//! and timer ticks are funneled through its event channel so state changes
//! never interleave. Every change is pushed to the registered
//! [`StatusObserver`]s and is available as a [`StatusSnapshot`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use pulsewatch::{KnownDevice, Monitor, MonitorConfig, Transport, StatusRequest};
//!
//! struct Mqtt;
//! impl Transport for Mqtt {
//!     fn reconnect(&self) {}
//!     fn send_request(&self, _request: &StatusRequest) {}
//! }
//!
//! # async fn demo() -> Result<(), pulsewatch::ConfigError> {
//! let config = MonitorConfig::default();
//! let device = KnownDevice::new("R331ZEB4ZEA0012", None);
//! let monitor = Monitor::new(&config, &device, Arc::new(Mqtt), chrono::Utc::now())?;
//! let handle = pulsewatch::runtime::spawn(monitor);
//! println!("{:?}", handle.current_snapshot());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod monitor;
pub mod runtime;
pub mod telemetry;
pub mod transport;

pub use config::{MonitorConfig, StrategyKind};
pub use error::{ConfigError, MonitorError, RegistryError, ReplyError};
pub use monitor::phase::{Escalation, EscalationPlan, PhaseClock};
pub use monitor::publisher::{ChannelObserver, StatusObserver, StatusPublisher};
pub use monitor::state::{Liveness, LivenessState, StatusDisplay, StatusSnapshot};
pub use monitor::strategy::{ActiveRefresh, PassiveRefresh, RefreshContext, RefreshStrategy};
pub use monitor::Monitor;
pub use runtime::registry::MonitorRegistry;
pub use runtime::MonitorHandle;
pub use telemetry::{DataArrival, KnownDevice, TelemetrySource};
pub use transport::{StatusReply, StatusRequest, Transport, LATEST_QUOTAS};
