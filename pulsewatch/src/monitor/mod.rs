//! Liveness state machine for one device
//!
//! [`Monitor`] is synchronous and takes the current time as an argument, so
//! it can be driven by the [`runtime`](crate::runtime) task or stepped
//! directly. Each event that changes the state publishes exactly one
//! snapshot.

pub mod phase;
pub mod publisher;
pub mod state;
pub mod strategy;

use crate::config::{MonitorConfig, StrategyKind};
use crate::error::ConfigError;
use crate::telemetry::TelemetrySource;
use crate::transport::{StatusReply, Transport};
use chrono::{DateTime, Utc};
use phase::{Escalation, EscalationPlan, PhaseClock};
use publisher::{StatusObserver, StatusPublisher};
use serde_json::Value;
use state::{Liveness, LivenessState, StatusSnapshot};
use std::sync::Arc;
use std::time::Duration;
use strategy::{RefreshContext, RefreshStrategy};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

pub struct Monitor {
    state: LivenessState,
    clock: PhaseClock,
    plan: EscalationPlan,
    strategy: Box<dyn RefreshStrategy>,
    transport: Arc<dyn Transport>,
    publisher: StatusPublisher,
}

impl Monitor {
    /// Monitor for the device behind `source`, using the configured strategy.
    /// Fails if `config` does not validate.
    pub fn new(
        config: &MonitorConfig,
        source: &dyn TelemetrySource,
        transport: Arc<dyn Transport>,
        now: DateTime<Utc>,
    ) -> Result<Self, ConfigError> {
        let state = LivenessState::new(source.device_id(), source.last_data_at(), now);
        Self::with_strategy(config, config.strategy.build(), state, transport)
    }

    pub fn with_strategy(
        config: &MonitorConfig,
        strategy: Box<dyn RefreshStrategy>,
        state: LivenessState,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let publisher = StatusPublisher::new(state.snapshot());
        Ok(Self {
            state,
            clock: config.phase_clock(),
            plan: config.escalation_plan(),
            strategy,
            transport,
            publisher,
        })
    }

    pub fn subscribe(&mut self, observer: Arc<dyn StatusObserver>) {
        self.publisher.subscribe(observer);
    }

    pub fn watch(&self) -> watch::Receiver<StatusSnapshot> {
        self.publisher.watch()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.state.snapshot()
    }

    pub fn state(&self) -> &LivenessState {
        &self.state
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn check_interval(&self) -> Duration {
        self.clock.interval()
    }

    pub fn plan(&self) -> &EscalationPlan {
        &self.plan
    }

    /// Number of snapshots published so far
    pub fn published(&self) -> u64 {
        self.publisher.published()
    }

    /// First evaluation when monitoring starts. Only runs while the state
    /// is still unknown.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.state.liveness != Liveness::Unknown {
            return;
        }
        let elapsed = self.elapsed_seconds(now);
        info!(
            device_id = %self.state.device_id,
            strategy = %self.strategy.kind(),
            elapsed,
            "monitoring started"
        );
        self.refresh(now, elapsed);
        self.publish();
    }

    /// Telemetry arrived. Brings a device back online without waiting for
    /// the next tick.
    pub fn on_data(&mut self, now: DateTime<Utc>) {
        self.state.last_data_at = Some(now);
        self.state.phase = 0;
        if !self.state.is_online() {
            debug!(device_id = %self.state.device_id, "data while not online, refreshing");
            self.refresh(now, 0.0);
        }
        self.publish();
    }

    /// Periodic check. Escalation only happens while online.
    pub fn on_tick(&mut self, now: DateTime<Utc>) {
        let elapsed = self.elapsed_seconds(now);
        if elapsed < 0.0 {
            trace!(device_id = %self.state.device_id, elapsed, "clock skew, clamping phase to 0");
        }
        let phase = self.clock.phase(elapsed);
        let phase_changed = phase != self.state.phase;
        self.state.phase = phase;

        if !self.state.is_online() {
            trace!(device_id = %self.state.device_id, phase, "not online, tick ignored");
            if phase_changed {
                self.publish();
            }
            return;
        }

        match self.plan.action(phase) {
            Escalation::Refresh => {
                debug!(device_id = %self.state.device_id, phase, elapsed, "refreshing status");
                self.refresh(now, elapsed);
                self.publish();
            }
            Escalation::Reconnect => {
                self.state.reconnect_count += 1;
                warn!(
                    device_id = %self.state.device_id,
                    phase,
                    reconnects = self.state.reconnect_count,
                    "telemetry stale, reconnecting"
                );
                self.transport.reconnect();
                self.publish();
            }
            Escalation::Quiet => {
                trace!(device_id = %self.state.device_id, phase, "quiet tick");
                if phase_changed {
                    self.publish();
                }
            }
        }
    }

    /// Asynchronous status reply. Anything the strategy isn't waiting for,
    /// or that doesn't parse, is dropped without touching the state.
    pub fn on_reply(&mut self, payloads: &[Value], now: DateTime<Utc>) {
        let Some(kind) = self.strategy.awaited_reply() else {
            trace!(device_id = %self.state.device_id, "strategy ignores status replies");
            return;
        };
        match StatusReply::parse(payloads, kind) {
            Ok(reply) => {
                let was = self.state.liveness;
                self.strategy.on_reply(&mut self.state, &reply, now);
                if was != self.state.liveness {
                    info!(
                        device_id = %self.state.device_id,
                        liveness = ?self.state.liveness,
                        "status reply changed liveness"
                    );
                }
                self.publish();
            }
            Err(e) => {
                debug!(device_id = %self.state.device_id, error = %e, "discarding status reply");
            }
        }
    }

    fn elapsed_seconds(&self, now: DateTime<Utc>) -> f64 {
        PhaseClock::elapsed_seconds(self.strategy.anchor(&self.state), now)
    }

    fn refresh(&mut self, now: DateTime<Utc>, elapsed_seconds: f64) {
        let was = self.state.liveness;
        let ctx = RefreshContext {
            now,
            elapsed_seconds,
            deadline_seconds: self.clock.deadline_seconds(self.plan.deadline_phase()),
            transport: self.transport.as_ref(),
        };
        self.strategy.refresh(&mut self.state, &ctx);
        if was != self.state.liveness {
            info!(
                device_id = %self.state.device_id,
                liveness = ?self.state.liveness,
                display = %self.state.display,
                "liveness changed"
            );
        }
    }

    fn publish(&mut self) {
        self.publisher.publish(self.state.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::KnownDevice;
    use crate::transport::StatusRequest;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct Counting {
        reconnects: AtomicU64,
        requests: AtomicU64,
    }

    impl Transport for Counting {
        fn reconnect(&self) {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
        }

        fn send_request(&self, _request: &StatusRequest) {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        t0() + chrono::Duration::seconds(seconds)
    }

    fn monitor(strategy: StrategyKind) -> (Monitor, Arc<Counting>) {
        let config = MonitorConfig {
            strategy,
            ..MonitorConfig::default()
        };
        let transport = Arc::new(Counting::default());
        let device = KnownDevice::new("dev-1", Some(t0()));
        let monitor = Monitor::new(&config, &device, transport.clone(), t0()).unwrap();
        (monitor, transport)
    }

    #[test]
    fn test_start_is_idempotent() {
        let (mut monitor, _) = monitor(StrategyKind::Passive);
        monitor.start(t0());
        monitor.start(at(5));
        assert_eq!(monitor.state().update_count, 1);
        assert_eq!(monitor.published(), 1);
    }

    #[test]
    fn test_start_offline_after_long_silence() {
        let (mut monitor, _) = monitor(StrategyKind::Passive);
        monitor.start(at(301));
        assert_eq!(monitor.state().liveness, Liveness::Offline);
    }

    #[test]
    fn test_quiet_tick_publishes_only_phase_changes() {
        let (mut monitor, transport) = monitor(StrategyKind::Passive);
        monitor.start(t0());
        monitor.on_tick(at(30));
        assert_eq!(monitor.state().phase, 1);
        assert_eq!(monitor.published(), 2);
        monitor.on_tick(at(30));
        assert_eq!(monitor.published(), 2);
        assert_eq!(transport.reconnects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_offline_tick_recomputes_phase_without_escalating() {
        let (mut monitor, transport) = monitor(StrategyKind::Passive);
        monitor.start(at(400));
        assert_eq!(monitor.state().liveness, Liveness::Offline);
        monitor.on_tick(at(450));
        assert_eq!(monitor.state().phase, 15);
        assert_eq!(monitor.state().reconnect_count, 0);
        assert_eq!(transport.reconnects.load(Ordering::SeqCst), 0);
        assert_eq!(monitor.state().update_count, 1);
    }

    #[test]
    fn test_passive_ignores_replies() {
        let (mut monitor, _) = monitor(StrategyKind::Passive);
        monitor.start(t0());
        let before = monitor.published();
        monitor.on_reply(
            &[json!({"operateType": "latestQuotas", "data": {"online": 0}})],
            at(1),
        );
        assert_eq!(monitor.published(), before);
        assert!(monitor.state().is_online());
    }

    #[test]
    fn test_active_data_while_not_online_requests_status() {
        let (mut monitor, transport) = monitor(StrategyKind::Active);
        monitor.start(t0());
        assert_eq!(transport.requests.load(Ordering::SeqCst), 1);
        monitor.on_data(at(10));
        assert_eq!(transport.requests.load(Ordering::SeqCst), 2);
        assert_eq!(monitor.state().liveness, Liveness::Unknown);
        assert_eq!(monitor.state().update_count, 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let device = KnownDevice::new("dev-1", Some(t0()));
        let config = MonitorConfig {
            check_interval_seconds: 0,
            ..MonitorConfig::default()
        };
        let result = Monitor::new(&config, &device, Arc::new(Counting::default()), t0());
        assert!(matches!(result, Err(ConfigError::ZeroInterval)));

        let config = MonitorConfig {
            connect_phases: vec![3, 12],
            ..MonitorConfig::default()
        };
        let result = Monitor::new(&config, &device, Arc::new(Counting::default()), t0());
        assert!(matches!(
            result,
            Err(ConfigError::PhaseBeyondDeadline { phase: 12, deadline: 10 })
        ));
    }

    #[test]
    fn test_skewed_tick_is_phase_zero() {
        let (mut monitor, _) = monitor(StrategyKind::Passive);
        monitor.start(t0());
        monitor.on_tick(t0() - chrono::Duration::seconds(20));
        assert_eq!(monitor.state().phase, 0);
        assert!(monitor.state().is_online());
    }
}
