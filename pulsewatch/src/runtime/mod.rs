//! Single-owner task per monitored device
//!
//! Telemetry arrivals, status replies and timer ticks all reach a
//! [`Monitor`] through one task, so they are applied one at a time in
//! arrival order. Tearing a monitor down stops its timer and closes its
//! event channel in the same step.

pub mod registry;

use crate::error::MonitorError;
use crate::monitor::state::StatusSnapshot;
use crate::monitor::Monitor;
use crate::telemetry::DataArrival;
use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

enum MonitorEvent {
    Data(DataArrival),
    Reply(Vec<Value>),
    Snapshot(oneshot::Sender<StatusSnapshot>),
    Shutdown,
}

/// Handle to a running monitor task
pub struct MonitorHandle {
    device_id: String,
    events: mpsc::UnboundedSender<MonitorEvent>,
    snapshots: watch::Receiver<StatusSnapshot>,
    task: Option<JoinHandle<()>>,
}

/// Start `monitor` on the current tokio runtime. The first evaluation runs
/// immediately; checks follow every check interval.
pub fn spawn(monitor: Monitor) -> MonitorHandle {
    let device_id = monitor.state().device_id.clone();
    let snapshots = monitor.watch();
    let period = monitor.check_interval();
    let (events, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(monitor, rx, period));
    MonitorHandle {
        device_id,
        events,
        snapshots,
        task: Some(task),
    }
}

async fn run(
    mut monitor: Monitor,
    mut events: mpsc::UnboundedReceiver<MonitorEvent>,
    period: Duration,
) {
    monitor.start(Utc::now());

    let mut ticks = time::interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Events and ticks are polled fairly.
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(MonitorEvent::Data(arrival)) => {
                    trace!(
                        device_id = %arrival.device_id,
                        stamped = %arrival.received_at,
                        "data arrival"
                    );
                    monitor.on_data(Utc::now());
                }
                Some(MonitorEvent::Reply(payloads)) => monitor.on_reply(&payloads, Utc::now()),
                Some(MonitorEvent::Snapshot(reply)) => {
                    let _ = reply.send(monitor.snapshot());
                }
                Some(MonitorEvent::Shutdown) | None => break,
            },
            _ = ticks.tick() => monitor.on_tick(Utc::now()),
        }
    }

    info!(device_id = %monitor.state().device_id, "monitoring stopped");
}

impl MonitorHandle {
    /// Device id the monitor was registered under
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some() && !self.events.is_closed()
    }

    /// Telemetry arrived. The monitor stamps it with the same clock its
    /// ticks use; `arrival.received_at` is not trusted.
    pub fn data_arrived(&self, arrival: DataArrival) -> Result<(), MonitorError> {
        self.send(MonitorEvent::Data(arrival))
    }

    pub fn reply_received(&self, payloads: Vec<Value>) -> Result<(), MonitorError> {
        self.send(MonitorEvent::Reply(payloads))
    }

    /// Snapshot taken after every event queued before this call
    pub async fn snapshot(&self) -> Result<StatusSnapshot, MonitorError> {
        let (tx, rx) = oneshot::channel();
        self.send(MonitorEvent::Snapshot(tx))?;
        rx.await.map_err(|_| self.closed())
    }

    /// Latest published snapshot, without waiting for queued events
    pub fn current_snapshot(&self) -> StatusSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<StatusSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the monitor and wait for its task. Events queued before the
    /// call are still applied; later sends fail with `Closed`. Safe to call
    /// more than once.
    pub async fn shutdown(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        let _ = self.events.send(MonitorEvent::Shutdown);
        if let Err(e) = task.await {
            debug!(device_id = %self.device_id, error = %e, "monitor task ended abnormally");
        }
    }

    fn send(&self, event: MonitorEvent) -> Result<(), MonitorError> {
        if self.task.is_none() {
            return Err(self.closed());
        }
        self.events.send(event).map_err(|_| self.closed())
    }

    fn closed(&self) -> MonitorError {
        MonitorError::Closed(self.device_id.clone())
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
