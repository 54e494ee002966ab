//! Status-refresh strategies
//!
//! The monitor owns the tick/phase skeleton; a strategy decides what
//! re-evaluating liveness means and which replies, if any, it listens to.

use crate::config::StrategyKind;
use crate::monitor::state::{Liveness, LivenessState, StatusDisplay};
use crate::transport::{StatusReply, StatusRequest, Transport, LATEST_QUOTAS};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Inputs to one status-refresh action
pub struct RefreshContext<'a> {
    pub now: DateTime<Utc>,
    /// Silence measured from the strategy's anchor
    pub elapsed_seconds: f64,
    /// `check interval * deadline phase`
    pub deadline_seconds: f64,
    pub transport: &'a dyn Transport,
}

pub trait RefreshStrategy: Send {
    fn kind(&self) -> StrategyKind;

    /// Moment the phase clock measures silence from
    fn anchor(&self, state: &LivenessState) -> DateTime<Utc> {
        state.last_data_at.unwrap_or(state.started_at)
    }

    /// Re-evaluate liveness. Counts as one status update.
    fn refresh(&mut self, state: &mut LivenessState, ctx: &RefreshContext<'_>);

    /// Request kind whose replies this strategy honors
    fn awaited_reply(&self) -> Option<&'static str> {
        None
    }

    /// Fold a matching reply into the state
    fn on_reply(&mut self, _state: &mut LivenessState, _reply: &StatusReply, _now: DateTime<Utc>) {}
}

/// Liveness inferred from how long telemetry has been silent
#[derive(Debug, Clone, Copy, Default)]
pub struct PassiveRefresh;

impl RefreshStrategy for PassiveRefresh {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Passive
    }

    fn refresh(&mut self, state: &mut LivenessState, ctx: &RefreshContext<'_>) {
        if ctx.elapsed_seconds > ctx.deadline_seconds {
            state.set_liveness(Liveness::Offline, StatusDisplay::AssumeOffline);
        } else {
            state.set_liveness(Liveness::Online, StatusDisplay::AssumeOnline);
        }
        state.last_status_update_at = Some(ctx.now);
        state.update_count += 1;
    }
}

/// Liveness taken from replies to explicit status requests
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveRefresh;

impl RefreshStrategy for ActiveRefresh {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Active
    }

    /// Telemetry first, then the last status reply, then monitor start
    fn anchor(&self, state: &LivenessState) -> DateTime<Utc> {
        state
            .last_data_at
            .or(state.last_status_update_at)
            .unwrap_or(state.started_at)
    }

    /// Liveness stays as it is until the reply lands
    fn refresh(&mut self, state: &mut LivenessState, ctx: &RefreshContext<'_>) {
        state.update_count += 1;
        let request = StatusRequest::latest_quotas();
        debug!(device_id = %state.device_id, request = request.request_kind(), "sending status request");
        ctx.transport.send_request(&request);
    }

    fn awaited_reply(&self) -> Option<&'static str> {
        Some(LATEST_QUOTAS)
    }

    // No sequence numbers: a late reply to an older request still wins.
    fn on_reply(&mut self, state: &mut LivenessState, reply: &StatusReply, now: DateTime<Utc>) {
        if reply.online {
            if let Some(device_id) = &reply.device_id {
                state.device_id = device_id.clone();
            }
            state.set_liveness(Liveness::Online, StatusDisplay::Online);
        } else {
            state.set_liveness(Liveness::Offline, StatusDisplay::Offline);
        }
        state.last_status_update_at = Some(now);
    }
}
