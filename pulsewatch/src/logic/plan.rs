use chrono::{DateTime, Duration, Utc};
use colored::*;
use pulsewatch::{
    ConfigError, KnownDevice, Liveness, Monitor, MonitorConfig, StatusRequest, StatusSnapshot,
    StrategyKind, Transport, LATEST_QUOTAS,
};
use serde_json::json;
use std::sync::Arc;

/// Transport that goes nowhere
struct DryRun;

impl Transport for DryRun {
    fn reconnect(&self) {}
    fn send_request(&self, _request: &StatusRequest) {}
}

/// What a single simulated tick did
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub at_seconds: i64,
    pub phase: u32,
    pub action: &'static str,
    pub snapshot: StatusSnapshot,
}

/// Step an online device through `silence` seconds without telemetry,
/// ticking every check interval plus once at the end of the silence.
pub fn simulate(config: &MonitorConfig, silence: u64) -> Result<Vec<PlanStep>, ConfigError> {
    let t0 = Utc::now();
    let device = KnownDevice::new("simulated", Some(t0));
    let mut monitor = Monitor::new(config, &device, Arc::new(DryRun), t0)?;
    monitor.start(t0);
    if config.strategy == StrategyKind::Active {
        // the bootstrap request is answered right away
        monitor.on_reply(
            &[json!({"operateType": LATEST_QUOTAS, "data": {"online": 1, "sn": "simulated"}})],
            t0,
        );
    }

    let interval = config.check_interval_seconds.max(1) as i64;
    let silence = silence as i64;
    let mut ticks: Vec<i64> = (1..).map(|k| k * interval).take_while(|t| *t <= silence).collect();
    if silence > 0 && ticks.last() != Some(&silence) {
        ticks.push(silence);
    }

    // A transition resets the stored phase, so report the computed one.
    let clock = config.phase_clock();
    let mut steps = Vec::with_capacity(ticks.len());
    for at in ticks {
        let before = monitor.snapshot();
        monitor.on_tick(offset(t0, at));
        let after = monitor.snapshot();
        steps.push(PlanStep {
            at_seconds: at,
            phase: clock.phase(at as f64),
            action: describe(&before, &after),
            snapshot: after,
        });
    }
    Ok(steps)
}

fn offset(t0: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    t0 + Duration::seconds(seconds)
}

fn describe(before: &StatusSnapshot, after: &StatusSnapshot) -> &'static str {
    if before.liveness != Liveness::Online {
        "ignored"
    } else if after.reconnect_count > before.reconnect_count {
        "reconnect"
    } else if after.update_count > before.update_count {
        "refresh"
    } else {
        "quiet"
    }
}

pub fn run(config: &MonitorConfig, silence: u64) -> anyhow::Result<()> {
    println!(
        "{} {}s of silence, {} strategy, check every {}s",
        "Escalation plan:".bright_blue().bold(),
        silence,
        config.strategy,
        config.check_interval_seconds
    );
    println!();
    println!(
        "  {:>8}  {:>5}  {:<10}  {:<15}  {:>7}  {:>10}",
        "AT", "PHASE", "ACTION", "STATUS", "UPDATES", "RECONNECTS"
    );

    let steps = simulate(config, silence)?;
    for step in &steps {
        let action = match step.action {
            "refresh" => step.action.cyan(),
            "reconnect" => step.action.yellow(),
            "ignored" => step.action.dimmed(),
            _ => step.action.normal(),
        };
        println!(
            "  {:>8}  {:>5}  {:<10}  {} {:<13}  {:>7}  {:>10}",
            format!("+{}s", step.at_seconds),
            step.phase,
            action,
            indicator(step.snapshot.liveness),
            step.snapshot.display.as_str(),
            step.snapshot.update_count,
            step.snapshot.reconnect_count
        );
    }

    println!();
    match steps.last() {
        Some(last) => println!(
            "{} {} {}",
            "Final status:".bright_green().bold(),
            indicator(last.snapshot.liveness),
            last.snapshot.display
        ),
        None => println!("{}", "No check happens within that silence.".yellow()),
    }
    Ok(())
}

fn indicator(liveness: Liveness) -> String {
    match liveness {
        Liveness::Online => "●".green().to_string(),
        Liveness::Offline => "●".red().to_string(),
        Liveness::Unknown => "●".yellow().to_string(),
    }
}
