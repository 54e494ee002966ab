use chrono::Utc;
use colored::*;
use pulsewatch::{
    ChannelObserver, DataArrival, KnownDevice, Liveness, Monitor, MonitorConfig, MonitorRegistry,
    StatusRequest, StatusSnapshot, Transport,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Transport for stdin-fed devices: there is no connection to act on, so
/// requests are only logged.
struct LogTransport;

impl Transport for LogTransport {
    fn reconnect(&self) {
        info!(target: "pulsewatch::transport", "reconnect requested");
    }

    fn send_request(&self, request: &StatusRequest) {
        match serde_json::to_string(request) {
            Ok(body) => info!(target: "pulsewatch::transport", %body, "status request"),
            Err(e) => warn!(target: "pulsewatch::transport", error = %e, "unserializable request"),
        }
    }
}

/// One line of input
#[derive(Debug, Deserialize)]
struct InputLine {
    device_id: String,
    #[serde(default)]
    data: Value,
    /// Present for status replies
    #[serde(default)]
    reply: Option<Vec<Value>>,
}

/// Format age in seconds to human readable string
fn format_age(seconds: i64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m", seconds / 60)
    } else if seconds < 86400 {
        format!("{}h", seconds / 3600)
    } else {
        format!("{}d", seconds / 86400)
    }
}

fn status_indicator(liveness: Liveness) -> String {
    match liveness {
        Liveness::Online => "●".green().to_string(),
        Liveness::Offline => "●".red().to_string(),
        Liveness::Unknown => "●".yellow().to_string(),
    }
}

fn print_snapshot(snapshot: &StatusSnapshot) {
    let last_data = snapshot
        .last_data_at
        .map(|at| format!("{} ago", format_age((Utc::now() - at).num_seconds().max(0))))
        .unwrap_or_else(|| "never".to_string());
    println!(
        "{} {:<20} {:<15} {} {:<3} {} {:<4} {} {:<4} {} {}",
        status_indicator(snapshot.liveness),
        snapshot.device_id.bright_white(),
        snapshot.display.as_str(),
        "phase".dimmed(),
        snapshot.phase,
        "updates".dimmed(),
        snapshot.update_count,
        "reconnects".dimmed(),
        snapshot.reconnect_count,
        "data".dimmed(),
        last_data
    );
}

struct Watcher {
    config: MonitorConfig,
    transport: Arc<dyn Transport>,
    observer: ChannelObserver,
    registry: MonitorRegistry,
}

impl Watcher {
    fn ensure_monitor(&mut self, device_id: &str) -> anyhow::Result<()> {
        if self.registry.contains(device_id) {
            return Ok(());
        }
        let device = KnownDevice::new(device_id, None);
        let mut monitor = Monitor::new(&self.config, &device, self.transport.clone(), Utc::now())?;
        monitor.subscribe(Arc::new(self.observer.clone()));
        self.registry.insert(pulsewatch::runtime::spawn(monitor))?;
        Ok(())
    }

    /// Feed one input line. A device whose monitor has died is dropped from
    /// the registry; the other devices keep running.
    async fn handle_line(&mut self, line: &str) -> anyhow::Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        let input: InputLine = match serde_json::from_str(line) {
            Ok(input) => input,
            Err(e) => {
                warn!(error = %e, "skipping unparsable input line");
                return Ok(());
            }
        };

        let sent = match input.reply {
            Some(payloads) => match self.registry.get(&input.device_id) {
                Some(handle) => handle.reply_received(payloads),
                None => {
                    warn!(device_id = %input.device_id, "status reply for unmonitored device");
                    return Ok(());
                }
            },
            None => {
                self.ensure_monitor(&input.device_id)?;
                match self.registry.get(&input.device_id) {
                    Some(handle) => {
                        handle.data_arrived(DataArrival::now(input.device_id.clone(), input.data))
                    }
                    None => return Ok(()),
                }
            }
        };

        if let Err(e) = sent {
            warn!(device_id = %input.device_id, error = %e, "dropping device");
            if let Err(e) = self.registry.remove(&input.device_id).await {
                debug!(device_id = %input.device_id, error = %e, "device already gone");
            }
        }
        Ok(())
    }
}

pub async fn run(config: MonitorConfig) -> anyhow::Result<()> {
    let (tx, mut snapshots) = mpsc::unbounded_channel();
    let mut watcher = Watcher {
        config,
        transport: Arc::new(LogTransport),
        observer: ChannelObserver(tx),
        registry: MonitorRegistry::new(),
    };

    println!(
        "{} {} strategy, check every {}s. Press Ctrl+C to exit...",
        "Watching stdin:".bright_cyan().bold(),
        watcher.config.strategy,
        watcher.config.check_interval_seconds
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => watcher.handle_line(&line).await?,
                None => break,
            },
            Some(snapshot) = snapshots.recv() => print_snapshot(&snapshot),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    watcher.registry.shutdown().await;
    while let Ok(snapshot) = snapshots.try_recv() {
        print_snapshot(&snapshot);
    }
    Ok(())
}
