use crate::error::ConfigError;
use crate::monitor::phase::{EscalationPlan, PhaseClock};
use crate::monitor::strategy::{ActiveRefresh, PassiveRefresh, RefreshStrategy};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// How a monitor re-evaluates liveness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Infer liveness from telemetry silence
    #[default]
    Passive,
    /// Poll the device with status requests
    Active,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn RefreshStrategy> {
        match self {
            StrategyKind::Passive => Box::new(PassiveRefresh),
            StrategyKind::Active => Box::new(ActiveRefresh),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Passive => "passive",
            StrategyKind::Active => "active",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "passive" => Ok(StrategyKind::Passive),
            "active" => Ok(StrategyKind::Active),
            other => Err(format!("unknown strategy `{}`", other)),
        }
    }
}

/// Timing and escalation settings for device monitors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between liveness checks (default: 30)
    pub check_interval_seconds: u64,
    /// Phase past which a device is declared offline (default: 10)
    pub deadline_phase: u32,
    /// Phases that re-evaluate status (default: 2, 4, 6)
    pub check_phases: Vec<u32>,
    /// Phases that force a reconnect (default: 3, 5, 7)
    pub connect_phases: Vec<u32>,
    /// Liveness strategy (default: passive)
    pub strategy: StrategyKind,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: 30,
            deadline_phase: 10,
            check_phases: vec![2, 4, 6],
            connect_phases: vec![3, 5, 7],
            strategy: StrategyKind::Passive,
        }
    }
}

/// `<config dir>/pulsewatch/config.toml`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let pd = ProjectDirs::from("com", "example", "pulsewatch").ok_or(ConfigError::NoConfigDir)?;
    Ok(pd.config_dir().join("config.toml"))
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

impl MonitorConfig {
    /// Load configuration from a TOML file (supports `~`)
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let expanded = expand(path);
        let content = std::fs::read_to_string(&expanded).map_err(|source| ConfigError::Read {
            path: expanded.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: expanded.display().to_string(),
            source,
        })
    }

    /// Create configuration from command line arguments and environment variables
    pub fn from_args_and_env(
        check_interval: Option<u64>,
        deadline_phase: Option<u32>,
        strategy: Option<StrategyKind>,
    ) -> Self {
        let mut config = Self::default();
        config.apply_env();
        config.apply_overrides(check_interval, deadline_phase, strategy);
        config
    }

    /// Override with environment variables; unparsable values are ignored
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("PULSEWATCH_CHECK_INTERVAL") {
            if let Ok(parsed) = val.parse() {
                self.check_interval_seconds = parsed;
            }
        }
        if let Ok(val) = std::env::var("PULSEWATCH_DEADLINE_PHASE") {
            if let Ok(parsed) = val.parse() {
                self.deadline_phase = parsed;
            }
        }
        if let Ok(val) = std::env::var("PULSEWATCH_STRATEGY") {
            if let Ok(parsed) = val.parse() {
                self.strategy = parsed;
            }
        }
    }

    /// Override with command line arguments (highest priority)
    pub fn apply_overrides(
        &mut self,
        check_interval: Option<u64>,
        deadline_phase: Option<u32>,
        strategy: Option<StrategyKind>,
    ) {
        if let Some(val) = check_interval {
            self.check_interval_seconds = val;
        }
        if let Some(val) = deadline_phase {
            self.deadline_phase = val;
        }
        if let Some(val) = strategy {
            self.strategy = val;
        }
    }

    /// Write configuration as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path.display().to_string(),
            source,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(write_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval_seconds == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.deadline_phase == 0 {
            return Err(ConfigError::ZeroDeadline);
        }
        for &phase in self.check_phases.iter().chain(&self.connect_phases) {
            if phase == 0 {
                return Err(ConfigError::ZeroPhase);
            }
            if phase >= self.deadline_phase {
                return Err(ConfigError::PhaseBeyondDeadline {
                    phase,
                    deadline: self.deadline_phase,
                });
            }
        }
        if let Some(&phase) = self
            .check_phases
            .iter()
            .find(|p| self.connect_phases.contains(*p))
        {
            return Err(ConfigError::OverlappingPhase(phase));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    pub fn phase_clock(&self) -> PhaseClock {
        PhaseClock::new(self.check_interval())
    }

    pub fn escalation_plan(&self) -> EscalationPlan {
        EscalationPlan::new(
            self.check_phases.clone(),
            self.connect_phases.clone(),
            self.deadline_phase,
        )
    }
}
