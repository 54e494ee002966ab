use crate::cli::Overrides;
use colored::*;
use pulsewatch::config::default_config_path;
use pulsewatch::MonitorConfig;
use std::path::PathBuf;

fn resolve_path(path: Option<&str>) -> anyhow::Result<PathBuf> {
    match path {
        Some(p) => Ok(PathBuf::from(shellexpand::tilde(p).into_owned())),
        None => Ok(default_config_path()?),
    }
}

/// Effective configuration: file (explicit path, or the default one if it
/// exists), then environment, then command line.
pub fn load(path: Option<&str>, overrides: &Overrides) -> anyhow::Result<MonitorConfig> {
    let mut config = match path {
        Some(p) => MonitorConfig::from_file(p)?,
        None => match default_config_path() {
            Ok(default) if default.exists() => MonitorConfig::from_file(&default.to_string_lossy())?,
            _ => MonitorConfig::default(),
        },
    };
    config.apply_env();
    config.apply_overrides(
        overrides.check_interval,
        overrides.deadline_phase,
        overrides.strategy,
    );
    config.validate()?;
    Ok(config)
}

pub fn show(path: Option<&str>) -> anyhow::Result<()> {
    let file = resolve_path(path)?;
    match load(path, &Overrides::default()) {
        Ok(config) => {
            println!("{} {}", "Configuration:".bright_blue().bold(), file.display());
            display_config(&config);
        }
        Err(e) => {
            eprintln!("{} {}", "Error loading configuration:".red().bold(), e);
            println!();
            println!("{}", "Showing default configuration:".bright_blue().bold());
            display_config(&MonitorConfig::default());
        }
    }
    Ok(())
}

pub fn display_config(config: &MonitorConfig) {
    let join = |phases: &[u32]| {
        phases
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!();
    println!("  {} {}", "Strategy:".cyan(), config.strategy.to_string().bright_white());
    println!(
        "  {} {} seconds",
        "Check interval:".cyan(),
        config.check_interval_seconds.to_string().bright_white()
    );
    println!("  {} {}", "Check phases:".green(), join(&config.check_phases).bright_white());
    println!("  {} {}", "Connect phases:".yellow(), join(&config.connect_phases).bright_white());
    println!(
        "  {} {} ({} seconds of silence)",
        "Deadline phase:".bright_red(),
        config.deadline_phase.to_string().bright_white(),
        config.check_interval_seconds * config.deadline_phase as u64
    );

    println!();
    println!("{}", "Phase Actions:".bright_green().bold());
    println!("  {} check phase: re-evaluate online/offline", "●".green());
    println!("  {} connect phase: force a reconnect", "●".yellow());
    println!("  {} deadline and beyond: re-evaluate on every check", "●".red());
}

pub fn set(path: Option<&str>, overrides: &Overrides) -> anyhow::Result<()> {
    if overrides.check_interval.is_none()
        && overrides.deadline_phase.is_none()
        && overrides.strategy.is_none()
    {
        eprintln!("{}", "Error: At least one setting must be specified".red().bold());
        eprintln!("Use one or more of: --check-interval, --deadline-phase, --strategy");
        return Ok(());
    }

    let file = resolve_path(path)?;
    let mut config = if file.exists() {
        MonitorConfig::from_file(&file.to_string_lossy())?
    } else {
        println!("{}", "No existing configuration found, using defaults as base".yellow());
        MonitorConfig::default()
    };
    config.apply_overrides(
        overrides.check_interval,
        overrides.deadline_phase,
        overrides.strategy,
    );

    if let Err(e) = config.validate() {
        eprintln!("{} {}", "Error:".red().bold(), e);
        return Ok(());
    }

    config.save(&file)?;
    println!("{} {}", "Configuration saved to".bright_green().bold(), file.display());
    display_config(&config);
    Ok(())
}
