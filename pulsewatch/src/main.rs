// pulsewatch/src/main.rs

mod cli;
mod logic;

use clap::Parser;
use cli::{Cli, Commands, ConfigAction};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command‐line arguments
    let args = Cli::parse();
    init_tracing(args.json);

    let config_path = args.config.as_deref();

    // Dispatch on subcommand
    match args.command {
        Commands::Plan { silence, overrides } => {
            let config = logic::config::load(config_path, &overrides)?;
            logic::plan::run(&config, silence)?
        }

        Commands::Watch { overrides } => {
            let config = logic::config::load(config_path, &overrides)?;
            logic::watch::run(config).await?
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => logic::config::show(config_path)?,
            ConfigAction::Set { overrides } => logic::config::set(config_path, &overrides)?,
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays free for status output.
/// `RUST_LOG` overrides the default `pulsewatch=info` filter.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pulsewatch=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
