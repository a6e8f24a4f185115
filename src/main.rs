//! watermon - Main entry point
//!
//! CLI for the Water Status Monitor MQTT tooling: a synthetic test
//! publisher, a live traffic watcher, and config validation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, info};
use watermon::config::MonitorConfig;
use watermon::logging::init_default_logging;
use watermon::publisher::{self, PublishOptions};
use watermon::watch::{self, WatchFormat};

/// MQTT test publisher and live monitor for the Water Status Monitor
#[derive(Parser)]
#[command(name = "watermon")]
#[command(about = "MQTT tooling for the Water Status Monitor")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish synthetic temperature readings to the sensor topics
    Publish {
        /// Number of publish rounds, then exit (default: run until Ctrl+C)
        #[arg(long)]
        count: Option<u64>,

        /// Seconds between rounds (overrides config)
        #[arg(long)]
        interval: Option<u64>,

        /// RNG seed for a reproducible series (overrides config)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Watch live sensor traffic and the bath-readiness verdict
    Watch {
        /// Output format
        #[arg(short, long, default_value = "pretty")]
        format: WatchFormat,
    },
    /// Validate configuration
    Config {
        /// Show the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    init_default_logging();

    let cli = Cli::parse();

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Publish {
            count,
            interval,
            seed,
        } => {
            let interval_secs = interval.unwrap_or(config.publisher.interval_secs);
            if interval_secs == 0 {
                error!("--interval must be at least 1 second");
                process::exit(1);
            }
            let options = PublishOptions {
                interval: Duration::from_secs(interval_secs),
                rounds: count,
                seed: seed.or(config.publisher.seed),
            };
            publisher::run(&config, options).await
        }
        Commands::Watch { format } => watch::run(&config, format).await,
        Commands::Config { show } => {
            if show {
                match toml::to_string_pretty(&config) {
                    Ok(rendered) => println!("{rendered}"),
                    Err(e) => {
                        error!("Failed to render configuration: {}", e);
                        process::exit(1);
                    }
                }
            }
            info!("Configuration is valid");
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<MonitorConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(MonitorConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["watermon.toml", "config/watermon.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(MonitorConfig::load_from_file(&path)?);
                }
            }

            Err("No configuration file found. Provide one with -c/--config or create watermon.toml".into())
        }
    }
}
