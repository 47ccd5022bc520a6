//! Simlink - simulator telemetry acquisition and replay
//!
//! Command-line front end for the acquisition engine: stream telemetry from a
//! virtual host (optionally recording it), play a recording back, or inspect
//! a replay file.

mod commands;
mod settings;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use simlink_acquire::WeatherQuery;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "simlink")]
#[command(about = "Acquire, record and replay flight simulator telemetry", long_about = None)]
struct Cli {
    /// Trace every acquisition cycle
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (default: $XDG_CONFIG_HOME/simlink/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize a replay file
    Inspect {
        /// Replay file
        file: PathBuf,
    },

    /// Play a replay file back
    Play {
        /// Replay file
        file: PathBuf,

        /// Playback speed multiplier
        #[arg(long)]
        speed: Option<f32>,

        /// Stop after this many packets
        #[arg(long)]
        count: Option<usize>,
    },

    /// Stream telemetry from the built-in virtual host
    Simulate {
        /// Record telemetry to this file
        #[arg(long)]
        record: Option<PathBuf>,

        /// Polling cadence in milliseconds
        #[arg(long)]
        rate_ms: Option<u32>,

        /// Stop after this many telemetry packets
        #[arg(long)]
        count: Option<usize>,

        /// Request the METAR for a station once connected (repeatable)
        #[arg(long = "weather", value_name = "IDENT")]
        weather: Vec<String>,
    },

    /// Show the effective settings, optionally writing them out
    Settings {
        /// Write the settings file
        #[arg(long)]
        save: bool,
    },
}

fn load_settings(path: Option<&PathBuf>) -> Settings {
    match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "simlink=info,simlink_acquire=info,simlink_protocol=info,simlink_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.settings.as_ref());
    if cli.verbose {
        settings.acquisition.verbose = true;
    }

    match cli.command {
        Command::Inspect { file } => commands::inspect(&file),

        Command::Play { file, speed, count } => {
            let mut config = settings.acquisition;
            config.record_path = None;
            config.playback_path = Some(file);
            if let Some(speed) = speed {
                config.playback_speed = speed;
            }
            commands::play(config, count).await
        }

        Command::Simulate {
            record,
            rate_ms,
            count,
            weather,
        } => {
            let mut config = settings.acquisition;
            config.playback_path = None;
            if record.is_some() {
                config.record_path = record;
            }
            if let Some(rate_ms) = rate_ms {
                config.update_rate_ms = rate_ms;
            }

            let queries = weather
                .into_iter()
                .map(WeatherQuery::station)
                .filter(|q| {
                    if !q.is_valid() {
                        tracing::warn!("Skipping invalid station {:?}", q);
                    }
                    q.is_valid()
                })
                .collect();
            commands::simulate(settings.host, config, count, queries).await
        }

        Command::Settings { save } => {
            println!(
                "{}",
                serde_json::to_string_pretty(&settings).context("Failed to serialize settings")?
            );
            if save {
                let path = match cli.settings {
                    Some(path) => {
                        settings.save_to(&path)?;
                        path
                    }
                    None => settings.save()?,
                };
                tracing::info!("Settings saved to {}", path.display());
            }
            Ok(())
        }
    }
}
