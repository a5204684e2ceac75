use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use census_core::{
    build_dashboard, normalize_code, CensusConfig, CensusError, ConfigOverrides, HistoryWindow,
    HospitalFetch, HOSPITALS,
};
use census_feed::{parse_history_str, summarize_history_str};
use chrono::{FixedOffset, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod client;
mod render;

use client::CensusClient;

#[derive(Parser, Debug)]
#[command(
    name = "census",
    about = "Clean and summarize emergency department patient counts."
)]
struct Cli {
    /// JSON file with threshold and range overrides.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Offset from UTC used when printing times (Saskatchewan is -6).
    #[arg(long, global = true, default_value_t = -6, allow_negative_numbers = true)]
    utc_offset_hours: i32,

    /// Print JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clean and summarize a saved history response.
    Report {
        /// Hospital code, e.g. RUH.
        #[arg(long)]
        hospital: String,
        /// Path to the `/api/hospital-history` JSON body.
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Build a dashboard from saved history responses, one `CODE=path` per hospital.
    Dashboard {
        #[arg(required = true, value_parser = parse_source)]
        sources: Vec<(String, PathBuf)>,
    },
    /// Fetch history for every hospital from a running API server.
    Fetch {
        #[command(flatten)]
        remote: RemoteArgs,
        /// Hospital codes; defaults to every known site.
        #[arg(long = "hospital")]
        hospitals: Vec<String>,
        /// History window in days (1, 7, 30...).
        #[arg(long)]
        days: Option<u32>,
        /// Keep refreshing until interrupted.
        #[arg(long)]
        watch: bool,
        #[arg(long, default_value_t = 10)]
        interval_minutes: u64,
    },
    /// Show the latest count per hospital.
    Current {
        #[command(flatten)]
        remote: RemoteArgs,
    },
}

#[derive(Args, Debug)]
struct RemoteArgs {
    #[arg(long, env = "CENSUS_API_URL", default_value = "http://localhost:10000")]
    base_url: String,
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

fn parse_source(value: &str) -> Result<(String, PathBuf), String> {
    let (code, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected CODE=path, got {value}"))?;
    if code.trim().is_empty() {
        return Err(format!("missing hospital code in {value}"));
    }
    Ok((code.to_string(), PathBuf::from(path)))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<CensusConfig> {
    let Some(path) = path else {
        return Ok(CensusConfig::default());
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("could not read config file {}", path.display()))?;
    let overrides: ConfigOverrides = serde_json::from_str(&text)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(overrides.apply(CensusConfig::default())?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = load_config(cli.config.as_deref())?;
    let offset = FixedOffset::east_opt(cli.utc_offset_hours * 3600)
        .with_context(|| format!("invalid UTC offset {}", cli.utc_offset_hours))?;

    match cli.command {
        Commands::Report { hospital, input } => {
            let payload = std::fs::read_to_string(&input)
                .with_context(|| format!("could not read {}", input.display()))?;
            let report = summarize_history_str(&hospital, &payload, &config)?;

            if cli.json {
                print_json(&report)?;
            } else {
                print!("{}", render::history_table(&report, config.table_rows, offset));
            }
        }
        Commands::Dashboard { sources } => {
            let fetches = sources
                .iter()
                .map(|(code, path)| {
                    let outcome = std::fs::read_to_string(path)
                        .map_err(|err| {
                            CensusError::Transport(format!("{}: {err}", path.display()))
                        })
                        .and_then(|payload| parse_history_str(code, &payload));
                    HospitalFetch {
                        hospital_code: normalize_code(code),
                        outcome,
                    }
                })
                .collect();
            let snapshot = build_dashboard(fetches, &config);

            if cli.json {
                print_json(&snapshot)?;
            } else {
                print!("{}", render::summary_table(&snapshot, offset));
                for report in &snapshot.hospitals {
                    println!();
                    print!("{}", render::history_table(report, config.table_rows, offset));
                }
            }
        }
        Commands::Fetch {
            remote,
            hospitals,
            days,
            watch,
            interval_minutes,
        } => {
            if let Some(days) = days {
                config.window = HistoryWindow::from_days(days);
                config.validate()?;
            }
            let hospitals = if hospitals.is_empty() {
                HOSPITALS.iter().map(|h| h.code.to_string()).collect()
            } else {
                hospitals
            };
            let client = CensusClient::new(&remote.base_url, Duration::from_secs(remote.timeout_secs))?;

            let mut ticker = tokio::time::interval(Duration::from_secs(interval_minutes.max(1) * 60));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = tokio::signal::ctrl_c() => {
                        info!("interrupted, stopping refresh loop");
                        break;
                    }
                }

                let fetches = client.refresh(&hospitals, config.window).await;
                let snapshot = build_dashboard(fetches, &config);

                if cli.json {
                    print_json(&snapshot)?;
                } else {
                    print!("{}", render::summary_table(&snapshot, offset));
                }

                if !watch {
                    break;
                }
                info!(next_in_minutes = interval_minutes.max(1), "waiting for next refresh");
            }
        }
        Commands::Current { remote } => {
            let client = CensusClient::new(&remote.base_url, Duration::from_secs(remote.timeout_secs))?;
            let samples = client
                .fetch_snapshot()
                .await
                .context("could not load current hospital data")?;

            if cli.json {
                print_json(&samples)?;
            } else {
                print!("{}", render::current_cards(&samples, Utc::now()));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_arguments_split_on_equals() {
        let (code, path) = parse_source("ruh=data/ruh.json").unwrap();
        assert_eq!(code, "ruh");
        assert_eq!(path, PathBuf::from("data/ruh.json"));
        assert!(parse_source("data/ruh.json").is_err());
        assert!(parse_source("=x.json").is_err());
    }

    #[test]
    fn cli_parses_fetch_options() {
        let cli = Cli::try_parse_from([
            "census",
            "--utc-offset-hours",
            "-5",
            "fetch",
            "--base-url",
            "http://example.test",
            "--hospital",
            "RUH",
            "--hospital",
            "SPH",
            "--days",
            "30",
        ])
        .unwrap();

        assert_eq!(cli.utc_offset_hours, -5);
        match cli.command {
            Commands::Fetch {
                remote,
                hospitals,
                days,
                watch,
                ..
            } => {
                assert_eq!(remote.base_url, "http://example.test");
                assert_eq!(hospitals, vec!["RUH", "SPH"]);
                assert_eq!(days, Some(30));
                assert!(!watch);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
