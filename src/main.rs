//! aaisp2mqtt — publish Andrews & Arnold broadband quota and sync rates
//! to MQTT.
//!
//! Each run fetches the circuit list from the CHAOS v2 API once, publishes
//! every metric under `{prefix}/login/{login}/...`, optionally announces
//! the sensors to Home Assistant, and exits. Schedule it with cron or a
//! systemd timer.
//!
//! Configuration comes from the TOML file given as the only argument, or
//! from `AAISP_*` / `MQTT_*` / `HOMEASSISTANT_*` environment variables.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};

mod bridge;
mod broker;
mod chaos;
mod config;
mod discovery;
mod metrics;
mod topics;

use broker::MqttBroker;
use chaos::ChaosClient;
use config::Settings;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file with [aaisp] and [mqtt] sections. Settings are
    /// read from the environment when omitted.
    config: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aaisp2mqtt=info".into()),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    info!("📡 aaisp2mqtt v{}", VERSION);

    let settings = load_settings(args.config.as_deref())?;

    let source = ChaosClient::new(settings.aaisp.clone());
    let summary = bridge::run(&settings, &source, |mqtt| async move {
        MqttBroker::connect(&mqtt).await
    })
    .await
    .context("Bridge run failed")?;

    info!(
        circuits = summary.circuits,
        messages = summary.messages,
        "Run complete"
    );
    Ok(())
}

fn load_settings(path: Option<&str>) -> Result<Settings> {
    match path {
        Some(raw) => {
            let path = config::resolve_config_path(raw)
                .with_context(|| format!("Cannot resolve config path {raw}"))?;
            info!(path = %path.display(), "Loading configuration file");
            Ok(Settings::from_file(&path)?)
        }
        None => {
            if let Ok(path) = dotenvy::dotenv() {
                info!(path = %path.display(), "Loaded environment file");
            }
            Ok(Settings::from_env()?)
        }
    }
}
