// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Smart-plug logger CLI
//!
//! # Usage
//!
//! ```bash
//! # Log all Shelly plugs on the local broker into plugs.db
//! plug-logger --db plugs.db
//!
//! # Remote broker, exact-segment filtering, settings from file
//! plug-logger --config plug-logger.yaml --host 192.168.1.5 --match-policy segment
//!
//! # Inspect the database
//! plug-logger stats --json
//! plug-logger devices
//!
//! # Toggle a plug relay
//! plug-logger toggle shellyplug-s-1A2B3C
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use plug_logger::{
    Config, ConfigBuilder, MatchPolicy, MeasurementStore, MqttBus, PlugLogger, SqliteStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "plug-logger")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Log Shelly smart-plug telemetry from MQTT into SQLite", long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database path (SQLite file)
    #[arg(short, long)]
    db: Option<String>,

    /// Broker host
    #[arg(long)]
    host: Option<String>,

    /// Broker port
    #[arg(short, long)]
    port: Option<u16>,

    /// Subscription topic filter
    #[arg(short, long)]
    topic: Option<String>,

    /// MQTT client ID
    #[arg(long)]
    client_id: Option<String>,

    /// How ignore markers are matched against topics
    #[arg(long, value_enum)]
    match_policy: Option<PolicyArg>,

    /// Verbose mode (debug logs)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Substring,
    Segment,
}

impl From<PolicyArg> for MatchPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Substring => MatchPolicy::Substring,
            PolicyArg::Segment => MatchPolicy::Segment,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show row counts per table
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered plugs
    Devices,
    /// Toggle the relay of a plug
    Toggle {
        /// Plug identifier (topic segment 1)
        plug: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "plug_logger=debug,rumqttc=info"
    } else {
        "plug_logger=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt().with_env_filter(filter).with_target(false).init();

    let config = build_config(&args)?;

    match args.command {
        Some(Commands::Stats { json }) => show_stats(&config, json),
        Some(Commands::Devices) => list_devices(&config),
        Some(Commands::Toggle { plug }) => toggle(&config, &plug),
        None => run(&config),
    }
}

fn build_config(args: &Args) -> Result<Config> {
    let base = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    let mut builder = ConfigBuilder::from_config(base);
    if let Some(db) = &args.db {
        builder = builder.database_path(db);
    }
    if let Some(host) = &args.host {
        builder = builder.host(host);
    }
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    if let Some(topic) = &args.topic {
        builder = builder.subscription(topic);
    }
    if let Some(id) = &args.client_id {
        builder = builder.client_id(id);
    }
    if let Some(policy) = args.match_policy {
        builder = builder.match_policy(policy.into());
    }

    let config = builder.build();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run(config: &Config) -> Result<()> {
    tracing::info!("Plug logger starting...");
    tracing::info!("  Database: {}", config.database_path);
    tracing::info!("  Broker: {}", config.mqtt.broker_addr());
    tracing::info!("  Subscription: {}", config.mqtt.subscription);

    let bus = Arc::new(MqttBus::new(&config.mqtt));
    let logger =
        PlugLogger::init(config, Arc::clone(&bus)).context("Failed to start plug logger")?;

    let stop_handle = bus.stop_handle();
    ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, shutting down...");
        stop_handle.stop();
    })
    .context("Failed to install Ctrl+C handler")?;

    let result = bus.run().context("MQTT bus error");

    let stats = logger.cleanup();
    tracing::info!(
        received = stats.received,
        persisted = stats.persisted,
        filtered = stats.filtered,
        failed = stats.failed,
        devices_registered = stats.devices_registered,
        "Plug logger shutdown complete"
    );

    result
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.database_path, config.create_schema)
        .with_context(|| format!("Failed to open database {}", config.database_path))
}

fn show_stats(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Database: {}", config.database_path);
        println!("  plugs:            {}", stats.devices);
        println!("  plug_temperature: {}", stats.temperature);
        println!("  plug_status:      {}", stats.status);
        println!("  plug_power:       {}", stats.power);
        println!("  plug_consumption: {}", stats.consumption);
    }

    store.close()?;
    Ok(())
}

fn list_devices(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let devices = store.devices()?;

    println!("Registered plugs ({}):", devices.len());
    for device in &devices {
        println!("  {}", device);
    }

    store.close()?;
    Ok(())
}

fn toggle(config: &Config, plug: &str) -> Result<()> {
    let topic = relay_command_topic(plug);
    let bus = MqttBus::new(&config.mqtt);

    bus.publish(&topic, "toggle")?;
    bus.flush(Duration::from_secs(5))
        .with_context(|| format!("Failed to publish to {}", config.mqtt.broker_addr()))?;

    println!("Sent toggle to {}", topic);
    Ok(())
}

fn relay_command_topic(plug: &str) -> String {
    format!("shellies/{}/relay/0/command", plug)
}
