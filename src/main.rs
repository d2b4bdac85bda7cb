// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/brewsense-rs

//! BrewSense - Coffee Pot Sensor Node
//!
//! Watches a communal coffee pot through a load-cell scale and two
//! smart-plug power meters, publishing confidence-scored lifecycle events
//! (new pot, poured, empty, removed, replaced, grinding, brewing) to the
//! platform uplink.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use brewsense::{Config, SensorNode, VERSION};

/// BrewSense - Coffee Pot Sensor Node
#[derive(Parser, Debug)]
#[command(name = "brewsense")]
#[command(author = "BrewSense Project")]
#[command(version = VERSION)]
#[command(about = "Coffee pot lifecycle detection from scale and power streams")]
struct Args {
    /// Configuration file path (TOML, overlaid on the defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// MQTT broker for the platform uplink (enables the uplink)
    #[arg(long)]
    mqtt_broker: Option<String>,

    /// MQTT broker for the remote smart plugs (enables the sensor link)
    #[arg(long)]
    sensor_broker: Option<String>,

    /// Dump the scale's sample buffer to this CSV file on shutdown
    #[arg(long)]
    capture: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("BrewSense v{VERSION} - coffee pot sensor node");

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(broker) = args.mqtt_broker {
        config.uplink.enabled = true;
        config.uplink.host = broker;
    }
    if let Some(broker) = args.sensor_broker {
        config.link.enabled = true;
        config.link.host = broker;
    }

    let mut node = SensorNode::new(config);
    if let Some(path) = args.capture {
        node = node.capture_to(path);
    }

    // Single-threaded on purpose: the hub's lock-free sharing depends on
    // cooperative scheduling with no preemption.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let local = tokio::task::LocalSet::new();
    runtime.block_on(local.run_until(node.run()))?;

    Ok(())
}
