// Copyright (c) 2024 The mqtt-broker contributors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Binary entry point: parses CLI flags, loads and validates the config file, initializes
//! logging, and drives the accept loop to completion. Grounded on
//! `examples/RustRobotics-hebo`'s `server/run.rs`, ported from hebo's `clap` 2.x builder API to
//! the derive API since this crate's `Cargo.toml` locks `clap` 4.5 with the `derive` feature.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mqtt_broker::{Config, Error};

const DEFAULT_CONFIG: &str = "/etc/mqtt-broker/mqtt-broker.toml";

#[derive(Parser, Debug)]
#[command(name = "mqtt-broker", about = "In-memory MQTT 3.1.1 / 5.0 publish-subscribe broker")]
struct Args {
    /// Path to a TOML config file. Missing fields fall back to their defaults; a missing file
    /// falls back to an entirely default config.
    #[arg(short, long, value_name = "config_file")]
    config: Option<PathBuf>,

    /// Parse and validate the config file, then exit without starting the listener.
    #[arg(short, long)]
    test: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mqtt-broker: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => match std::fs::read_to_string(DEFAULT_CONFIG) {
            Ok(content) => Config::load_from_str(&content)?,
            Err(_) => Config::default(),
        },
    };
    config.validate()?;

    if args.test {
        println!("config is valid");
        return Ok(());
    }

    config.log().init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(mqtt_broker::server::run(config))
}
