mod capture;
mod config;
mod decoder;
mod models;
mod outputs;
mod utils;
mod worker;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use log::{error, info, warn};
use std::process::ExitCode;

use crate::capture::interfaces::SystemInterfaces;
use crate::capture::session::CaptureSession;
use crate::config::args::Args;
use crate::config::resolver::{ConfigResolver, Resolution};
use crate::models::config::AppConfig;
use crate::utils::error::ConfigError;
use crate::utils::fatal::{self, Termination};
use crate::utils::logging;
use crate::worker::Worker;

fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    let resolver = ConfigResolver::new(&SystemInterfaces);
    let Resolution { config, warnings } = match resolver.normalize(&args) {
        Ok(resolution) => resolution,
        Err(e) => return usage_error(&e),
    };

    // Initialize logger from the normalized configuration
    if let Err(e) = logging::init_logger(&config.logging).context("cannot initialise logging") {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting heplify v{}", env!("CARGO_PKG_VERSION"));
    for warning in &warnings {
        warn!("{}", warning);
    }

    let config = match resolver.resolve_addresses(config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return usage_error(&e);
        }
    };

    run(&config)
}

/// Print usage and the configuration error, then fail
fn usage_error(err: &ConfigError) -> ExitCode {
    eprintln!("{}", Args::command().render_help());
    eprintln!("{}", err);
    ExitCode::FAILURE
}

/// Construct the worker, run the capture to completion and shut down
fn run(config: &AppConfig) -> ExitCode {
    let mut worker = match Worker::from_config(config) {
        Ok(worker) => worker,
        Err(e) => fatal::abort_process("cannot construct outputer", &e),
    };

    let mut session = match CaptureSession::open(&config.capture) {
        Ok(session) => session,
        Err(e) => {
            error!("main capture {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = session.run(&mut worker);
    session.release();
    worker.log_summary();

    match outcome {
        Ok(stats) => {
            info!(
                "Capture finished: {} packets ({} truncated), {:.1} packets/s",
                stats.total_packets,
                stats.truncated_packets,
                stats.packet_rate()
            );
            if stats.replay_passes > 0 {
                info!("Replay passes completed: {}", stats.replay_passes);
            }
            ExitCode::SUCCESS
        }
        Err(e) => match fatal::termination_for(&e) {
            Termination::Abort => fatal::abort_process("packet handler", &e),
            Termination::Exit => {
                error!("main capture {} after {} packets", e, session.stats().total_packets);
                ExitCode::FAILURE
            }
        },
    }
}
