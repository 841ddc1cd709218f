//!
//! # Agent Operating Model
//!
//! - **Single-threaded cooperative loop**: the receive engine, send
//!   scheduler, and host table all run on one task. The loop blocks
//!   only inside `poll`, bounded by the next scheduler deadline and
//!   capped at one second so shutdown stays responsive.
//!
//! - **Peer-to-peer overlay**: every node may be both a sender and a
//!   receiver, typically joined by IP multicast. Deaf nodes never
//!   listen; mute nodes never speak; a node configured as both is
//!   refused at startup.
//!
//! - **Processing pipeline, inbound**: UDP socket -> ChannelLayer ->
//!   ReceiveEngine (ACL, decode) -> HostTable.
//!
//! - **Processing pipeline, outbound**: SendScheduler (measure,
//!   threshold, encode) -> ChannelLayer fan-out -> UDP sockets.
//!

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::Release;

use clap::Parser;
use meshmon_agent::agent::Agent;
use meshmon_agent::args::Args;
use meshmon_agent::clock::Clock;
use meshmon_agent::config::AgentConfig;
use meshmon_agent::resolve::{Resolver, local_hostname};
use meshmon_agent::source::default_source;
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, filter};

/// Global flag that will be set to `false` when the process should exit.
static KEEP_RUNNING: AtomicBool = AtomicBool::new(true);

fn main() {
    set_ctrlc_handler();

    let args = Args::parse();
    enable_logging(&args);
    debug!("{args:?}");

    let config = match AgentConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let local_host = local_hostname();
    info!(host = %local_host, "starting");

    let mut agent = match Agent::new(
        &config,
        Clock::Wall,
        default_source(),
        Resolver::System,
        local_host,
        args.status_interval,
    ) {
        Ok(agent) => agent,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    agent.run(&KEEP_RUNNING);
}

fn set_ctrlc_handler() {
    ctrlc::set_handler(|| {
        info!("Received Ctrl-C, exiting...");
        KEEP_RUNNING.store(false, Release);
    })
    .expect("Error setting Ctrl-C handler");
}

fn enable_logging(args: &Args) {
    let verbosity = if args.quiet {
        tracing::Level::ERROR
    } else {
        match args.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            2.. => tracing::Level::TRACE,
        }
    };

    // mio wakes are noisy at TRACE and never interesting here
    let filters = filter::Targets::new()
        .with_target("mio", tracing::Level::INFO)
        .with_default(verbosity);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_filter(filters);

    tracing_subscriber::registry().with(fmt_layer).init();
}
