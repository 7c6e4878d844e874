//! `meshfleet` – robot fleet coordinator.
//!
//! 1. Loads `~/.meshfleet/config.toml` (writing defaults on first run).
//! 2. Opens the coprocessor link: serial-over-TCP, or an in-process
//!    simulated coprocessor with `--simulate`.
//! 3. Runs the gateway and fleet modules, bridging the cloud shadow over
//!    stdio (deltas in on stdin, reports out on stdout).
//! 4. Intercepts **Ctrl-C** to stop every task and exit.

mod cloud;
mod config;
mod tcp_link;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use meshfleet_middleware::{LinkTransport, MessageBus, SimLink};
use meshfleet_runtime::telemetry::init_tracing;
use meshfleet_types::{EventKind, EventPayload, FleetError, RobotAddress};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::tcp_link::TcpLink;

#[derive(Debug, Parser)]
#[command(name = "meshfleet", version, about = "Robot fleet coordinator")]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Run against a simulated coprocessor")]
    simulate: bool,

    #[arg(long, value_name = "ADDR", help = "Coprocessor bridge address (host:port)")]
    link: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let _telemetry = init_tracing("meshfleet");

    print_banner();

    let mut cfg = load_config(cli.config.unwrap_or_else(config::config_path));
    if cli.simulate {
        cfg.simulate = true;
    }
    if let Some(link) = cli.link {
        cfg.link_addr = link;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cfg)) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cfg: config::Config) -> Result<(), FleetError> {
    let bus = MessageBus::new(cfg.mailbox_capacity);

    let transport: Arc<dyn LinkTransport> = if cfg.simulate {
        eprintln!("  Link: {}", "simulated coprocessor".yellow());
        let sim = Arc::new(SimLink::new());
        spawn_demo_fleet(&bus, sim.clone());
        sim
    } else {
        eprintln!("  Link: {}", cfg.link_addr.bold());
        Arc::new(TcpLink::connect(&cfg.link_addr).await?)
    };

    let supervisor = meshfleet_runtime::launch(transport, bus.clone(), cfg.gateway_config()).await;
    let bridge = cloud::spawn_stdio(&bus);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let handler_tx = stop_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = handler_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    let _ = stop_rx.wait_for(|stop| *stop).await;
    drop(stop_tx);
    eprintln!();
    eprintln!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());

    for task in &bridge {
        task.abort();
    }
    supervisor.shutdown();
    eprintln!("{}", "  ✓ Exiting meshfleet.".green());
    Ok(())
}

fn load_config(path: PathBuf) -> config::Config {
    match config::load(&path) {
        Ok(Some(cfg)) => {
            eprintln!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            match config::save_to(&cfg, &path) {
                Ok(()) => eprintln!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                ),
                Err(e) => eprintln!("{}: {}", "Error saving config".red(), e),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulated fleet
// ─────────────────────────────────────────────────────────────────────────────

const DEMO_ROBOTS: [u64; 2] = [0x0000_0001, 0x0000_0002];

/// Two robots join once the link is up and report a move after every
/// clear-to-move.
fn spawn_demo_fleet(bus: &MessageBus, sim: Arc<SimLink>) {
    let mut mailbox = bus.subscribe("demo", &[EventKind::LinkReady, EventKind::ClearToMove]);
    tokio::spawn(async move {
        let mut moves = 0;
        while let Some(event) = mailbox.recv().await {
            match event.payload {
                EventPayload::LinkReady => {
                    for addr in DEMO_ROBOTS {
                        sim.announce_robot(RobotAddress(addr));
                    }
                    info!(robots = DEMO_ROBOTS.len(), "simulated robots joined");
                }
                EventPayload::ClearToMove => {
                    moves += 1;
                    for addr in DEMO_ROBOTS {
                        sim.report_movement(RobotAddress(addr), 0, 0, moves);
                    }
                }
                _ => {}
            }
        }
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    eprintln!();
    eprintln!("{}", "  meshfleet".bold().cyan());
    eprintln!("{}", "  robot fleet coordinator".dimmed());
    eprintln!();
}
