use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;
mod brew;
mod cli;
mod config;
mod control;
mod display;
mod errors;
mod schedule;
mod ws;

use brew::brew::{BrewInputs, BrewTimer, INITIAL_INSTRUCTION};
use cli::Cli;
use config::{Settings, load_settings};
use control::control::{BrewController, run_console};
use display::terminal::TerminalDisplay;

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "pour_it=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_controller(settings: &Settings) -> BrewController<TerminalDisplay> {
    let display = TerminalDisplay::new(settings.notifications);
    let mut timer = BrewTimer::new(
        BrewInputs::new(settings.coffee_weight.clone(), settings.ratio.clone()),
        display,
    );

    // Show a schedule right away; a bad default only blocks until fixed
    if let Err(e) = timer.calculate() {
        eprintln!("⚠️  {}", e);
    }
    BrewController::new(timer)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = cli.apply_to(load_settings(cli.config.as_deref())?);

    println!("☕ Pour It - Pour-over Brew Timer");
    println!("======================================================");
    println!(
        "Coffee: {}g  Ratio: 1:{}  Notifications: {}",
        settings.coffee_weight,
        settings.ratio,
        if settings.notifications { "ON" } else { "OFF" }
    );

    let controller = build_controller(&settings);
    tokio::spawn(controller.clone().run_ticker());

    if cli.daemon {
        return run_daemon_mode(controller, &settings.bind_addr).await;
    }

    println!("{}\n", INITIAL_INSTRUCTION);
    run_console(controller).await?;
    Ok(())
}

/// Run in daemon mode - brew commands arrive over WebSocket
async fn run_daemon_mode(
    controller: BrewController<TerminalDisplay>,
    bind_addr: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let ws_addr: SocketAddr = bind_addr.parse()?;
    println!("Running WebSocket server on ws://{}", ws_addr);
    println!("Send {{\"type\":\"start\"}} to begin brewing\n");

    ws::websocket_server::start_websocket_server(ws_addr, controller).await?;
    Ok(())
}
