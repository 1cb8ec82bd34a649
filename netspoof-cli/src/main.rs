use anyhow::{Context, Result};
use clap::Parser;
use netspoof_capture::PcapFrameSource;
use netspoof_cli::{Cli, Commands};
use netspoof_core::{Engine, Interface};
use netspoof_engines::{ArpSpoofEngine, DnsSpoofEngine, EngineRegistry, NdpSpoofEngine, SpoofContext};
use netspoof_recon::{
    detect_gateway, EndpointRegistry, LanRegistry, NeighborTracker, NetRecon, SysctlForwarding,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn list_interfaces() {
    for iface in Interface::list_all() {
        let state = if iface.is_up { "up" } else { "down" };
        println!("{:<12} {:<5} {}", iface.name, state, iface);
    }
}

fn select_interface(name: Option<&str>) -> Result<Interface> {
    let interface = match name {
        Some(name) => Interface::by_name(name)?,
        None => Interface::default_interface()?,
    };
    Ok(interface)
}

async fn run(cli: Cli) -> Result<()> {
    let interface = select_interface(cli.interface.as_deref())?;
    info!(interface = %interface, "using interface");

    let gateway = match cli.gateway {
        Some(gateway) => Some(gateway),
        None => match detect_gateway(&interface.name).await {
            Ok(gateway) => Some(gateway),
            Err(e) => {
                warn!(error = %e, "no default gateway found");
                None
            }
        },
    };

    let sink = Arc::new(
        interface
            .open_sink()
            .with_context(|| format!("opening a raw sender on {}", interface.name))?,
    );
    let tracker = Arc::new(NeighborTracker::new(&interface));
    let lan = Arc::new(LanRegistry::for_interface(&interface, gateway));

    let mut ctx = SpoofContext::new(
        interface.clone(),
        sink,
        tracker.clone(),
        lan.clone(),
        Arc::new(SysctlForwarding::new()),
    );
    if let Some(gateway) = gateway {
        ctx = ctx.with_gateway(gateway);
    }

    let engines = EngineRegistry::new();
    engines.register(Arc::new(NetRecon::new(tracker, lan.clone())))?;

    let engine: Option<Arc<dyn Engine>> = match &cli.command {
        Commands::Arp(args) => Some(Arc::new(ArpSpoofEngine::new(ctx, args.config()))),
        Commands::Dns(args) => {
            let source = Arc::new(PcapFrameSource::new(&interface.name));
            Some(Arc::new(DnsSpoofEngine::new(ctx, source, args.config())))
        }
        Commands::Ndp(args) => Some(Arc::new(NdpSpoofEngine::new(ctx, args.config()?))),
        Commands::Recon | Commands::Interfaces => None,
    };

    engines.start(NetRecon::NAME).await?;
    if let Some(engine) = engine {
        let name = engine.name();
        engines.register(engine)?;
        if let Err(e) = engines.start(name).await {
            error!(engine = name, error = %e, "could not start");
            if let Err(e) = engines.stop_all().await {
                warn!(error = %e, "shutdown incomplete");
            }
            return Err(e).with_context(|| format!("starting {}", name));
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("interrupted, shutting down");

    let stopped = engines.stop_all().await;
    for engine in engines.list() {
        info!(
            engine = engine.name,
            sent = engine.stats.packets_sent,
            received = engine.stats.packets_received,
            errors = engine.stats.errors,
            "final stats"
        );
    }

    if matches!(cli.command, Commands::Recon) {
        let mut endpoints = lan.endpoints();
        endpoints.sort_by_key(|e| e.mac);
        for endpoint in endpoints {
            println!(
                "{}  {:<15} {:<26} {}",
                endpoint.mac,
                endpoint.ipv4.map(|ip| ip.to_string()).unwrap_or_else(|| "-".into()),
                endpoint.ipv6.map(|ip| ip.to_string()).unwrap_or_else(|| "-".into()),
                endpoint.alias.as_deref().unwrap_or("")
            );
        }
    }

    stopped.context("stopping engines")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Interfaces = cli.command {
        list_interfaces();
        return Ok(());
    }

    run(cli).await
}
