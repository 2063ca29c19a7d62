//! Digital-Voice Gateway Daemon
//!
//! Bridges one D-Star, DMR, System Fusion, P25, NXDN, FM or M17 network to
//! target networks of other modes, as described by a JSON configuration.
//!
//! Signals: SIGINT and SIGTERM shut the gateway down, SIGHUP reloads the
//! ID tables.

mod settings;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dv_gateway::{Gateway, GatewayCommand, GatewayConfig, SerialTranscoder, Transcoder};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dvbridge")]
#[command(about = "Cross-mode digital-voice gateway", version)]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/dvbridge/dvbridge.json)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Check the configuration and list the routes, then exit
    #[arg(long)]
    check: bool,

    /// Print a starter configuration and exit
    #[arg(long, conflicts_with = "check")]
    example: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "dvbridge=info,dv_protocol=info,dv_gateway=info,dv_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.example {
        println!("{}", serde_json::to_string_pretty(&settings::example())?);
        return Ok(());
    }

    let path = match cli.config {
        Some(path) => path,
        None => settings::default_config_path()
            .context("cannot locate the configuration directory, pass --config")?,
    };
    let config = GatewayConfig::load(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    if cli.check {
        print_summary(&config);
        return Ok(());
    }

    info!("Starting dvbridge with {}", path.display());
    let transcoder = config.transcoder.as_ref().map(|t| {
        Box::new(SerialTranscoder::new(&t.port, t.speed)) as Box<dyn Transcoder>
    });
    let gateway = Gateway::open(&config, transcoder)
        .await
        .context("starting the gateway")?;

    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let task = tokio::spawn(gateway.run(cmd_rx));
    wait_for_signals(&cmd_tx).await?;
    cmd_tx.send(GatewayCommand::Shutdown).await.ok();
    task.await.context("gateway task")?;
    Ok(())
}

fn print_summary(config: &GatewayConfig) {
    println!("From: {}", config.from.mode);
    for network in &config.to {
        println!(
            "To:   {} via {}:{}",
            network.mode, network.endpoint.remote_address, network.endpoint.remote_port
        );
    }
    let tables = config.route_tables();
    for route in &config.routes {
        println!("  {} -> {}", route.from, route.to);
    }
    println!(
        "{} route(s) in use, passthrough {}",
        tables.len(),
        if config.passthrough { "on" } else { "off" }
    );
}

/// Block until a shutdown signal, passing reload requests on meanwhile
#[cfg(unix)]
async fn wait_for_signals(cmd_tx: &mpsc::Sender<GatewayCommand>) -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
            _ = terminate.recv() => {
                info!("Terminated");
                return Ok(());
            }
            _ = hangup.recv() => {
                if cmd_tx.send(GatewayCommand::Reload).await.is_err() {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signals(_cmd_tx: &mpsc::Sender<GatewayCommand>) -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Interrupted");
    Ok(())
}
