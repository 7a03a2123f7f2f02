//! GaggiMate command-line client
//!
//! Connects to the controller's WebSocket endpoint, mirrors its status and
//! sends control commands. Every command waits for the next status report
//! before exiting, since the report (not the send) is what shows whether the
//! machine acted on it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gm_client::{ClientContext, ConnectionEvent};
use gm_core::config::{self, ClientConfig};
use gm_core::{ConnectionStatus, MachineStatus, ProcessState, Snapshot};
use gm_protocol::{BrewTarget, Capabilities, Command, InboundFrame, Mode};

#[derive(Parser)]
#[command(name = "gm-client")]
#[command(about = "GaggiMate client - live machine status and control")]
#[command(version)]
struct Args {
    /// Controller to connect to: host name, IP or full ws:// URL
    /// Example: gaggimate.local or ws://192.168.4.1/ws
    #[arg(short, long, env = "GAGGIMATE_DEVICE", global = true)]
    device: Option<String>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Seconds to wait for the machine before giving up
    #[arg(long, default_value_t = 15, global = true)]
    timeout: u64,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Stream status changes until interrupted
    Watch {
        /// Print each snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the current status and exit
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send a command and print the status that follows
    Send {
        #[command(subcommand)]
        command: SendCmd,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SendCmd {
    /// Switch operating mode (standby, brew, steam, water)
    Mode { mode: Mode },

    /// Switch the brew stop condition (time, weight)
    BrewTarget { target: BrewTarget },

    /// Start the current mode's process
    Activate,

    /// Stop the running process
    Deactivate,

    /// Dismiss a finished process
    Clear,

    /// Start, stop or dismiss, depending on the process state
    Toggle,

    /// Zero the scale
    Tare,

    /// Send a raw JSON command, e.g. '{"tp":"req:change-mode","mode":1}'
    Raw { json: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging. Status output goes to stdout, logs to stderr.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);

    let mut config = if config_path.exists() {
        config::load_config(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", config_path, e);
            ClientConfig::default()
        })
    } else {
        ClientConfig::default()
    };

    // Apply command-line overrides
    if let Some(device) = args.device.as_deref() {
        config.set_device(device);
    }

    let timeout = Duration::from_secs(args.timeout);

    match args.command {
        Cmd::Watch { json } => watch(config, json).await,
        Cmd::Status { json } => status(config, timeout, json).await,
        Cmd::Send { command } => send(config, timeout, command).await,
        Cmd::Config { action } => match action {
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        config_path.display()
                    );
                }
                config::save_config(&config_path, &config)
                    .with_context(|| format!("Failed to write {}", config_path.display()))?;
                println!("Wrote {}", config_path.display());
                Ok(())
            }
            ConfigAction::Show => {
                let rendered =
                    config::render_config(&config).context("Failed to render configuration")?;
                println!("# {}", config_path.display());
                print!("{}", rendered);
                Ok(())
            }
        },
    }
}

async fn watch(config: ClientConfig, json: bool) -> Result<()> {
    let ctx = ClientContext::new(config);
    let mut view = ctx.view();
    let mut status_rx = ctx.watch_status();
    ctx.connect()?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *status_rx.borrow_and_update();
                println!("-- {}", status);
            }
            snap = view.changed() => {
                let Some(snap) = snap else { break };
                // Placeholders between connect and the first report are noise
                if snap.is_live() {
                    print_snapshot(&snap, ctx.status(), json)?;
                }
            }
        }
    }

    ctx.shutdown().await;
    Ok(())
}

async fn status(config: ClientConfig, timeout: Duration, json: bool) -> Result<()> {
    let ctx = ClientContext::new(config);
    ctx.connect()?;

    let result = wait_live(&ctx, timeout).await;
    if let Ok(snap) = &result {
        print_snapshot(snap, ctx.status(), json)?;
    }

    ctx.shutdown().await;
    result.map(|_| ())
}

async fn send(config: ClientConfig, timeout: Duration, command: SendCmd) -> Result<()> {
    let ctx = ClientContext::new(config);
    ctx.connect()?;

    let result = send_and_report(&ctx, timeout, command).await;

    ctx.shutdown().await;
    result
}

async fn send_and_report(ctx: &ClientContext, timeout: Duration, command: SendCmd) -> Result<()> {
    let snap = wait_live(ctx, timeout).await?;
    let mut events = ctx.events();
    let dispatcher = ctx.dispatcher();

    let command = match command {
        SendCmd::Mode { mode } => Command::ChangeMode { mode },
        SendCmd::BrewTarget { target } => {
            if !snap.process_state().can_change_brew_target() {
                anyhow::bail!("Brew target can only be changed while no process is shown");
            }
            Command::ChangeBrewTarget { target }
        }
        SendCmd::Activate => Command::ProcessActivate,
        SendCmd::Deactivate => Command::ProcessDeactivate,
        SendCmd::Clear => Command::ProcessClear,
        SendCmd::Toggle => snap.process_state().primary_action(),
        SendCmd::Tare => Command::ScaleTare,
        SendCmd::Raw { json } => {
            let value: serde_json::Value =
                serde_json::from_str(&json).context("Command is not valid JSON")?;
            Command::from_value(value).context("Invalid command")?
        }
    };

    dispatcher
        .send(command)
        .await
        .context("Failed to send command")?;
    tracing::info!("Sent {}", command.tp());

    let wait = async {
        loop {
            match events.recv().await {
                Ok(ConnectionEvent::FrameReceived(
                    InboundFrame::Status(_) | InboundFrame::Delta(_),
                )) => return Ok(()),
                Ok(ConnectionEvent::Disconnected { reason }) => {
                    anyhow::bail!("Connection lost before the machine reported back: {}", reason)
                }
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => anyhow::bail!("Connection closed"),
            }
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .context("Timed out waiting for a status report")??;

    print_snapshot(&ctx.view().snapshot(), ctx.status(), false)
}

async fn wait_live(ctx: &ClientContext, timeout: Duration) -> Result<Snapshot> {
    let mut view = ctx.view();
    tokio::time::timeout(timeout, view.wait_for(|s| s.is_live()))
        .await
        .with_context(|| {
            format!(
                "Timed out after {:?} waiting for {}",
                timeout,
                ctx.connection().endpoint()
            )
        })?
        .context("Status store closed")
}

#[derive(Serialize)]
struct StatusReport<'a> {
    connection: ConnectionStatus,
    status: &'a MachineStatus,
    capabilities: &'a Capabilities,
}

fn print_snapshot(snap: &Snapshot, connection: ConnectionStatus, json: bool) -> Result<()> {
    if json {
        let report = StatusReport {
            connection,
            status: &snap.status,
            capabilities: &snap.capabilities,
        };
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}", render(snap));
    }
    Ok(())
}

/// One-line human readable summary
fn render(snap: &Snapshot) -> String {
    let s = &snap.status;
    let mut line = format!(
        "{} | {:.1}/{:.1}°C",
        s.mode, s.current_temperature, s.target_temperature
    );

    if snap.capabilities.pressure {
        line.push_str(&format!(
            " | {:.1}/{:.1} bar | {:.1} ml/s",
            s.current_pressure, s.target_pressure, s.current_flow
        ));
    }
    if let Some(weight) = s.current_weight {
        line.push_str(&format!(" | {:.1} g", weight));
    }
    if let Some(profile) = s.selected_profile.as_deref() {
        line.push_str(&format!(" | {}", profile));
    }

    let state = snap.process_state();
    match state.progress() {
        None => line.push_str(&format!(" | target: {}", s.brew_target)),
        Some(progress) => {
            let prefix = if state.is_finished() { "done " } else { "" };
            line.push_str(&format!(
                " | {}{} {:.0}% {} of {}",
                prefix,
                progress.stage_title(),
                progress.percent(),
                progress.elapsed_display(),
                progress.target_display()
            ));
        }
    }
    if let ProcessState::Active(info) | ProcessState::Finished(info) = &state {
        if !info.label.is_empty() {
            line.push_str(&format!(" ({})", info.label));
        }
    }

    line
}
