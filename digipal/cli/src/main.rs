//! DigiPal terminal client
//!
//! Reads chat lines and `/commands` from stdin, forwards them to the
//! Conductor, and renders everything it sends back on stdout.

mod render;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use digipal_core::{
    default_config_path, load_config_from_path, Conductor, ConductorConfig, ConductorMessage,
    ConfigOverrides, HttpBackend, PetType, SurfaceEvent,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

use crate::render::{OutputMode, Renderer};

/// Chat with your DigiPal from the terminal
#[derive(Parser, Debug)]
#[command(name = "digipal", author, version, about, long_about = None)]
struct Args {
    /// Path to the config file (defaults to the user config dir)
    #[arg(short, long, env = "DIGIPAL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Chat endpoint URL
    #[arg(short, long, value_name = "URL")]
    endpoint: Option<String>,

    /// Name of the starting pet
    #[arg(long, value_name = "NAME")]
    pet_name: Option<String>,

    /// Archetype of the starting pet (cat, dog, bunny, frog, cactus)
    #[arg(long, value_name = "TYPE", value_parser = parse_pet_type)]
    pet_type: Option<PetType>,

    /// Disable narration of replies
    #[arg(long)]
    mute: bool,

    /// Skip the opening greeting
    #[arg(long)]
    no_greet: bool,

    /// Write one JSON message per line instead of a chat log
    #[arg(long)]
    json: bool,

    /// Log level
    #[arg(long, default_value = "warn", env = "DIGIPAL_LOG_LEVEL")]
    log_level: String,
}

fn parse_pet_type(s: &str) -> Result<PetType, String> {
    s.parse()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays a clean transcript
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("digipal={}", args.log_level).parse()?)
                .add_directive(format!("digipal_core={}", args.log_level).parse()?),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(config_path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(endpoint) = args.endpoint.clone() {
        overrides = overrides.with_endpoint(endpoint);
    }
    if let Some(name) = args.pet_name.clone() {
        overrides = overrides.with_pet_name(name);
    }
    if let Some(pet_type) = args.pet_type {
        overrides = overrides.with_pet_type(pet_type);
    }
    if args.mute {
        overrides = overrides.with_speech_enabled(false);
    }
    overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        endpoint = %config.endpoint,
        source = %config.source(),
        pet = %config.pet_name,
        "Starting DigiPal"
    );

    let backend = HttpBackend::new(config.endpoint.clone(), config.retry.timeout)?;
    let (tx, rx) = mpsc::channel(256);
    let conductor = Arc::new(Conductor::new(backend, ConductorConfig::from(&config), tx));

    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Plain
    };
    let (quit_tx, mut quit_rx) = oneshot::channel();
    let renderer = tokio::spawn(render_loop(
        rx,
        Renderer::new(mode, config.pet_name.clone()),
        quit_tx,
    ));

    conductor.start().await?;
    if !args.no_greet {
        let greeter = Arc::clone(&conductor);
        tokio::spawn(async move {
            if let Err(e) = greeter.greet().await {
                tracing::warn!(error = %e, "Greeting failed");
            }
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut quit_sent = false;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let Some(event) = SurfaceEvent::from_input(&line) else {
                            continue;
                        };
                        // Each event runs on its own task so a new message can
                        // supersede a turn that is still waiting on the backend
                        let conductor = Arc::clone(&conductor);
                        tokio::spawn(async move {
                            if let Err(e) = conductor.handle_event(event).await {
                                tracing::error!(error = %e, "Failed to handle event");
                            }
                        });
                    }
                    Ok(None) => {
                        tracing::debug!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
            _ = &mut quit_rx => {
                quit_sent = true;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C");
                break;
            }
        }
    }

    if !quit_sent {
        conductor.shutdown().await?;
    }
    if let Err(e) = renderer.await {
        tracing::warn!(error = %e, "Renderer task failed");
    }

    Ok(())
}

/// Print conductor messages until the conductor asks the surface to quit
async fn render_loop(
    mut rx: mpsc::Receiver<ConductorMessage>,
    mut renderer: Renderer,
    quit_tx: oneshot::Sender<()>,
) {
    let mut quit_tx = Some(quit_tx);
    let mut stdout = std::io::stdout();

    while let Some(msg) = rx.recv().await {
        if let Some(out) = renderer.render(&msg) {
            if let Err(e) = stdout.write_all(out.as_bytes()).and_then(|()| stdout.flush()) {
                tracing::warn!(error = %e, "Failed to write to stdout");
            }
        }
        if matches!(msg, ConductorMessage::Quit { .. }) {
            if let Some(quit_tx) = quit_tx.take() {
                let _ = quit_tx.send(());
            }
            break;
        }
    }
}
