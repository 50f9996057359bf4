mod clipboard;
mod collection;
mod config;
mod engine;
mod gating;
mod reconcile;
mod row;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use xharvest_api_client::ApiClient;

use crate::engine::{ControllerEvent, Engine, UiEffect, run_controller};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("xharvest_controller=info".parse().unwrap())
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        error!("Controller fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    info!("xharvest-controller starting");

    let cfg = config::load_config()?;
    let client = Arc::new(ApiClient::new(
        &cfg.server.url,
        Duration::from_secs(cfg.server.request_timeout_secs),
    )?);
    info!("Backend: {}", client.base_url());

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (effects_tx, effects_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Seed the credentials-configured flag; the rendering layer pushes
    // later changes as settings_changed events.
    match client.settings().await {
        Ok(settings) => {
            let _ = events_tx.send(ControllerEvent::SettingsChanged {
                settings: settings.into(),
            });
        }
        Err(e) => warn!("Settings unavailable at startup, actions stay gated: {e}"),
    }

    let controller_handle = tokio::spawn(run_controller(
        Arc::clone(&client),
        Engine::new(),
        events_rx,
        events_tx.clone(),
        effects_tx,
        shutdown_rx.clone(),
    ));

    let reconcile_handle = tokio::spawn(reconcile::run_reconciliation(
        Arc::clone(&client),
        Duration::from_secs(cfg.reconcile.poll_interval_secs.max(1)),
        events_tx.clone(),
        shutdown_rx.clone(),
    ));

    // The rendering layer attaches over stdio: one JSON event per input
    // line, one JSON effect per output line.
    let stdin_handle = tokio::spawn(read_events_from_stdin(events_tx, shutdown_rx));
    let stdout_handle = tokio::spawn(write_effects_to_stdout(effects_rx));

    wait_for_shutdown().await;

    info!("Shutdown signal received, stopping...");
    let _ = shutdown_tx.send(true);

    let _ = controller_handle.await;
    let _ = reconcile_handle.await;
    stdin_handle.abort();
    stdout_handle.abort();

    info!("xharvest-controller stopped");
    Ok(())
}

/// Parse newline-delimited JSON events from stdin and feed the controller.
async fn read_events_from_stdin(
    events: mpsc::UnboundedSender<ControllerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<ControllerEvent>(line) {
                            Ok(event) => {
                                if events.send(event).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Ignoring malformed event: {e}"),
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        warn!("stdin read error: {e}");
                        break;
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// Emit effects as newline-delimited JSON on stdout.
async fn write_effects_to_stdout(mut effects: mpsc::UnboundedReceiver<UiEffect>) {
    while let Some(effect) = effects.recv().await {
        match serde_json::to_string(&effect) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("Could not serialize effect: {e}"),
        }
    }
}

/// Wait for SIGTERM or SIGINT.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
