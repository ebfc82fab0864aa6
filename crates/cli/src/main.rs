// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hitch::alert::AlertKind;
use hitch::api::ApiClient;
use hitch::config::Config;
use hitch::presence::run_presence;
use hitch::session::Session;
use hitch::toast::{run_router, Toaster};

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    if let Err(e) = run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).init();
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    // reqwest is built without a default crypto provider; install ring once.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let shutdown = CancellationToken::new();

    let api = ApiClient::new(&config.api_url, config.http_timeout());
    let session = Arc::new(Session::new(api, &config.socket_url()));

    // Connector: a failed connect degrades to no live updates, never fatal.
    if let Err(e) = session.ensure_connected().await {
        warn!(err = %e, "{}", hitch::error::ErrorCode::ConnectFailed.user_message());
    }

    // Notification router: toasts for the process lifetime.
    let toaster = Toaster::new(config.toast_ttl(), config.toast_cap());
    tokio::spawn(run_router(
        Arc::clone(&session),
        toaster.clone(),
        config.dedupe_window(),
        shutdown.clone(),
    ));

    // Presence counter.
    let (count_tx, mut count_rx) = watch::channel(None);
    tokio::spawn(run_presence(Arc::clone(&session), count_tx, shutdown.clone()));
    {
        let sd = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sd.cancelled() => break,
                    changed = count_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if let Some(count) = *count_rx.borrow_and_update() {
                            info!(count, "users online");
                        }
                    }
                }
            }
        });
    }

    // Surface alerts in the log, the headless stand-in for the toaster UI.
    {
        let mut alerts = session.alerts.subscribe();
        let sd = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sd.cancelled() => break,
                    alert = alerts.recv() => match alert {
                        Ok(alert) => match alert.kind {
                            AlertKind::Danger => warn!(message = %alert.message, "alert"),
                            AlertKind::Success => info!(message = %alert.message, "alert"),
                        },
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
    }

    // Signal handler.
    {
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
            let mut sigint =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

            tokio::select! {
                _ = async {
                    if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
                } => {
                    info!("received SIGTERM");
                    sd.cancel();
                }
                _ = async {
                    if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
                } => {
                    info!("received SIGINT");
                    sd.cancel();
                }
            }
        });
    }

    shutdown.cancelled().await;
    info!("shutting down");
    session.socket.disconnect();
    Ok(())
}
