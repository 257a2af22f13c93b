//! Localhost HTTPS bridge between a browser identity portal and a
//! smartcard reader
//!
//! Listens on localhost, authenticates the portal by origin, and translates
//! JSON requests into APDU exchanges with the card. Supports systemd socket
//! activation: when started with an inherited listener, it serves a fixed
//! activation window and exits, letting the socket unit restart it on demand.

use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use scbridge_pcsc::PcscDeviceManager;
use tokio::net::TcpListener;
use tracing::info;

mod api;
mod cli;
mod config;
mod logging;
mod server;
mod state;
mod tls;

/// First fd systemd passes with socket activation
const SYSTEMD_FIRST_SOCKET_FD: i32 = 3;

/// How long a socket-activated instance serves before exiting
const ACTIVATION_WINDOW: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = cli::Cli::parse();

    let tls_paths = config::resolve_tls_paths(&args)?;
    let acceptor = tls::acceptor(&tls_paths)?;

    let manager = PcscDeviceManager::new().context("establishing PC/SC context")?;
    let bridge = state::Bridge::new(manager, Duration::from_secs(args.card_timeout));

    let (listener, activation_window) = bind_listener(&args).await?;
    let port = listener.local_addr().map(|a| a.port()).unwrap_or(args.listen.port());

    let context = Arc::new(server::ServerContext {
        bridge,
        origin: args.origin,
        port,
    });

    info!(port, activated = activation_window.is_some(), "bridge listening");
    server::serve(listener, acceptor, context, shutdown(activation_window)).await;

    Ok(())
}

/// Bind the listener, adopting the systemd-inherited socket when activated
async fn bind_listener(args: &cli::Cli) -> Result<(TcpListener, Option<Duration>)> {
    if socket_activated() {
        let std_listener = inherited_listener();
        std_listener
            .set_nonblocking(true)
            .context("configuring inherited socket")?;
        let listener =
            TcpListener::from_std(std_listener).context("adopting inherited socket")?;
        return Ok((listener, Some(ACTIVATION_WINDOW)));
    }

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    Ok((listener, None))
}

fn socket_activated() -> bool {
    std::env::var("LISTEN_PID").is_ok_and(|pid| pid == process::id().to_string())
}

fn inherited_listener() -> std::net::TcpListener {
    use std::os::fd::{FromRawFd, RawFd};
    // Safety: under socket activation systemd guarantees fd 3 is our
    // listening socket and nothing else in the process owns it.
    unsafe { std::net::TcpListener::from_raw_fd(SYSTEMD_FIRST_SOCKET_FD as RawFd) }
}

/// Resolve on ctrl-c, or when the activation window expires
async fn shutdown(window: Option<Duration>) {
    match window {
        Some(window) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = tokio::time::sleep(window) => {
                    info!("activation window expired");
                }
            }
        }
        None => {
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}
