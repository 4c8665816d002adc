#![warn(missing_docs)]

//! A line-based chat relay built on tokio.
//!
//! Clients connect over TCP, pick a display name and exchange newline-terminated
//! lines. Every line is relayed to the other participants, except commands:
//! `/connected_users`, `/rename` and `/dm`. On SIGINT or SIGTERM the server
//! notifies every client and closes all connections.

use std::{net::SocketAddr, time::Duration};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize logging.
///
/// Log lines go to stdout, filtered through `RUST_LOG` (default `info`). If a
/// `console` address is given, tokio-console events are published there as well.
pub fn init_tracing(console: Option<SocketAddr>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = console.map(|addr| {
        console_subscriber::ConsoleLayer::builder()
            .retention(Duration::from_secs(60))
            .server_addr(addr)
            .spawn()
    });
    tracing_subscriber::registry()
        .with(console)
        .with(fmt::layer().compact().with_filter(filter))
        .init();
}

/// Command line arguments of the server and client binaries.
pub mod arguments;

/// Interactive terminal client.
pub mod client;

/// Newline framing and classification of client input into commands and messages.
pub mod codec;

/// Shareable, timeout-bounded write handle of a client connection.
pub mod connection;

/// Multi-turn commands: listing users, renaming, direct messages.
pub mod dispatcher;

/// The shared table of live connections and display names.
pub mod registry;

/// Rendering of outgoing lines and fan-out to registered connections.
pub mod router;

/// TCP accept loop tying sessions and shutdown together.
pub mod server;

/// Per-connection state machine from accept to close.
pub mod session;

/// Signal handling and the closing broadcast.
pub mod shutdown;

/// Terminal styling of tagged server lines.
pub mod style;

#[cfg(test)]
mod testing;

pub use arguments::{ClientArguments, ServerArguments};
pub use registry::Registry;
