use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use clap::Parser;

/// Server command line arguments.
///
/// Every option may also be set through the environment (or a `.env` file).
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct ServerArguments {
    /// Address to bind the listener on.
    #[clap(short, long, env = "SERVER_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on.
    #[clap(short, long, env = "SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Upper bound in milliseconds for a single write to a client.
    #[clap(long, env = "CHAT_WRITE_TIMEOUT_MS", default_value = "5000")]
    pub write_timeout_ms: u64,

    /// Address to publish console events on.
    #[clap(short, long, value_parser)]
    pub console: Option<SocketAddr>,
}

impl ServerArguments {
    /// The socket address to listen on.
    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Per-write timeout applied to every client connection.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Client command line arguments.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct ClientArguments {
    /// Host name or address of the chat server.
    #[clap(long, env = "SERVER_ADDRESS", default_value = "localhost")]
    pub host: String,

    /// Port of the chat server.
    #[clap(short, long, env = "SERVER_PORT", default_value = "8080")]
    pub port: u16,
}
