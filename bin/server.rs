use anyhow::Context;
use clap::Parser;
use linechat::{init_tracing, server, shutdown, Registry, ServerArguments};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = ServerArguments::parse();

    init_tracing(args.console);

    let address = args.address();
    let listener = TcpListener::bind(address)
        .await
        .context(format!("Failed to bind on {address}"))?;
    tracing::info!("Chat server started on {address}");

    let registry = Registry::new();
    server::run(
        listener,
        registry,
        args.write_timeout(),
        shutdown::wait_for_signal(),
    )
    .await
}
