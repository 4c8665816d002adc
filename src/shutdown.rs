use anyhow::Context;

use crate::registry::Registry;

/// Sent to every registered client before its connection is closed.
pub const SHUTDOWN_NOTICE: &str = "[INFO] Server is shutting down.\n";

/// Completes on the first SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn wait_for_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt =
        signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        _ = interrupt.recv() => tracing::info!("Received SIGINT"),
        _ = terminate.recv() => tracing::info!("Received SIGTERM"),
    }
    Ok(())
}

/// Completes on the first Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_signal() -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Received Ctrl-C");
    Ok(())
}

/// Notify and close every registered connection, emptying `registry`.
///
/// Best effort: failures are logged and not retried. Returns how many
/// connections were closed.
pub async fn close_all(registry: &Registry) -> usize {
    let members = registry.drain().await;
    tracing::info!(clients = members.len(), "Shutting down server");
    for member in &members {
        let connection = &member.connection;
        if let Err(error) = connection.send(SHUTDOWN_NOTICE).await {
            tracing::debug!(
                peer = %connection.addr(),
                name = %member.name,
                %error,
                "Failed to send shutdown notice"
            );
        }
        connection.close().await;
    }
    members.len()
}
