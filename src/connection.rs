use std::{
    fmt,
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of an accepted connection.
///
/// Identifiers increase monotonically, so ordering by id is ordering by accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnId(u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Failure to deliver a line to a connection.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The underlying socket reported an error.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The write did not complete in time.
    #[error("write timed out after {0:?}")]
    TimedOut(Duration),

    /// The connection has already been closed.
    #[error("connection closed")]
    Closed,
}

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Shareable write side of a client connection.
///
/// The owning session keeps the read side. Everyone else (router, dispatcher,
/// shutdown) writes through this handle. Whole lines are written under a lock,
/// so lines from concurrent writers never interleave.
pub struct Connection {
    id: ConnId,
    addr: SocketAddr,
    writer: Mutex<Writer>,
    write_timeout: Duration,
    closed: CancellationToken,
}

impl Connection {
    /// Wrap the write half of an accepted connection.
    pub fn new<W>(addr: SocketAddr, writer: W, write_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id: ConnId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            addr,
            writer: Mutex::new(Box::new(writer)),
            write_timeout,
            closed: CancellationToken::new(),
        }
    }

    /// Identifier assigned on accept.
    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Remote address of the client.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Write `line` and flush, bounded by the write timeout.
    ///
    /// Waiting for another writer to finish counts against the timeout as well,
    /// so a stalled peer cannot hold up a broadcast for longer than that.
    ///
    /// A failed or timed-out write may leave part of `line` on the stream, so
    /// the connection is marked closed: later sends fail with
    /// [`SendError::Closed`] and the owning session winds down.
    pub async fn send(&self, line: &str) -> Result<(), SendError> {
        if self.closed.is_cancelled() {
            return Err(SendError::Closed);
        }
        let write = async {
            let mut writer = self.writer.lock().await;
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        };
        let error = match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(error)) => SendError::Io(error),
            Err(_elapsed) => SendError::TimedOut(self.write_timeout),
        };
        self.closed.cancel();
        Err(error)
    }

    /// Force the connection closed.
    ///
    /// Wakes the owning session (see [`Connection::closed`]) and shuts down the
    /// write half. Closing twice is harmless.
    pub async fn close(&self) {
        self.closed.cancel();
        let shutdown = async { self.writer.lock().await.shutdown().await };
        match tokio::time::timeout(self.write_timeout, shutdown).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::debug!(peer = %self.addr, %error, "Shutdown of writer failed")
            }
            Err(_elapsed) => {
                tracing::debug!(peer = %self.addr, "Shutdown of writer timed out")
            }
        }
    }

    /// Completes once the connection is closed, by [`Connection::close`] or
    /// by a failed send.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}
