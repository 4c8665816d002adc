//! Helpers shared by the unit tests.

use std::{sync::Arc, time::Duration};

use tokio::io::{duplex, AsyncBufReadExt, BufReader, DuplexStream};

use crate::connection::{ConnId, Connection};

/// The far end of a [`Connection`] backed by an in-memory pipe.
#[derive(Debug)]
pub struct Client {
    pub connection: Arc<Connection>,
    reader: BufReader<DuplexStream>,
}

impl Client {
    pub fn new() -> Self {
        let (ours, theirs) = duplex(4096);
        Self {
            connection: Arc::new(Connection::new(
                "127.0.0.1:5000".parse().unwrap(),
                ours,
                Duration::from_secs(1),
            )),
            reader: BufReader::new(theirs),
        }
    }

    pub fn id(&self) -> ConnId {
        self.connection.id()
    }

    /// Next line written to the connection, newline included.
    pub async fn line(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(1), self.reader.read_line(&mut line))
            .await
            .expect("no line arrived")
            .expect("read failed");
        line
    }

    /// Fails if anything was written to the connection.
    pub async fn assert_silent(&mut self) {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line);
        match tokio::time::timeout(Duration::from_millis(50), read).await {
            Err(_) | Ok(Ok(0)) => {}
            Ok(result) => panic!("unexpected output {line:?} ({result:?})"),
        }
    }
}
