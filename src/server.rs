use std::{future::Future, time::Duration};

use anyhow::Context;
use tokio::net::TcpListener;

use crate::{registry::Registry, session, shutdown};

/// Accept clients on `listener` until `shutdown_signal` completes.
///
/// Each accepted socket gets its own task running
/// [`session::handle_connection`]. When the signal fires, the listener is
/// dropped and every registered client is notified and disconnected.
///
/// # Termination
/// Returns after the shutdown broadcast, or with an error if `shutdown_signal`
/// fails.
pub async fn run<Signal>(
    listener: TcpListener,
    registry: Registry,
    write_timeout: Duration,
    shutdown_signal: Signal,
) -> anyhow::Result<()>
where
    Signal: Future<Output = anyhow::Result<()>>,
{
    tokio::select! {
        () = accept_loop(&listener, &registry, write_timeout) => {}
        result = shutdown_signal => result.context("Failed to wait for shutdown signal")?,
    }
    drop(listener);
    shutdown::close_all(&registry).await;
    Ok(())
}

async fn accept_loop(listener: &TcpListener, registry: &Registry, write_timeout: Duration) {
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                tracing::warn!(%error, "Failed to accept on socket");
                continue;
            }
        };

        let registry = registry.clone();
        tokio::spawn(async move {
            let (reader, writer) = socket.into_split();
            session::handle_connection(addr, reader, writer, registry, write_timeout).await;
        });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{session::NAME_PROMPT, shutdown::SHUTDOWN_NOTICE};
    use std::net::SocketAddr;
    use tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        net::{
            tcp::{OwnedReadHalf, OwnedWriteHalf},
            TcpStream,
        },
        sync::oneshot,
        task::JoinHandle,
    };

    struct TestClient {
        reader: BufReader<OwnedReadHalf>,
        writer: OwnedWriteHalf,
    }

    impl TestClient {
        async fn connect(addr: SocketAddr) -> Self {
            let (reader, writer) = TcpStream::connect(addr).await.unwrap().into_split();
            Self {
                reader: BufReader::new(reader),
                writer,
            }
        }

        async fn join(addr: SocketAddr, name: &str) -> Self {
            let mut client = Self::connect(addr).await;
            assert_eq!(client.line().await, NAME_PROMPT);
            client.send(name).await;
            assert_eq!(client.line().await, "You have logged in.\n");
            client
        }

        async fn send(&mut self, line: &str) {
            self.writer
                .write_all(format!("{line}\n").as_bytes())
                .await
                .unwrap();
        }

        async fn line(&mut self) -> String {
            let mut line = String::new();
            tokio::time::timeout(Duration::from_secs(2), self.reader.read_line(&mut line))
                .await
                .expect("no line arrived")
                .unwrap();
            line
        }

        async fn assert_silent(&mut self) {
            let mut line = String::new();
            let read =
                tokio::time::timeout(Duration::from_millis(100), self.reader.read_line(&mut line))
                    .await;
            assert!(read.is_err(), "unexpected output {line:?}");
        }
    }

    struct TestServer {
        addr: SocketAddr,
        registry: Registry,
        stop: oneshot::Sender<()>,
        handle: JoinHandle<anyhow::Result<()>>,
    }

    async fn start() -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let registry = Registry::new();
        let (stop, stopped) = oneshot::channel::<()>();
        let signal = async move {
            stopped.await.context("Stop sender dropped")?;
            Ok::<(), anyhow::Error>(())
        };
        let handle = tokio::spawn(run(
            listener,
            registry.clone(),
            Duration::from_secs(1),
            signal,
        ));
        TestServer {
            addr,
            registry,
            stop,
            handle,
        }
    }

    #[tokio::test]
    async fn duplicate_name_stays_unregistered() {
        let server = start().await;
        let _alice = TestClient::join(server.addr, "alice").await;

        let mut impostor = TestClient::connect(server.addr).await;
        assert_eq!(impostor.line().await, NAME_PROMPT);
        impostor.send("alice").await;
        assert_eq!(impostor.line().await, "Display name [alice] is already taken.\n");
        assert_eq!(impostor.line().await, NAME_PROMPT);

        let names: Vec<String> = server
            .registry
            .snapshot()
            .await
            .into_iter()
            .map(|member| member.name)
            .collect();
        assert_eq!(names, ["alice"]);
    }

    #[tokio::test]
    async fn chat_is_relayed_to_others() {
        let server = start().await;
        let mut alice = TestClient::join(server.addr, "alice").await;
        let mut bob = TestClient::join(server.addr, "bob").await;
        let info = alice.line().await;
        assert!(info.starts_with("[INFO] ["), "{info}");
        assert!(info.ends_with("] bob has logged in.\n"), "{info}");

        alice.send("hi").await;

        assert_eq!(bob.line().await, "[MSG][alice]: hi\n");
        alice.assert_silent().await;
    }

    #[tokio::test]
    async fn direct_message_reaches_only_recipient() {
        let server = start().await;
        let mut alice = TestClient::join(server.addr, "alice").await;
        let mut bob = TestClient::join(server.addr, "bob").await;
        let mut carol = TestClient::join(server.addr, "carol").await;
        alice.line().await; // bob has logged in
        alice.line().await; // carol has logged in
        bob.line().await; // carol has logged in

        alice.send("/dm").await;
        assert_eq!(alice.line().await, "Enter recipient name:\n");
        alice.send("bob").await;
        assert_eq!(alice.line().await, "Enter message:\n");
        alice.send("secret").await;

        assert_eq!(bob.line().await, "[MSG] [alice] (DM): secret\n");
        carol.assert_silent().await;
        alice.assert_silent().await;
    }

    #[tokio::test]
    async fn direct_message_to_self_is_refused() {
        let server = start().await;
        let mut alice = TestClient::join(server.addr, "alice").await;
        let mut bob = TestClient::join(server.addr, "bob").await;
        alice.line().await; // bob has logged in

        alice.send("/dm").await;
        assert_eq!(alice.line().await, "Enter recipient name:\n");
        alice.send("alice").await;

        assert_eq!(alice.line().await, "Cannot send DM to yourself.\n");
        bob.assert_silent().await;
    }

    #[tokio::test]
    async fn disconnect_is_announced() {
        let server = start().await;
        let mut alice = TestClient::join(server.addr, "alice").await;
        let bob = TestClient::join(server.addr, "bob").await;
        alice.line().await; // bob has logged in

        drop(bob);

        let info = alice.line().await;
        assert!(info.ends_with("] bob disconnected.\n"), "{info}");
    }

    #[tokio::test]
    async fn shutdown_notifies_and_closes_everyone() {
        let server = start().await;
        let mut alice = TestClient::join(server.addr, "alice").await;
        let mut bob = TestClient::join(server.addr, "bob").await;
        alice.line().await; // bob has logged in

        server.stop.send(()).unwrap();
        server.handle.await.unwrap().unwrap();

        for client in [&mut alice, &mut bob] {
            assert_eq!(client.line().await, SHUTDOWN_NOTICE);
            assert_eq!(client.line().await, "", "connection should be closed");
        }
        assert!(server.registry.is_empty().await);
        assert!(TcpStream::connect(server.addr).await.is_err());
    }
}
