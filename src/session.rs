use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, LinesCodec};

use crate::{
    codec::{self, Unit},
    connection::Connection,
    dispatcher::{Command, Dialog, Dispatcher},
    registry::{Registry, RegistryError},
    router::{self, Mode, Outbound},
};

/// Sent whenever a display name is expected.
pub const NAME_PROMPT: &str = "Please enter your display name:\n";

/// Lifecycle of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Accepted, nothing sent yet.
    Connecting,

    /// Waiting for an acceptable display name.
    NamingInProgress,

    /// Registered and relaying.
    Active,

    /// Tearing down.
    Closing(CloseReason),

    /// Done. Nothing more happens on this connection.
    Closed,
}

/// Why a session is closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// EOF or a transport error on the client side.
    Disconnected,

    /// The connection was closed on the server side: on shutdown, or after a
    /// write to it failed.
    ForceClosed,
}

enum Input {
    Line(String),
    Lost,
    ForceClosed,
}

/// Serve one client from accept to close.
///
/// The client is asked for a display name until it picks a free one, then every
/// line it sends is either dispatched as a command or relayed to everybody else.
///
/// # Termination
/// The future completes when `reader` signals EOF or fails, or when the
/// connection is closed on the server side (see [`Connection::closed`]).
/// Transport errors end the session and are only logged: a vanished client is
/// a normal way for a session to end.
pub async fn handle_connection<Reader, Writer>(
    addr: SocketAddr,
    reader: Reader,
    writer: Writer,
    registry: Registry,
    write_timeout: Duration,
) where
    Reader: AsyncRead + Unpin,
    Writer: AsyncWrite + Send + Unpin + 'static,
{
    let connection = Arc::new(Connection::new(addr, writer, write_timeout));
    Session::new(connection, reader, registry).run().await
}

/// State machine driving a single connection.
pub struct Session<Reader> {
    connection: Arc<Connection>,
    lines: FramedRead<Reader, LinesCodec>,
    registry: Registry,
    state: State,
    dialog: Dialog,
}

impl<Reader> Session<Reader>
where
    Reader: AsyncRead + Unpin,
{
    /// A session reading from `reader` and writing through `connection`.
    pub fn new(connection: Arc<Connection>, reader: Reader, registry: Registry) -> Self {
        Self {
            connection,
            lines: codec::lines(reader),
            registry,
            state: State::Connecting,
            dialog: Dialog::Idle,
        }
    }

    /// Run until the session is [`State::Closed`].
    pub async fn run(mut self) {
        let id = self.connection.id();
        tracing::info!(peer = %self.connection.addr(), %id, "New connection");
        while self.state != State::Closed {
            self.state = match self.state {
                State::Connecting => self.prompt_for_name().await,
                State::NamingInProgress => match self.next_input().await {
                    Input::Line(line) => self.negotiate_name(&line).await,
                    Input::Lost => State::Closing(CloseReason::Disconnected),
                    Input::ForceClosed => State::Closing(CloseReason::ForceClosed),
                },
                State::Active => match self.next_input().await {
                    Input::Line(line) => {
                        self.handle_line(line).await;
                        State::Active
                    }
                    Input::Lost => State::Closing(CloseReason::Disconnected),
                    Input::ForceClosed => State::Closing(CloseReason::ForceClosed),
                },
                State::Closing(reason) => {
                    self.teardown(reason).await;
                    State::Closed
                }
                State::Closed => State::Closed,
            };
        }
    }

    async fn next_input(&mut self) -> Input {
        tokio::select! {
            biased;
            _ = self.connection.closed() => Input::ForceClosed,
            line = self.lines.next() => match line {
                Some(Ok(line)) => Input::Line(line),
                Some(Err(error)) => {
                    tracing::debug!(peer = %self.connection.addr(), %error, "Read failed");
                    Input::Lost
                }
                None => Input::Lost,
            },
        }
    }

    async fn prompt_for_name(&self) -> State {
        match self.connection.send(NAME_PROMPT).await {
            Ok(()) => State::NamingInProgress,
            Err(error) => {
                tracing::debug!(peer = %self.connection.addr(), %error, "Failed to ask for name");
                State::Closing(CloseReason::Disconnected)
            }
        }
    }

    async fn negotiate_name(&self, line: &str) -> State {
        let Some(name) = codec::display_name(line) else {
            return self.prompt_for_name().await;
        };
        match self.registry.register(Arc::clone(&self.connection), &name).await {
            Ok(()) => {
                tracing::info!(peer = %self.connection.addr(), %name, "Logged in");
                let id = self.connection.id();
                router::broadcast(
                    &self.registry,
                    id,
                    &Outbound::info(&name, "has logged in."),
                    Mode::ToOthers,
                )
                .await;
                router::broadcast(
                    &self.registry,
                    id,
                    &Outbound::Notice("You have logged in.\n".to_string()),
                    Mode::ToSelfOnly,
                )
                .await;
                State::Active
            }
            Err(RegistryError::NameTaken(name)) => {
                tracing::debug!(peer = %self.connection.addr(), %name, "Display name taken");
                let rejection = format!("Display name [{name}] is already taken.\n");
                match self.connection.send(&rejection).await {
                    Ok(()) => self.prompt_for_name().await,
                    Err(_) => State::Closing(CloseReason::Disconnected),
                }
            }
            Err(error @ RegistryError::AlreadyRegistered(_)) => {
                tracing::warn!(peer = %self.connection.addr(), %error, "Registered twice");
                State::Closing(CloseReason::Disconnected)
            }
        }
    }

    async fn handle_line(&mut self, line: String) {
        let dispatcher = Dispatcher::new(&self.registry, &self.connection);
        self.dialog = match std::mem::take(&mut self.dialog) {
            Dialog::Idle => match codec::parse(&line) {
                Unit::Command(word) => dispatcher.start(Command::from_word(&word)).await,
                Unit::Message(text) => {
                    self.relay(&text).await;
                    Dialog::Idle
                }
            },
            pending => dispatcher.resume(pending, &line).await,
        };
    }

    async fn relay(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let id = self.connection.id();
        let sender = self.registry.name_of(id).await.unwrap_or_default();
        tracing::info!(peer = %self.connection.addr(), name = %sender, "{text}");
        router::broadcast(
            &self.registry,
            id,
            &Outbound::chat(sender, text),
            Mode::ToOthers,
        )
        .await;
    }

    /// Shutdown drains the registry before closing connections, so only
    /// sessions that are still registered say goodbye to the others.
    async fn teardown(&self, reason: CloseReason) {
        let id = self.connection.id();
        if let Some(name) = self.registry.name_of(id).await {
            router::broadcast(
                &self.registry,
                id,
                &Outbound::info(&name, "disconnected."),
                Mode::ToOthers,
            )
            .await;
            self.registry.deregister(id).await;
        }
        self.connection.close().await;
        tracing::info!(peer = %self.connection.addr(), ?reason, "Connection closed");
    }
}
