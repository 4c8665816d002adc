use chrono::{DateTime, Local};

use crate::{connection::ConnId, registry::Registry};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which registered connections a broadcast reaches, relative to its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Everyone except the origin.
    ToOthers,

    /// Everyone, origin included.
    ToAll,

    /// Only the origin.
    ToSelfOnly,
}

impl Mode {
    fn includes(self, origin: ConnId, target: ConnId) -> bool {
        match self {
            Mode::ToOthers => origin != target,
            Mode::ToAll => true,
            Mode::ToSelfOnly => origin == target,
        }
    }
}

/// An outgoing line, before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A chat line relayed from `sender`.
    Chat {
        /// Display name of the author.
        sender: String,
        /// The line as typed.
        text: String,
    },

    /// A direct message from `sender` to a single recipient.
    Direct {
        /// Display name of the author.
        sender: String,
        /// The message body.
        text: String,
    },

    /// An event concerning the user `name`, stamped with the time it happened.
    Info {
        /// Display name the event is about.
        name: String,
        /// What happened, e.g. `has logged in.`
        event: String,
        /// When it happened.
        at: DateTime<Local>,
    },

    /// Text sent as is.
    Notice(String),
}

impl Outbound {
    /// A chat line.
    pub fn chat(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Chat {
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// A direct message.
    pub fn direct(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Direct {
            sender: sender.into(),
            text: text.into(),
        }
    }

    /// An info line stamped with the current local time.
    pub fn info(name: impl Into<String>, event: impl Into<String>) -> Self {
        Self::Info {
            name: name.into(),
            event: event.into(),
            at: Local::now(),
        }
    }

    /// The wire representation, newline included.
    pub fn render(&self) -> String {
        match self {
            Outbound::Chat { sender, text } => format!("[MSG][{sender}]: {text}\n"),
            Outbound::Direct { sender, text } => format!("[MSG] [{sender}] (DM): {text}\n"),
            Outbound::Info { name, event, at } => {
                format!("[INFO] [{}] {name} {event}\n", at.format(TIMESTAMP_FORMAT))
            }
            Outbound::Notice(text) => text.clone(),
        }
    }
}

/// Outcome of a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients that received the line.
    pub delivered: usize,

    /// Recipients whose write failed or timed out.
    pub failed: usize,
}

/// Send `message` to every registered connection selected by `mode`.
///
/// Recipients are taken from a registry snapshot, so connections registered
/// after the call starts are not included. A failing recipient is logged and
/// skipped; the others still get the line. Each write is bounded by that
/// connection's write timeout, and a failed write closes the recipient's
/// connection, so its session deregisters it and later broadcasts do not wait
/// on it again.
pub async fn broadcast(
    registry: &Registry,
    origin: ConnId,
    message: &Outbound,
    mode: Mode,
) -> Delivery {
    let line = message.render();
    let mut delivery = Delivery::default();
    for member in registry.snapshot().await {
        let target = &member.connection;
        if !mode.includes(origin, target.id()) {
            continue;
        }
        match target.send(&line).await {
            Ok(()) => delivery.delivered += 1,
            Err(error) => {
                tracing::warn!(
                    peer = %target.addr(),
                    name = %member.name,
                    %error,
                    "Failed to deliver message"
                );
                delivery.failed += 1;
            }
        }
    }
    delivery
}
