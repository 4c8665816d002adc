use std::sync::Arc;

use crate::{
    codec,
    connection::{ConnId, Connection, SendError},
    registry::Registry,
    router::{self, Mode, Outbound},
};

const RULE: &str = "#####################\n";

/// A command recognized by its word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/connected_users`: list everybody else.
    ConnectedUsers,

    /// `/rename`: change the own display name.
    Rename,

    /// `/dm`: send a direct message.
    Dm,

    /// Anything else.
    Unknown(String),
}

impl Command {
    /// Map a command word to a [`Command`].
    pub fn from_word(word: &str) -> Self {
        match word {
            "connected_users" => Command::ConnectedUsers,
            "rename" => Command::Rename,
            "dm" => Command::Dm,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Progress of a multi-turn command.
///
/// The session feeds the next line it reads to [`Dispatcher::resume`] whenever
/// the dialog is not [`Dialog::Idle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Dialog {
    /// No command in progress.
    #[default]
    Idle,

    /// `/rename` prompted for the new name.
    AwaitingNewName,

    /// `/dm` prompted for the recipient.
    AwaitingDmTarget,

    /// `/dm` prompted for the message body to `target`.
    ///
    /// The recipient is pinned by connection, so renames in the meantime do
    /// not redirect the message.
    AwaitingDmBody {
        /// Connection the recipient name resolved to.
        target: ConnId,
        /// Name the recipient was resolved under, for replies to the sender.
        name: String,
    },
}

/// Runs commands on behalf of one connection.
pub struct Dispatcher<'a> {
    registry: &'a Registry,
    connection: &'a Arc<Connection>,
}

impl<'a> Dispatcher<'a> {
    /// A dispatcher acting for `connection`.
    pub fn new(registry: &'a Registry, connection: &'a Arc<Connection>) -> Self {
        Self {
            registry,
            connection,
        }
    }

    /// Begin `command`, returning the dialog state to continue with.
    ///
    /// If the issuing connection cannot be written to, the command is
    /// abandoned and [`Dialog::Idle`] is returned.
    pub async fn start(&self, command: Command) -> Dialog {
        let step = match command {
            Command::ConnectedUsers => self.connected_users().await,
            Command::Rename => self
                .reply("Enter new name:\n")
                .await
                .map(|()| Dialog::AwaitingNewName),
            Command::Dm => self
                .reply("Enter recipient name:\n")
                .await
                .map(|()| Dialog::AwaitingDmTarget),
            Command::Unknown(word) => {
                tracing::debug!(peer = %self.connection.addr(), %word, "Unknown command");
                self.reply("Unknown command.\n").await.map(|()| Dialog::Idle)
            }
        };
        self.settle(step)
    }

    /// Feed `line` to a pending `dialog`, returning the next state.
    pub async fn resume(&self, dialog: Dialog, line: &str) -> Dialog {
        let step = match dialog {
            Dialog::Idle => Ok(Dialog::Idle),
            Dialog::AwaitingNewName => self.rename(line).await,
            Dialog::AwaitingDmTarget => self.dm_target(line).await,
            Dialog::AwaitingDmBody { target, name } => self.dm_body(target, &name, line).await,
        };
        self.settle(step)
    }

    fn settle(&self, step: Result<Dialog, SendError>) -> Dialog {
        step.unwrap_or_else(|error| {
            tracing::warn!(peer = %self.connection.addr(), %error, "Abandoning command");
            Dialog::Idle
        })
    }

    async fn reply(&self, text: &str) -> Result<(), SendError> {
        self.connection.send(text).await
    }

    async fn own_name(&self) -> String {
        self.registry
            .name_of(self.connection.id())
            .await
            .unwrap_or_default()
    }

    async fn connected_users(&self) -> Result<Dialog, SendError> {
        let mut listing = format!("{RULE}Connected users:\n");
        for member in self.registry.snapshot().await {
            if member.connection.id() != self.connection.id() {
                listing.push_str(&format!("# - {}\n", member.name));
            }
        }
        listing.push_str(RULE);
        self.reply(&listing).await?;
        Ok(Dialog::Idle)
    }

    async fn rename(&self, line: &str) -> Result<Dialog, SendError> {
        let Some(new_name) = codec::display_name(line) else {
            self.reply("[ERR] Display name cannot be empty.\n").await?;
            return Ok(Dialog::Idle);
        };
        let Some(old_name) = self.registry.rename(self.connection.id(), &new_name).await else {
            // Not registered (anymore): nothing to rename.
            return Ok(Dialog::Idle);
        };
        tracing::info!(peer = %self.connection.addr(), %old_name, %new_name, "Renamed");
        self.reply(&format!(
            "Your display name has been successfully changed from [{old_name}] to [{new_name}].\n"
        ))
        .await?;
        router::broadcast(
            self.registry,
            self.connection.id(),
            &Outbound::info(&old_name, format!("changed name to [{new_name}].")),
            Mode::ToOthers,
        )
        .await;
        Ok(Dialog::Idle)
    }

    async fn dm_target(&self, line: &str) -> Result<Dialog, SendError> {
        let target = line.trim();
        match self.registry.lookup_by_name(target).await {
            None => {
                self.reply(&format!("User [{target}] does not exist.\n"))
                    .await?;
                Ok(Dialog::Idle)
            }
            Some(recipient) if recipient.id() == self.connection.id() => {
                self.reply("Cannot send DM to yourself.\n").await?;
                Ok(Dialog::Idle)
            }
            Some(recipient) => {
                self.reply("Enter message:\n").await?;
                Ok(Dialog::AwaitingDmBody {
                    target: recipient.id(),
                    name: target.to_string(),
                })
            }
        }
    }

    async fn dm_body(&self, target: ConnId, name: &str, body: &str) -> Result<Dialog, SendError> {
        let Some(recipient) = self.registry.connection(target).await else {
            self.reply(&format!("User [{name}] is no longer connected.\n"))
                .await?;
            return Ok(Dialog::Idle);
        };
        let sender = self.own_name().await;
        if let Err(error) = recipient.send(&Outbound::direct(&sender, body).render()).await {
            tracing::warn!(peer = %recipient.addr(), %error, "Failed to deliver direct message");
        }
        Ok(Dialog::Idle)
    }
}
