use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::Mutex;

use crate::connection::{ConnId, Connection};

/// Reasons a registration is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Another live connection already uses this display name.
    #[error("display name [{0}] is already taken")]
    NameTaken(String),

    /// The connection already has an entry.
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnId),
}

/// A registered connection together with its display name at snapshot time.
#[derive(Debug, Clone)]
pub struct Member {
    /// Write handle of the connection.
    pub connection: Arc<Connection>,

    /// Display name.
    pub name: String,
}

/// Shared table of live connections and their display names.
///
/// Cloning yields another handle to the same table. Every operation takes the
/// lock for its whole duration and never performs I/O while holding it.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Arc<Mutex<BTreeMap<ConnId, Member>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `connection` under `name`.
    ///
    /// Names are compared case-sensitively against every current entry. The
    /// check and the insertion happen under one lock.
    pub async fn register(
        &self,
        connection: Arc<Connection>,
        name: &str,
    ) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock().await;
        let id = connection.id();
        if entries.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(id));
        }
        if entries.values().any(|member| member.name == name) {
            return Err(RegistryError::NameTaken(name.to_string()));
        }
        entries.insert(
            id,
            Member {
                connection,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    /// Change the display name of `id`, returning the previous one.
    ///
    /// Uniqueness is not checked here: a rename may collide with another
    /// entry's name. Returns `None` if `id` is not registered.
    pub async fn rename(&self, id: ConnId, name: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        let member = entries.get_mut(&id)?;
        Some(std::mem::replace(&mut member.name, name.to_string()))
    }

    /// Remove `id`, returning its display name if it was registered.
    pub async fn deregister(&self, id: ConnId) -> Option<String> {
        self.entries
            .lock()
            .await
            .remove(&id)
            .map(|member| member.name)
    }

    /// Point-in-time copy of all entries, in accept order.
    pub async fn snapshot(&self) -> Vec<Member> {
        self.entries.lock().await.values().cloned().collect()
    }

    /// Find the connection currently using `name`.
    ///
    /// If renames produced duplicates, the earliest connection wins.
    pub async fn lookup_by_name(&self, name: &str) -> Option<Arc<Connection>> {
        self.entries
            .lock()
            .await
            .values()
            .find(|member| member.name == name)
            .map(|member| Arc::clone(&member.connection))
    }

    /// The connection registered as `id`.
    pub async fn connection(&self, id: ConnId) -> Option<Arc<Connection>> {
        self.entries
            .lock()
            .await
            .get(&id)
            .map(|member| Arc::clone(&member.connection))
    }

    /// Current display name of `id`.
    pub async fn name_of(&self, id: ConnId) -> Option<String> {
        self.entries
            .lock()
            .await
            .get(&id)
            .map(|member| member.name.clone())
    }

    /// Whether `id` has an entry.
    pub async fn contains(&self, id: ConnId) -> bool {
        self.entries.lock().await.contains_key(&id)
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Remove and return every entry.
    pub async fn drain(&self) -> Vec<Member> {
        std::mem::take(&mut *self.entries.lock().await)
            .into_values()
            .collect()
    }
}
