//! Live sessions and the per-channel subscriber index.
//!
//! The registry holds the sending half of every session's mailbox. The index
//! (`channel -> names`) is updated in the same call that changes a session's
//! channel, so a lookup always agrees with each session's current channel.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::mpsc;

use crate::{
    error::{RelayError, RelayResult},
    message::Message,
};

pub type SessionId = u64;

pub(crate) type Mailbox = mpsc::Sender<Message>;

struct SessionEntry {
    id: SessionId,
    channel: String,
    mailbox: Mailbox,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<String, SessionEntry>,
    by_channel: HashMap<String, BTreeSet<String>>,
    next_id: SessionId,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sessions.contains_key(name)
    }

    pub fn channel_of(&self, name: &str) -> Option<&str> {
        self.sessions.get(name).map(|entry| entry.channel.as_str())
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Sorted names of the sessions currently on `channel`.
    pub fn members(&self, channel: &str) -> Vec<String> {
        self.by_channel
            .get(channel)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn insert(
        &mut self,
        name: &str,
        channel: &str,
        mailbox: Mailbox,
    ) -> RelayResult<SessionId> {
        if self.sessions.contains_key(name) {
            return Err(RelayError::AlreadyConnected(name.to_string()));
        }

        self.next_id += 1;
        let id = self.next_id;
        self.sessions.insert(
            name.to_string(),
            SessionEntry {
                id,
                channel: channel.to_string(),
                mailbox,
            },
        );
        self.subscribe(name, channel);
        Ok(id)
    }

    /// Removes the session for `name` if it is still the one identified by
    /// `id`, returning the channel it was on.
    pub(crate) fn remove(&mut self, name: &str, id: SessionId) -> Option<String> {
        if self.sessions.get(name).map(|entry| entry.id) != Some(id) {
            return None;
        }
        let entry = self.sessions.remove(name)?;
        self.unsubscribe(name, &entry.channel);
        Some(entry.channel)
    }

    /// Moves `name` onto `channel`, returning the channel it left.
    ///
    /// Room existence is the caller's concern.
    pub(crate) fn switch(&mut self, name: &str, channel: &str) -> RelayResult<String> {
        let entry = self
            .sessions
            .get_mut(name)
            .ok_or_else(|| RelayError::SessionNotActive(name.to_string()))?;
        let previous = std::mem::replace(&mut entry.channel, channel.to_string());
        self.unsubscribe(name, &previous);
        self.subscribe(name, channel);
        Ok(previous)
    }

    pub(crate) fn mailbox(&self, name: &str) -> Option<&Mailbox> {
        self.sessions.get(name).map(|entry| &entry.mailbox)
    }

    /// Mailboxes of every session on `channel`, as of this call.
    pub(crate) fn channel_mailboxes<'a>(
        &'a self,
        channel: &str,
    ) -> impl Iterator<Item = (&'a str, &'a Mailbox)> + 'a {
        self.by_channel
            .get(channel)
            .into_iter()
            .flatten()
            .filter_map(move |name| {
                self.sessions
                    .get(name)
                    .map(|entry| (name.as_str(), &entry.mailbox))
            })
    }

    fn subscribe(&mut self, name: &str, channel: &str) {
        self.by_channel
            .entry(channel.to_string())
            .or_default()
            .insert(name.to_string());
    }

    fn unsubscribe(&mut self, name: &str, channel: &str) {
        if let Some(names) = self.by_channel.get_mut(channel) {
            names.remove(name);
            if names.is_empty() {
                self.by_channel.remove(channel);
            }
        }
    }
}
