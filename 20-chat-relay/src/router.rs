//! Destination resolution and mailbox insertion.
//!
//! Routing runs while the caller holds the relay lock, so the destination set
//! is one consistent snapshot and the order of route calls is the order every
//! mailbox sees. Pushes use `try_send` and never wait: a full mailbox drops
//! the new message for that session only.

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::{
    message::Message,
    registry::{Mailbox, SessionRegistry},
};

/// How many mailboxes accepted or dropped a routed message.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RouteOutcome {
    pub delivered: usize,
    pub dropped: usize,
}

/// Enqueues `message` on its receiver's mailbox, or on every mailbox on its
/// channel. A direct message to an absent receiver is dropped silently.
pub(crate) fn route(registry: &SessionRegistry, message: &Message) -> RouteOutcome {
    let mut outcome = RouteOutcome::default();

    if let Some(receiver) = message.direct_receiver() {
        match registry.mailbox(receiver) {
            Some(mailbox) => enqueue(receiver, mailbox, message, &mut outcome),
            None => debug!(receiver, sender = %message.sender, "receiver offline, dropping"),
        }
        return outcome;
    }

    let Some(channel) = message.target_channel() else {
        debug!(sender = %message.sender, "message has no destination");
        return outcome;
    };
    for (name, mailbox) in registry.channel_mailboxes(channel) {
        enqueue(name, mailbox, message, &mut outcome);
    }
    outcome
}

fn enqueue(name: &str, mailbox: &Mailbox, message: &Message, outcome: &mut RouteOutcome) {
    match mailbox.try_send(message.clone()) {
        Ok(()) => outcome.delivered += 1,
        Err(TrySendError::Full(_)) => {
            warn!(session = name, sender = %message.sender, "mailbox full, dropping message");
            outcome.dropped += 1;
        }
        // The delivery loop has exited; its guard is about to deregister it.
        Err(TrySendError::Closed(_)) => {
            debug!(session = name, "mailbox closed, dropping message");
            outcome.dropped += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;

    struct Fixture {
        registry: SessionRegistry,
        inboxes: Vec<(String, mpsc::Receiver<Message>)>,
    }

    impl Fixture {
        fn new(sessions: &[(&str, &str)], capacity: usize) -> Self {
            let mut registry = SessionRegistry::new();
            let mut inboxes = Vec::new();
            for (name, channel) in sessions {
                let (tx, rx) = mpsc::channel(capacity);
                registry.insert(name, channel, tx).expect("insert session");
                inboxes.push((name.to_string(), rx));
            }
            Self { registry, inboxes }
        }

        fn drain(&mut self, name: &str) -> Vec<String> {
            let (_, rx) = self
                .inboxes
                .iter_mut()
                .find(|(owner, _)| owner == name)
                .expect("known session");
            let mut texts = Vec::new();
            while let Ok(message) = rx.try_recv() {
                texts.push(message.text);
            }
            texts
        }
    }

    #[test]
    fn broadcast_reaches_only_the_channel_in_order() {
        let mut fixture = Fixture::new(
            &[("alice", "general"), ("bob", "general"), ("carol", "random")],
            8,
        );

        for text in ["one", "two"] {
            let outcome = route(
                &fixture.registry,
                &Message::broadcast("alice", "general", text),
            );
            assert_eq!(outcome.delivered, 2);
        }

        assert_eq!(fixture.drain("alice"), vec!["one", "two"]);
        assert_eq!(fixture.drain("bob"), vec!["one", "two"]);
        assert!(fixture.drain("carol").is_empty());
    }

    #[test]
    fn direct_message_reaches_only_receiver() {
        let mut fixture = Fixture::new(
            &[("alice", "general"), ("bob", "general"), ("carol", "general")],
            8,
        );

        let outcome = route(&fixture.registry, &Message::direct("alice", "bob", "psst"));

        assert_eq!(outcome.delivered, 1);
        assert_eq!(fixture.drain("bob"), vec!["psst"]);
        assert!(fixture.drain("alice").is_empty());
        assert!(fixture.drain("carol").is_empty());
    }

    #[test]
    fn offline_receiver_is_not_an_error() {
        let fixture = Fixture::new(&[("alice", "general")], 8);
        let outcome = route(&fixture.registry, &Message::direct("alice", "dave", "hello?"));
        assert_eq!(outcome, RouteOutcome::default());
    }

    #[test]
    fn full_mailbox_drops_newest_for_that_session_only() {
        let mut fixture = Fixture::new(&[("alice", "general"), ("bob", "general")], 1);

        // Fill bob's mailbox with a direct message first.
        route(&fixture.registry, &Message::direct("alice", "bob", "first"));
        let outcome = route(
            &fixture.registry,
            &Message::broadcast("alice", "general", "second"),
        );

        assert_eq!(outcome, RouteOutcome { delivered: 1, dropped: 1 });
        assert_eq!(fixture.drain("bob"), vec!["first"]);
        assert_eq!(fixture.drain("alice"), vec!["second"]);
    }
}
