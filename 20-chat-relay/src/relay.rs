//! The relay core: one lock around all shared state.
//!
//! Identity store, challenge manager, room directory and session registry
//! live in a single [`RelayState`] behind one `std::sync::Mutex`. Every
//! operation takes the lock once, does a bounded amount of work and releases
//! it; nothing awaits while holding it. Mailbox pushes happen under the lock
//! but never block (see [`router`](crate::router)).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::{
    sync::{mpsc, watch},
    time::Instant,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    challenge::ChallengeManager,
    config::RelayConfig,
    delivery::{self, MessageStream, SessionGuard},
    error::{RelayError, RelayResult},
    identity::{IdentityStore, normalize_name, normalize_username},
    message::{Message, RoomCreation, SYSTEM_SENDER},
    registry::{SessionId, SessionRegistry},
    rooms::RoomDirectory,
    router::{self, RouteOutcome},
};

struct RelayState {
    identities: IdentityStore,
    challenges: ChallengeManager,
    rooms: RoomDirectory,
    sessions: SessionRegistry,
}

pub(crate) struct Shared {
    config: RelayConfig,
    state: Mutex<RelayState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RelayState> {
        // Critical sections never leave the state half-updated, so a panic
        // elsewhere while holding the lock does not invalidate it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes session `id` for `name` and announces the departure.
    pub(crate) fn deregister(&self, name: &str, id: SessionId) {
        let mut state = self.lock();
        let Some(channel) = state.sessions.remove(name, id) else {
            return;
        };
        if self.config.announce_presence {
            let notice = Message::notice(&channel, format!("{name} has left the chat."));
            router::route(&state.sessions, &notice);
        }
        drop(state);
        info!(name, channel = %channel, "session disconnected");
    }
}

/// Cheaply clonable handle to the relay.
///
/// Delivery loops keep the shared state alive but not the shutdown sender,
/// which only handles own. Dropping the last handle ends every session.
#[derive(Clone)]
pub struct Relay {
    shared: Arc<Shared>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> RelayResult<Self> {
        config.validate()?;

        let state = RelayState {
            identities: IdentityStore::new(),
            challenges: ChallengeManager::new(
                config.nonce_len,
                config.challenge_ttl(),
                config.token_ttl(),
            ),
            rooms: RoomDirectory::new(config.default_room.trim()),
            sessions: SessionRegistry::new(),
        };
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(state),
            }),
            shutdown: Arc::new(shutdown),
        })
    }

    pub fn register(&self, name: &str, public_key: &[u8]) -> RelayResult<()> {
        let name = normalize_username(name)?;
        self.shared.lock().identities.register(name, public_key)?;
        info!(name, "identity registered");
        Ok(())
    }

    pub fn check_username(&self, name: &str) -> bool {
        self.shared.lock().identities.contains(name.trim())
    }

    /// Issues a login challenge. Any earlier unanswered challenge for the
    /// same name stops verifying.
    pub fn login(&self, name: &str) -> RelayResult<Vec<u8>> {
        let name = name.trim();
        let mut state = self.shared.lock();
        if !state.identities.contains(name) {
            return Err(RelayError::NotRegistered(name.to_string()));
        }
        let nonce = state.challenges.issue(name, Instant::now());
        drop(state);
        debug!(name, "login challenge issued");
        Ok(nonce)
    }

    /// Checks a signed challenge and returns the session token `join`
    /// requires.
    pub fn verify(&self, name: &str, signed_nonce: &[u8]) -> RelayResult<String> {
        let name = name.trim();
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let key = state
            .identities
            .public_key(name)
            .ok_or_else(|| RelayError::NotRegistered(name.to_string()))?;
        let token = state
            .challenges
            .verify(name, key, signed_nonce, Instant::now())?;
        drop(guard);
        info!(name, "identity verified");
        Ok(token)
    }

    pub fn create_room(&self, name: &str) -> RelayResult<RoomCreation> {
        let name = normalize_name(name, "room name")?;
        let outcome = self.shared.lock().rooms.create(name);
        if outcome == RoomCreation::Created {
            info!(room = name, "room created");
        }
        Ok(outcome)
    }

    pub fn room_exists(&self, name: &str) -> bool {
        self.shared.lock().rooms.exists(name.trim())
    }

    pub fn list_rooms(&self) -> Vec<String> {
        self.shared.lock().rooms.names()
    }

    /// Opens a session for `name` on `channel` and starts its delivery loop.
    ///
    /// The returned stream yields every message routed to the session.
    /// Dropping it disconnects. Must be called from within a tokio runtime.
    pub fn join(
        &self,
        name: &str,
        channel: &str,
        session_token: &str,
    ) -> RelayResult<MessageStream> {
        let name = name.trim();
        let channel = channel.trim();
        let config = &self.shared.config;
        let (mailbox_tx, mailbox_rx) = mpsc::channel(config.mailbox_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);

        let id = {
            let mut state = self.shared.lock();
            // `shutdown` flips the flag under this lock, so a join either
            // lands before it or is refused.
            if *self.shutdown.borrow() {
                return Err(RelayError::ShuttingDown);
            }
            state
                .challenges
                .check_token(name, session_token, Instant::now())?;
            if state.sessions.contains(name) {
                return Err(RelayError::AlreadyConnected(name.to_string()));
            }
            if !state.rooms.exists(channel) {
                return Err(RelayError::UnknownChannel(channel.to_string()));
            }
            let id = state.sessions.insert(name, channel, mailbox_tx)?;
            if config.announce_presence {
                let notice = Message::notice(channel, format!("{name} has joined the chat."));
                router::route(&state.sessions, &notice);
            }
            id
        };
        info!(name, channel, "session joined");

        let guard = SessionGuard::new(Arc::clone(&self.shared), name.to_string(), id);
        tokio::spawn(delivery::run(
            guard,
            mailbox_rx,
            outbound_tx,
            self.shutdown.subscribe(),
        ));

        Ok(ReceiverStream::new(outbound_rx))
    }

    /// Moves an active session to another room. Messages already queued for
    /// the session are delivered as they are.
    pub fn switch_channel(&self, name: &str, channel: &str) -> RelayResult<()> {
        let name = name.trim();
        let channel = channel.trim();
        let mut state = self.shared.lock();
        if !state.sessions.contains(name) {
            return Err(RelayError::SessionNotActive(name.to_string()));
        }
        if !state.rooms.exists(channel) {
            return Err(RelayError::UnknownRoom(channel.to_string()));
        }
        let previous = state.sessions.switch(name, channel)?;
        drop(state);
        info!(name, from = %previous, to = channel, "session switched channel");
        Ok(())
    }

    /// Routes `message` to its receiver or channel. Delivery is best effort.
    ///
    /// A zero timestamp is stamped with the current time. A broadcast without
    /// a channel goes to the sender's current channel, or the default room if
    /// the sender has no session. Messages claiming to come from the relay
    /// itself are dropped.
    pub fn send_message(&self, mut message: Message) -> RouteOutcome {
        if message.sender.trim() == SYSTEM_SENDER {
            warn!(sender = %message.sender, "dropped message with reserved sender");
            return RouteOutcome::default();
        }
        if message.timestamp == 0 {
            message.timestamp = chrono::Utc::now().timestamp();
        }

        let state = self.shared.lock();
        if !message.is_direct() && message.target_channel().is_none() {
            let channel = state
                .sessions
                .channel_of(message.sender.trim())
                .unwrap_or_else(|| state.rooms.default_room());
            message.channel = Some(channel.to_string());
        }
        let outcome = router::route(&state.sessions, &message);
        drop(state);

        debug!(
            sender = %message.sender,
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "message routed"
        );
        outcome
    }

    /// Sorted names of the sessions on `channel`.
    pub fn channel_members(&self, channel: &str) -> Vec<String> {
        self.shared.lock().sessions.members(channel.trim())
    }

    pub fn is_connected(&self, name: &str) -> bool {
        self.shared.lock().sessions.contains(name.trim())
    }

    pub fn session_count(&self) -> usize {
        self.shared.lock().sessions.len()
    }

    /// Stops every delivery loop and refuses new joins. Sessions are
    /// deregistered as their loops exit and their streams end.
    pub fn shutdown(&self) {
        let state = self.shared.lock();
        self.shutdown.send_replace(true);
        drop(state);
        info!("relay shutting down");
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::{Signer, SigningKey};

    use super::*;

    fn relay() -> Relay {
        Relay::new(RelayConfig::default()).expect("default config is valid")
    }

    fn authenticate(relay: &Relay, name: &str, seed: u8) -> String {
        let signer = SigningKey::from_bytes(&[seed; 32]);
        relay
            .register(name, signer.verifying_key().as_bytes())
            .expect("register");
        let nonce = relay.login(name).expect("login");
        relay
            .verify(name, &signer.sign(&nonce).to_bytes())
            .expect("verify")
    }

    #[test]
    fn rejects_invalid_config() {
        let config = RelayConfig {
            mailbox_capacity: 0,
            ..RelayConfig::default()
        };
        assert!(matches!(Relay::new(config), Err(RelayError::InvalidConfig(_))));
    }

    #[test]
    fn login_requires_registration() {
        let relay = relay();
        assert_eq!(
            relay.login("nobody"),
            Err(RelayError::NotRegistered("nobody".into()))
        );
        assert_eq!(
            relay.verify("nobody", &[0; 64]),
            Err(RelayError::NotRegistered("nobody".into()))
        );
    }

    #[test]
    fn blank_names_are_rejected() {
        let relay = relay();
        let signer = SigningKey::from_bytes(&[3; 32]);
        assert_eq!(
            relay.register("  ", signer.verifying_key().as_bytes()),
            Err(RelayError::InvalidName("username"))
        );
        assert_eq!(
            relay.create_room(""),
            Err(RelayError::InvalidName("room name"))
        );
    }

    #[tokio::test]
    async fn join_checks_token_before_anything_else() {
        let relay = relay();
        authenticate(&relay, "alice", 1);

        let result = relay.join("alice", "general", "forged");
        assert!(matches!(result, Err(RelayError::Unauthenticated(_))));
        assert!(!relay.is_connected("alice"));
    }

    #[tokio::test]
    async fn join_rejects_unknown_channel() {
        let relay = relay();
        let token = authenticate(&relay, "alice", 1);

        let result = relay.join("alice", "nowhere", &token);
        assert!(matches!(result, Err(RelayError::UnknownChannel(name)) if name == "nowhere"));
        assert_eq!(relay.session_count(), 0);
    }

    #[tokio::test]
    async fn switch_to_unknown_room_keeps_channel() {
        let relay = relay();
        let token = authenticate(&relay, "alice", 1);
        let _stream = relay.join("alice", "general", &token).expect("join");

        assert_eq!(
            relay.switch_channel("alice", "nonexistent-room"),
            Err(RelayError::UnknownRoom("nonexistent-room".into()))
        );
        assert_eq!(relay.channel_members("general"), vec!["alice"]);

        assert_eq!(
            relay.switch_channel("bob", "general"),
            Err(RelayError::SessionNotActive("bob".into()))
        );
    }

    #[tokio::test]
    async fn channel_less_broadcast_uses_senders_channel() {
        let relay = relay();
        relay.create_room("random").expect("room");
        let token = authenticate(&relay, "alice", 1);
        let _stream = relay.join("alice", "random", &token).expect("join");

        let mut message = Message::broadcast("alice", "", "hi");
        message.channel = None;
        let outcome = relay.send_message(message);

        assert_eq!(outcome.delivered, 1);
    }

    #[test]
    fn relay_sender_name_cannot_be_registered() {
        let relay = relay();
        let signer = SigningKey::from_bytes(&[4; 32]);
        assert_eq!(
            relay.register("*relay*", signer.verifying_key().as_bytes()),
            Err(RelayError::ReservedName("*relay*".into()))
        );
        assert!(!relay.check_username("*relay*"));
    }

    #[tokio::test]
    async fn messages_from_relay_sender_are_dropped() {
        let relay = relay();
        let token = authenticate(&relay, "alice", 1);
        let _stream = relay.join("alice", "general", &token).expect("join");

        let outcome = relay.send_message(Message::broadcast(SYSTEM_SENDER, "general", "fake"));
        assert_eq!(outcome, RouteOutcome::default());
        let outcome = relay.send_message(Message::direct(" *relay* ", "alice", "fake"));
        assert_eq!(outcome, RouteOutcome::default());
    }

    #[test]
    fn shutdown_refuses_new_joins() {
        let relay = relay();
        relay.shutdown();
        assert_eq!(
            relay.join("alice", "general", "token").map(|_| ()),
            Err(RelayError::ShuttingDown)
        );
    }
}
