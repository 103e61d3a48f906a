//! Authenticated fan-out chat relay.
//!
//! Clients register an Ed25519 public key, prove possession of it by signing
//! a one-time login nonce, then join a room and receive a stream of messages
//! routed to them. The crate holds no sockets: a host transport maps its RPCs
//! onto [`service::ChatService`] and pipes the [`delivery::MessageStream`]
//! returned by `join` back to the client.
//!
//! - [`relay`] owns all shared state behind one lock and implements every
//!   operation.
//! - [`identity`] and [`challenge`] form the login state machine: registered
//!   keys, single-use nonces and the session tokens `join` requires.
//! - [`rooms`] is the set of joinable channels, seeded with a default room.
//! - [`registry`] tracks live sessions, their mailboxes and a per-channel
//!   index.
//! - [`router`] resolves a message's destinations and fills their mailboxes.
//! - [`delivery`] runs one loop per session from mailbox to outbound stream
//!   and deregisters the session however that loop ends.
//! - [`service`] wraps the relay in reply structs for transports.
//! - [`config`] and [`message`] hold configuration and wire types.
//!
//! Nothing is persisted; a message that finds no mailbox is dropped.

pub mod challenge;
pub mod config;
pub mod delivery;
pub mod error;
pub mod identity;
pub mod message;
pub mod registry;
pub mod relay;
pub mod rooms;
pub mod router;
pub mod service;

pub use config::{RelayArgs, RelayConfig};
pub use delivery::MessageStream;
pub use error::{RelayError, RelayResult};
pub use message::Message;
pub use relay::Relay;
pub use service::ChatService;
