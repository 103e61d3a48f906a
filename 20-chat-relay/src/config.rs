//! Relay tuning knobs.
//!
//! [`RelayConfig`] is what the relay consumes. It deserializes from any serde
//! format with missing fields falling back to defaults. [`RelayArgs`] exposes
//! the same knobs as command-line flags for a host binary to flatten into its
//! own `clap` parser.

use std::time::Duration;

use clap::Args;
use serde::Deserialize;

use crate::error::{RelayError, RelayResult};

pub const DEFAULT_ROOM: &str = "general";
pub const DEFAULT_MAILBOX_CAPACITY: usize = 100;
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 32;
pub const DEFAULT_NONCE_LEN: usize = 32;
pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 60;
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

/// Shortest nonce accepted by [`RelayConfig::validate`].
pub const MIN_NONCE_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Room provisioned before any client call is accepted.
    pub default_room: String,
    /// Messages buffered per session before new ones are dropped.
    pub mailbox_capacity: usize,
    /// Messages buffered between a delivery loop and its outbound stream.
    pub outbound_capacity: usize,
    /// Length in bytes of login nonces.
    pub nonce_len: usize,
    /// How long a login nonce stays verifiable.
    pub challenge_ttl_secs: u64,
    /// How long a session token issued by `verify` is accepted by `join`.
    pub token_ttl_secs: u64,
    /// Route "joined"/"left" notices to a channel when sessions come and go.
    pub announce_presence: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_room: DEFAULT_ROOM.to_string(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            nonce_len: DEFAULT_NONCE_LEN,
            challenge_ttl_secs: DEFAULT_CHALLENGE_TTL_SECS,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            announce_presence: false,
        }
    }
}

impl RelayConfig {
    pub fn challenge_ttl(&self) -> Duration {
        Duration::from_secs(self.challenge_ttl_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn validate(&self) -> RelayResult<()> {
        if self.default_room.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "default room cannot be empty".to_string(),
            ));
        }
        // tokio mpsc channels panic on a zero capacity.
        if self.mailbox_capacity == 0 {
            return Err(RelayError::InvalidConfig(
                "mailbox capacity must be at least 1".to_string(),
            ));
        }
        if self.outbound_capacity == 0 {
            return Err(RelayError::InvalidConfig(
                "outbound capacity must be at least 1".to_string(),
            ));
        }
        if self.nonce_len < MIN_NONCE_LEN {
            return Err(RelayError::InvalidConfig(format!(
                "nonce length must be at least {MIN_NONCE_LEN} bytes"
            )));
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct RelayArgs {
    /// Room that exists before any client creates one.
    #[arg(long, default_value = DEFAULT_ROOM)]
    pub default_room: String,

    /// Per-session mailbox size; messages beyond it are dropped.
    #[arg(long, default_value_t = DEFAULT_MAILBOX_CAPACITY)]
    pub mailbox_capacity: usize,

    /// Buffer between a session's delivery loop and its outbound stream.
    #[arg(long, default_value_t = DEFAULT_OUTBOUND_CAPACITY)]
    pub outbound_capacity: usize,

    /// Login nonce length in bytes.
    #[arg(long, default_value_t = DEFAULT_NONCE_LEN)]
    pub nonce_len: usize,

    /// Seconds a login challenge stays valid.
    #[arg(long, default_value_t = DEFAULT_CHALLENGE_TTL_SECS)]
    pub challenge_ttl_secs: u64,

    /// Seconds a session token stays valid for joining.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_SECS)]
    pub token_ttl_secs: u64,

    /// Announce joins and departures to the affected channel.
    #[arg(long)]
    pub announce_presence: bool,
}

impl From<RelayArgs> for RelayConfig {
    fn from(args: RelayArgs) -> Self {
        Self {
            default_room: args.default_room,
            mailbox_capacity: args.mailbox_capacity,
            outbound_capacity: args.outbound_capacity,
            nonce_len: args.nonce_len,
            challenge_ttl_secs: args.challenge_ttl_secs,
            token_ttl_secs: args.token_ttl_secs,
            announce_presence: args.announce_presence,
        }
    }
}
