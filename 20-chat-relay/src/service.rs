//! Transport-facing facade.
//!
//! A host transport (gRPC, WebSocket, JSON lines, ...) maps each RPC onto one
//! method here. Rule violations come back as `success = false` replies whose
//! `message` explains why, so the transport never has to treat them as faults.
//! `join` and `switch_channel` keep the typed error since their transports
//! usually map it onto a stream or status error.

use tracing::debug;

use crate::{
    delivery::MessageStream,
    error::RelayResult,
    message::{
        CheckUsernameReply, CreateRoomReply, LoginReply, Message, RegisterReply, VerifyReply,
    },
    relay::Relay,
};

#[derive(Clone)]
pub struct ChatService {
    relay: Relay,
}

impl ChatService {
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    pub fn register(&self, name: &str, public_key: &[u8]) -> RegisterReply {
        match self.relay.register(name, public_key) {
            Ok(()) => RegisterReply {
                success: true,
                message: format!("registered '{}'", name.trim()),
            },
            Err(err) => {
                debug!(name, error = %err, "register rejected");
                RegisterReply {
                    success: false,
                    message: err.to_string(),
                }
            }
        }
    }

    pub fn login(&self, name: &str) -> LoginReply {
        match self.relay.login(name) {
            Ok(nonce) => LoginReply {
                nonce,
                success: true,
                message: "sign the nonce and call verify".to_string(),
            },
            Err(err) => {
                debug!(name, error = %err, "login rejected");
                LoginReply {
                    nonce: Vec::new(),
                    success: false,
                    message: err.to_string(),
                }
            }
        }
    }

    pub fn verify(&self, name: &str, signed_nonce: &[u8]) -> VerifyReply {
        match self.relay.verify(name, signed_nonce) {
            Ok(token) => VerifyReply {
                success: true,
                message: "authenticated".to_string(),
                session_token: Some(token),
            },
            Err(err) => {
                debug!(name, error = %err, "verify rejected");
                VerifyReply {
                    success: false,
                    message: err.to_string(),
                    session_token: None,
                }
            }
        }
    }

    pub fn check_username(&self, name: &str) -> CheckUsernameReply {
        CheckUsernameReply {
            is_taken: self.relay.check_username(name),
        }
    }

    /// A blank room name reports neither created nor existing.
    pub fn create_room(&self, name: &str) -> CreateRoomReply {
        match self.relay.create_room(name) {
            Ok(outcome) => outcome.into(),
            Err(err) => {
                debug!(room = name, error = %err, "create room rejected");
                CreateRoomReply {
                    created: false,
                    already_exists: false,
                }
            }
        }
    }

    pub fn list_rooms(&self) -> Vec<String> {
        self.relay.list_rooms()
    }

    pub fn join(
        &self,
        name: &str,
        channel: &str,
        session_token: &str,
    ) -> RelayResult<MessageStream> {
        self.relay.join(name, channel, session_token)
    }

    pub fn switch_channel(&self, name: &str, channel: &str) -> RelayResult<()> {
        self.relay.switch_channel(name, channel)
    }

    /// Fire and forget.
    pub fn send_message(&self, message: Message) {
        self.relay.send_message(message);
    }

    pub fn channel_members(&self, channel: &str) -> Vec<String> {
        self.relay.channel_members(channel)
    }

    pub fn shutdown(&self) {
        self.relay.shutdown();
    }
}
