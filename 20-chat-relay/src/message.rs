use serde::{Deserialize, Serialize};

/// Sender name used for notices the relay itself routes.
pub const SYSTEM_SENDER: &str = "*relay*";

/// A chat message as routed between sessions.
///
/// A non-empty `receiver` makes it a direct message; otherwise it is a
/// broadcast to `channel`. Empty strings count as absent so transports that
/// cannot express `None` (protobuf scalars) behave the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub text: String,
    /// Unix seconds. Zero means "stamp on arrival".
    #[serde(default)]
    pub timestamp: i64,
}

impl Message {
    pub fn broadcast(
        sender: impl Into<String>,
        channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: None,
            channel: Some(channel.into()),
            text: text.into(),
            timestamp: 0,
        }
    }

    pub fn direct(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            receiver: Some(receiver.into()),
            channel: None,
            text: text.into(),
            timestamp: 0,
        }
    }

    pub(crate) fn notice(channel: &str, text: String) -> Self {
        Self {
            sender: SYSTEM_SENDER.to_string(),
            receiver: None,
            channel: Some(channel.to_string()),
            text,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// The direct-message recipient, if any.
    pub fn direct_receiver(&self) -> Option<&str> {
        non_empty(self.receiver.as_deref())
    }

    pub fn target_channel(&self) -> Option<&str> {
        non_empty(self.channel.as_deref())
    }

    pub fn is_direct(&self) -> bool {
        self.direct_receiver().is_some()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Outcome of creating a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomCreation {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReply {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginReply {
    pub nonce: Vec<u8>,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReply {
    pub success: bool,
    pub message: String,
    /// Present on success; required by `join`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUsernameReply {
    pub is_taken: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomReply {
    pub created: bool,
    pub already_exists: bool,
}

impl From<RoomCreation> for CreateRoomReply {
    fn from(outcome: RoomCreation) -> Self {
        match outcome {
            RoomCreation::Created => Self {
                created: true,
                already_exists: false,
            },
            RoomCreation::AlreadyExists => Self {
                created: false,
                already_exists: true,
            },
        }
    }
}
