use thiserror::Error;

/// Rule violations reported by the relay.
///
/// Every variant is an expected outcome of a client call, not a fault. The
/// [`ChatService`](crate::service::ChatService) facade folds them into
/// `success = false` replies using the `Display` text as the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("'{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("'{0}' is not registered")]
    NotRegistered(String),

    #[error("no pending challenge for '{0}'")]
    NoPendingChallenge(String),

    #[error("challenge for '{0}' has expired, log in again")]
    ChallengeExpired(String),

    #[error("signature does not match the pending challenge")]
    InvalidSignature,

    #[error("public key is not a valid Ed25519 key")]
    InvalidPublicKey,

    #[error("{0} cannot be empty")]
    InvalidName(&'static str),

    #[error("'{0}' is reserved for the relay")]
    ReservedName(String),

    #[error("session token for '{0}' is missing, invalid or expired")]
    Unauthenticated(String),

    #[error("'{0}' is already connected")]
    AlreadyConnected(String),

    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("unknown room '{0}'")]
    UnknownRoom(String),

    #[error("no active session for '{0}'")]
    SessionNotActive(String),

    #[error("relay is shutting down")]
    ShuttingDown,

    #[error("invalid relay configuration: {0}")]
    InvalidConfig(String),
}

pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        assert_eq!(
            RelayError::AlreadyRegistered("alice".into()).to_string(),
            "'alice' is already registered"
        );
        assert_eq!(
            RelayError::UnknownRoom("nowhere".into()).to_string(),
            "unknown room 'nowhere'"
        );
        assert_eq!(
            RelayError::InvalidName("username").to_string(),
            "username cannot be empty"
        );
    }
}
