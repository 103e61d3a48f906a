//! Registered usernames and their Ed25519 public keys.

use std::collections::HashMap;

use ed25519_dalek::{Signature, VerifyingKey};

use crate::{
    error::{RelayError, RelayResult},
    message::SYSTEM_SENDER,
};

#[derive(Debug, Default)]
pub struct IdentityStore {
    keys: HashMap<String, VerifyingKey>,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `name` with its key. Registration is permanent; a second call
    /// for the same name leaves the first key in place.
    pub fn register(&mut self, name: &str, public_key: &[u8]) -> RelayResult<()> {
        if self.keys.contains_key(name) {
            return Err(RelayError::AlreadyRegistered(name.to_string()));
        }
        let key = parse_public_key(public_key)?;
        self.keys.insert(name.to_string(), key);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.keys.contains_key(name)
    }

    pub fn public_key(&self, name: &str) -> Option<&VerifyingKey> {
        self.keys.get(name)
    }
}

/// Trims a client-supplied name, rejecting blank ones.
pub(crate) fn normalize_name<'a>(raw: &'a str, what: &'static str) -> RelayResult<&'a str> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RelayError::InvalidName(what));
    }
    Ok(name)
}

/// Like [`normalize_name`], and also refuses the sender name of relay notices.
pub(crate) fn normalize_username(raw: &str) -> RelayResult<&str> {
    let name = normalize_name(raw, "username")?;
    if name == SYSTEM_SENDER {
        return Err(RelayError::ReservedName(name.to_string()));
    }
    Ok(name)
}

pub(crate) fn parse_public_key(bytes: &[u8]) -> RelayResult<VerifyingKey> {
    let bytes: &[u8; 32] = bytes
        .try_into()
        .map_err(|_| RelayError::InvalidPublicKey)?;
    VerifyingKey::from_bytes(bytes).map_err(|_| RelayError::InvalidPublicKey)
}

/// Checks `signature` over exactly `message` under `key`.
pub(crate) fn verify_signature(
    key: &VerifyingKey,
    message: &[u8],
    signature: &[u8],
) -> RelayResult<()> {
    let signature = Signature::from_slice(signature).map_err(|_| RelayError::InvalidSignature)?;
    key.verify_strict(message, &signature)
        .map_err(|_| RelayError::InvalidSignature)
}
