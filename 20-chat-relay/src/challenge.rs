//! Login challenges and the session tokens they unlock.
//!
//! An identity moves `registered -> nonce_issued -> registered`: `issue`
//! stores a fresh random nonce (discarding any earlier one), and a
//! successful `verify` consumes it and hands out a session token. Nonces
//! expire after the challenge TTL; tokens after the token TTL or when a newer
//! verification replaces them.

use std::{collections::HashMap, time::Duration};

use ed25519_dalek::VerifyingKey;
use rand::{RngCore, rngs::OsRng};
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    error::{RelayError, RelayResult},
    identity::verify_signature,
};

struct PendingChallenge {
    nonce: Vec<u8>,
    issued_at: Instant,
}

struct IssuedToken {
    token: String,
    issued_at: Instant,
}

pub struct ChallengeManager {
    nonce_len: usize,
    challenge_ttl: Duration,
    token_ttl: Duration,
    pending: HashMap<String, PendingChallenge>,
    tokens: HashMap<String, IssuedToken>,
}

impl ChallengeManager {
    pub fn new(nonce_len: usize, challenge_ttl: Duration, token_ttl: Duration) -> Self {
        Self {
            nonce_len,
            challenge_ttl,
            token_ttl,
            pending: HashMap::new(),
            tokens: HashMap::new(),
        }
    }

    /// Draws a new nonce for `name`, invalidating any pending one.
    pub fn issue(&mut self, name: &str, now: Instant) -> Vec<u8> {
        self.purge_expired(now);

        let mut nonce = vec![0u8; self.nonce_len];
        OsRng.fill_bytes(&mut nonce);
        self.pending.insert(
            name.to_string(),
            PendingChallenge {
                nonce: nonce.clone(),
                issued_at: now,
            },
        );
        nonce
    }

    /// Consumes the pending nonce if `signed_nonce` is `key`'s signature over
    /// it, returning a fresh session token.
    ///
    /// A bad signature leaves the challenge pending so the client may retry
    /// until it expires.
    pub fn verify(
        &mut self,
        name: &str,
        key: &VerifyingKey,
        signed_nonce: &[u8],
        now: Instant,
    ) -> RelayResult<String> {
        let challenge = self
            .pending
            .get(name)
            .ok_or_else(|| RelayError::NoPendingChallenge(name.to_string()))?;

        if now.duration_since(challenge.issued_at) > self.challenge_ttl {
            self.pending.remove(name);
            return Err(RelayError::ChallengeExpired(name.to_string()));
        }

        verify_signature(key, &challenge.nonce, signed_nonce)?;
        self.pending.remove(name);

        let token = Uuid::new_v4().to_string();
        self.tokens.insert(
            name.to_string(),
            IssuedToken {
                token: token.clone(),
                issued_at: now,
            },
        );
        Ok(token)
    }

    /// Accepts `token` if it is the live token issued to `name`.
    pub fn check_token(&self, name: &str, token: &str, now: Instant) -> RelayResult<()> {
        match self.tokens.get(name) {
            Some(issued)
                if issued.token == token
                    && now.duration_since(issued.issued_at) <= self.token_ttl =>
            {
                Ok(())
            }
            _ => Err(RelayError::Unauthenticated(name.to_string())),
        }
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.contains_key(name)
    }

    fn purge_expired(&mut self, now: Instant) {
        let challenge_ttl = self.challenge_ttl;
        self.pending
            .retain(|_, challenge| now.duration_since(challenge.issued_at) <= challenge_ttl);
        let token_ttl = self.token_ttl;
        self.tokens
            .retain(|_, issued| now.duration_since(issued.issued_at) <= token_ttl);
    }
}
