#![allow(dead_code)]

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chat_relay::{ChatService, Message, MessageStream, Relay, RelayConfig};
use ed25519_dalek::{Signer, SigningKey};
use tokio::time::{sleep, timeout};
use tokio_stream::StreamExt;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(1);
const SILENCE_WINDOW: Duration = Duration::from_millis(50);

pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

pub fn service() -> Result<ChatService> {
    service_with(RelayConfig::default())
}

pub fn service_with(config: RelayConfig) -> Result<ChatService> {
    init_tracing();
    let relay = Relay::new(config)?;
    Ok(ChatService::new(relay))
}

pub fn signer(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

/// Registers `name`, answers its login challenge and returns the session token.
pub fn authenticate(service: &ChatService, name: &str, seed: u8) -> Result<String> {
    let signer = signer(seed);
    let registered = service.register(name, signer.verifying_key().as_bytes());
    if !registered.success {
        return Err(anyhow!("register {name}: {}", registered.message));
    }
    sign_in(service, name, &signer)
}

pub fn sign_in(service: &ChatService, name: &str, signer: &SigningKey) -> Result<String> {
    let login = service.login(name);
    if !login.success {
        return Err(anyhow!("login {name}: {}", login.message));
    }
    let verified = service.verify(name, &signer.sign(&login.nonce).to_bytes());
    verified
        .session_token
        .with_context(|| format!("verify {name}: {}", verified.message))
}

/// Authenticates `name` and joins `channel`.
pub fn connect(
    service: &ChatService,
    name: &str,
    seed: u8,
    channel: &str,
) -> Result<MessageStream> {
    let token = authenticate(service, name, seed)?;
    Ok(service.join(name, channel, &token)?)
}

pub async fn recv(stream: &mut MessageStream) -> Result<Message> {
    timeout(RECV_TIMEOUT, stream.next())
        .await
        .context("timed out waiting for a message")?
        .context("stream ended")
}

pub async fn recv_text(stream: &mut MessageStream) -> Result<String> {
    Ok(recv(stream).await?.text)
}

/// Fails if anything arrives on `stream` within a short window.
pub async fn assert_silent(stream: &mut MessageStream) -> Result<()> {
    match timeout(SILENCE_WINDOW, stream.next()).await {
        Err(_) => Ok(()),
        Ok(Some(message)) => Err(anyhow!("unexpected message: {message:?}")),
        Ok(None) => Err(anyhow!("stream ended unexpectedly")),
    }
}

/// Waits for the delivery loop of `name` to deregister it.
pub async fn wait_until_disconnected(relay: &Relay, name: &str) -> Result<()> {
    timeout(RECV_TIMEOUT, async {
        while relay.is_connected(name) {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .with_context(|| format!("{name} was never deregistered"))
}
