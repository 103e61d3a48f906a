//! Per-session delivery loop.
//!
//! Each joined session gets one task that moves messages from its mailbox to
//! the outbound stream handed back by `join`. The task owns a
//! [`SessionGuard`]; dropping it deregisters the session, so cleanup happens
//! however the task ends: client disconnect, relay shutdown, abort, or
//! runtime teardown.

use std::sync::Arc;

use tokio::{
    select,
    sync::{mpsc, watch},
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::{message::Message, registry::SessionId, relay::Shared};

/// Stream of messages delivered to one joined session. Dropping it
/// disconnects the session.
pub type MessageStream = ReceiverStream<Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Disconnected,
    Shutdown,
    MailboxClosed,
}

pub(crate) struct SessionGuard {
    shared: Arc<Shared>,
    name: String,
    id: SessionId,
}

impl SessionGuard {
    pub(crate) fn new(shared: Arc<Shared>, name: String, id: SessionId) -> Self {
        Self { shared, name, id }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.shared.deregister(&self.name, self.id);
    }
}

pub(crate) async fn run(
    guard: SessionGuard,
    mut mailbox: mpsc::Receiver<Message>,
    outbound: mpsc::Sender<Message>,
    mut shutdown: watch::Receiver<bool>,
) {
    let exit = loop {
        select! {
            biased;
            _ = outbound.closed() => break LoopExit::Disconnected,
            _ = stopping(&mut shutdown) => break LoopExit::Shutdown,
            next = mailbox.recv() => {
                let Some(message) = next else {
                    break LoopExit::MailboxClosed;
                };
                select! {
                    sent = outbound.send(message) => {
                        if let Err(err) = sent {
                            warn!(name = %guard.name, error = %err, "failed to forward message");
                        }
                    }
                    _ = stopping(&mut shutdown) => break LoopExit::Shutdown,
                }
            }
        }
    };

    debug!(name = %guard.name, ?exit, "delivery loop finished");
    // Deregister before the outbound stream ends so a client that sees the
    // end of its stream can rejoin immediately.
    drop(guard);
    drop(outbound);
}

async fn stopping(shutdown: &mut watch::Receiver<bool>) {
    // Closed once every `Relay` handle is dropped, which also ends the loop.
    let _ = shutdown.wait_for(|stopping| *stopping).await;
}
