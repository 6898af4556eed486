//! Async Host Driver
//!
//! Runs a [`HostSession`] on a tokio interval. Connections are plain
//! channels: the transport layer registers a client with an unbounded
//! sender for outgoing bytes and forwards whatever the client sends as
//! [`HostCommand::Message`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::game::player::PlayerId;
use super::host::HostSession;
use super::protocol::ClientMessage;

/// Input to the host loop.
#[derive(Debug)]
pub enum HostCommand {
    /// A client connected
    Connect {
        /// Assigned player id
        id: PlayerId,
        /// Display name
        name: String,
        /// Outgoing encoded [`ServerMessage`](super::protocol::ServerMessage)s
        sender: mpsc::UnboundedSender<Vec<u8>>,
    },
    /// A client went away
    Disconnect {
        /// Player id
        id: PlayerId,
    },
    /// Bytes from a client
    Message {
        /// Sender
        from: PlayerId,
        /// Encoded [`ClientMessage`]
        bytes: Vec<u8>,
    },
}

/// Drive `session` until `shutdown` fires or every command sender is gone.
/// Returns the session for inspection.
pub async fn run_host(
    mut session: HostSession,
    mut commands: mpsc::Receiver<HostCommand>,
    mut shutdown: oneshot::Receiver<()>,
) -> HostSession {
    let period = Duration::from_secs_f64(session.config().tick_ms() / 1000.0);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut senders: BTreeMap<PlayerId, mpsc::UnboundedSender<Vec<u8>>> = BTreeMap::new();
    let mut last = Instant::now();

    info!(room = %session.room.name, tick_ms = session.config().tick_ms(), "host loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            cmd = commands.recv() => {
                let Some(cmd) = cmd else {
                    info!("command channel closed");
                    break;
                };
                handle_command(&mut session, &mut senders, cmd);
            }
            _ = ticker.tick() => {
                let now = Instant::now();
                let elapsed = now.duration_since(last).as_secs_f64() * 1000.0;
                last = now;
                session.advance(elapsed);
            }
        }
        flush(&mut session, &mut senders);
    }

    session
}

fn handle_command(
    session: &mut HostSession,
    senders: &mut BTreeMap<PlayerId, mpsc::UnboundedSender<Vec<u8>>>,
    cmd: HostCommand,
) {
    match cmd {
        HostCommand::Connect { id, name, sender } => match session.add_client(id, &name, None, None) {
            Ok(()) => {
                senders.insert(id, sender);
            }
            Err(e) => warn!(player = id, error = %e, "connect refused"),
        },
        HostCommand::Disconnect { id } => {
            senders.remove(&id);
            session.remove_client(id);
        }
        HostCommand::Message { from, bytes } => {
            let msg = match ClientMessage::decode(&bytes) {
                Ok(m) => m,
                Err(e) => {
                    debug!(player = from, error = %e, "invalid client message");
                    return;
                }
            };
            if let Err(e) = session.receive(from, msg) {
                debug!(player = from, error = %e, "client message rejected");
            }
        }
    }
}

/// Encode and send every queued message; clients whose channel closed are
/// removed.
fn flush(session: &mut HostSession, senders: &mut BTreeMap<PlayerId, mpsc::UnboundedSender<Vec<u8>>>) {
    let mut gone = Vec::new();
    for (id, msgs) in session.drain_outboxes() {
        let Some(tx) = senders.get(&id) else {
            continue;
        };
        for msg in msgs {
            match msg.encode() {
                Ok(bytes) => {
                    if tx.send(bytes).is_err() {
                        gone.push(id);
                        break;
                    }
                }
                Err(e) => warn!(player = id, error = %e, "message not encodable, skipped"),
            }
        }
    }
    for id in gone {
        info!(player = id, "client channel closed");
        senders.remove(&id);
        session.remove_client(id);
    }
}
