//! In-memory listener and dialer.
//!
//! `bind` hands back both ends of a connection queue. A dial pushes a
//! pending connection and waits for the server to acknowledge it, so a
//! returned [`Connection`] is known to have a live reader.

use crate::error::{HarnessError, HarnessResult};
use crate::frame::Envelope;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Identifier assigned by the listener when it accepts a connection.
pub type ConnectionId = u64;

pub(crate) struct PendingConnection {
    pub frames: mpsc::Receiver<Envelope>,
    pub accepted: oneshot::Sender<ConnectionId>,
}

/// Accepting side, owned by the serving loop.
pub(crate) struct InMemoryListener {
    incoming: mpsc::Receiver<PendingConnection>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryListener {
    /// Next pending connection, with its id. `None` once every dialer is gone.
    pub async fn accept(&mut self) -> Option<(ConnectionId, mpsc::Receiver<Envelope>)> {
        loop {
            let pending = self.incoming.recv().await?;
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            // A dialer that gave up has dropped its ack receiver; skip it.
            if pending.accepted.send(id).is_ok() {
                return Some((id, pending.frames));
            }
        }
    }
}

/// Dialing side.
#[derive(Clone)]
pub(crate) struct Dialer {
    outgoing: mpsc::Sender<PendingConnection>,
    frame_buffer: usize,
}

impl Dialer {
    /// Open a connection and wait for the listener to acknowledge it.
    pub async fn dial(&self, handshake_timeout: Duration) -> HarnessResult<Connection> {
        let (frames_tx, frames_rx) = mpsc::channel(self.frame_buffer);
        let (ack_tx, ack_rx) = oneshot::channel();

        self.outgoing
            .send(PendingConnection {
                frames: frames_rx,
                accepted: ack_tx,
            })
            .await
            .map_err(|_| HarnessError::ListenerClosed)?;

        match tokio::time::timeout(handshake_timeout, ack_rx).await {
            Ok(Ok(id)) => Ok(Connection {
                id,
                frames: frames_tx,
            }),
            Ok(Err(_)) => Err(HarnessError::DialFailed(
                "listener dropped the connection before accepting".to_string(),
            )),
            Err(_) => Err(HarnessError::Handshake(handshake_timeout)),
        }
    }
}

/// An accepted client connection.
pub(crate) struct Connection {
    pub id: ConnectionId,
    pub frames: mpsc::Sender<Envelope>,
}

/// Create a listener/dialer pair. Nothing is shared with any other pair.
pub(crate) fn bind(backlog: usize, frame_buffer: usize) -> (Dialer, InMemoryListener) {
    let (tx, rx) = mpsc::channel(backlog.max(1));
    (
        Dialer {
            outgoing: tx,
            frame_buffer: frame_buffer.max(1),
        },
        InMemoryListener {
            incoming: rx,
            next_id: Arc::new(AtomicU64::new(1)),
        },
    )
}
