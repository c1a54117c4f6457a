//! The WebSocket-backed presence channel.
//!
//! Each connection gets one [`PushChannel`]. Presence pushes are queued
//! on a bounded mpsc and written by a dedicated writer task, so a push
//! never waits on the socket directly: it waits for queue space, and the
//! dispatcher's timeout covers a client that stops reading.
//!
//! ```text
//!  PresenceService ──push()──→ [mpsc queue] ──writer task──→ Outbound ──→ socket
//!                                                  │
//!                                      send failed → Faulted
//!                                      Kicked sent → Closed + close socket
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Instant;

use kinship_presence::{ChannelState, ConnectionChannel, PushError};
use kinship_protocol::{Codec, Envelope, Payload, PresencePush};
use kinship_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::KinshipError;

// ---------------------------------------------------------------------------
// Outbound: the server→client half of a connection
// ---------------------------------------------------------------------------

/// Frames and sends server→client envelopes.
///
/// Shared by the connection handler (handshake replies, heartbeat acks)
/// and the push writer, so sequence numbers stay monotonic across both.
pub(crate) struct Outbound<C> {
    conn: Arc<WebSocketConnection>,
    codec: C,
    seq: AtomicU64,
    start: Instant,
}

impl<C: Codec> Outbound<C> {
    pub(crate) fn new(conn: Arc<WebSocketConnection>, codec: C) -> Self {
        Self {
            conn,
            codec,
            seq: AtomicU64::new(0),
            start: Instant::now(),
        }
    }

    /// Milliseconds since the connection was accepted.
    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Wraps `payload` in the next envelope and sends it.
    pub(crate) async fn send(&self, payload: Payload) -> Result<(), KinshipError> {
        let envelope = Envelope {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            timestamp: self.elapsed_ms(),
            payload,
        };
        let bytes = self.codec.encode(&envelope)?;
        self.conn.send(&bytes).await?;
        Ok(())
    }

    /// Closes the socket. The peer's close reply ends the handler's
    /// receive loop.
    pub(crate) async fn close(&self) -> Result<(), KinshipError> {
        self.conn.close().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LinkState
// ---------------------------------------------------------------------------

/// [`ChannelState`] in an atomic, shared by a channel and its writer.
#[derive(Debug)]
struct LinkState(AtomicU8);

impl LinkState {
    const OPEN: u8 = 0;
    const CLOSED: u8 = 1;
    const FAULTED: u8 = 2;

    fn new() -> Self {
        Self(AtomicU8::new(Self::OPEN))
    }

    fn get(&self) -> ChannelState {
        match self.0.load(Ordering::Acquire) {
            Self::OPEN => ChannelState::Open,
            Self::CLOSED => ChannelState::Closed,
            _ => ChannelState::Faulted,
        }
    }

    /// Moves out of `Open`. Once closed or faulted the state is final;
    /// the first transition wins.
    fn leave_open(&self, to: ChannelState) {
        let to = match to {
            ChannelState::Open => return,
            ChannelState::Closed => Self::CLOSED,
            ChannelState::Faulted => Self::FAULTED,
        };
        let _ = self
            .0
            .compare_exchange(Self::OPEN, to, Ordering::AcqRel, Ordering::Acquire);
    }
}

// ---------------------------------------------------------------------------
// PushChannel
// ---------------------------------------------------------------------------

/// A [`ConnectionChannel`] that feeds a WebSocket connection.
#[derive(Debug)]
pub struct PushChannel {
    conn_id: ConnectionId,
    state: Arc<LinkState>,
    tx: mpsc::Sender<PresencePush>,
}

/// The receiving end of a [`PushChannel`], consumed by the writer task.
pub(crate) struct PushQueue {
    conn_id: ConnectionId,
    state: Arc<LinkState>,
    rx: mpsc::Receiver<PresencePush>,
}

impl PushChannel {
    /// Creates an open channel whose queue holds up to `buffer` pushes.
    pub(crate) fn new(conn_id: ConnectionId, buffer: usize) -> (Arc<Self>, PushQueue) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let state = Arc::new(LinkState::new());
        let channel = Arc::new(Self {
            conn_id,
            state: Arc::clone(&state),
            tx,
        });
        (channel, PushQueue { conn_id, state, rx })
    }

    /// The connection this channel writes to.
    pub fn connection_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Marks the channel closed. Pushes already queued may still be
    /// written; new ones fail with [`PushError::Disposed`].
    pub fn close(&self) {
        self.state.leave_open(ChannelState::Closed);
    }
}

impl ConnectionChannel for PushChannel {
    fn state(&self) -> ChannelState {
        self.state.get()
    }

    async fn push(&self, push: PresencePush) -> Result<(), PushError> {
        match self.state.get() {
            ChannelState::Open => {}
            ChannelState::Closed => return Err(PushError::Disposed),
            ChannelState::Faulted => {
                return Err(PushError::Link("previous write failed".into()));
            }
        }
        self.tx.send(push).await.map_err(|_| PushError::Disposed)
    }
}

impl PushQueue {
    /// Spawns the writer task that drains this queue onto `outbound`.
    ///
    /// The task ends when every sender is gone, when a write fails
    /// (channel → Faulted), or after a `Kicked` push is written
    /// (channel → Closed, socket closed).
    pub(crate) fn spawn_writer<C>(self, outbound: Arc<Outbound<C>>) -> JoinHandle<()>
    where
        C: Codec,
    {
        tokio::spawn(self.run(outbound))
    }

    async fn run<C: Codec>(mut self, outbound: Arc<Outbound<C>>) {
        let conn_id = self.conn_id;
        while let Some(push) = self.rx.recv().await {
            let kind = push.kind();
            let kicked = matches!(push, PresencePush::Kicked { .. });

            if let Err(e) = outbound.send(Payload::Presence(push)).await {
                tracing::debug!(%conn_id, kind, error = %e, "push write failed");
                self.state.leave_open(ChannelState::Faulted);
                return;
            }
            tracing::trace!(%conn_id, kind, "push written");

            if kicked {
                self.state.leave_open(ChannelState::Closed);
                if let Err(e) = outbound.close().await {
                    tracing::debug!(%conn_id, error = %e, "close after kick failed");
                }
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use kinship_protocol::{KickReason, PlayerId};

    use super::*;

    fn channel(buffer: usize) -> (Arc<PushChannel>, PushQueue) {
        PushChannel::new(ConnectionId::new(1), buffer)
    }

    fn offline() -> PresencePush {
        PresencePush::FriendOffline {
            player_id: PlayerId::nil(),
        }
    }

    #[test]
    fn test_link_state_starts_open() {
        assert_eq!(LinkState::new().get(), ChannelState::Open);
    }

    #[test]
    fn test_link_state_first_transition_wins() {
        let state = LinkState::new();
        state.leave_open(ChannelState::Faulted);
        state.leave_open(ChannelState::Closed);
        assert_eq!(state.get(), ChannelState::Faulted);
    }

    #[test]
    fn test_link_state_cannot_reopen() {
        let state = LinkState::new();
        state.leave_open(ChannelState::Closed);
        state.leave_open(ChannelState::Open);
        assert_eq!(state.get(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn test_push_open_channel_enqueues() {
        let (channel, mut queue) = channel(4);

        channel.push(offline()).await.unwrap();

        assert_eq!(queue.rx.recv().await, Some(offline()));
    }

    #[tokio::test]
    async fn test_push_after_close_returns_disposed() {
        let (channel, _queue) = channel(4);
        channel.close();

        let result = channel.push(offline()).await;

        assert_eq!(result, Err(PushError::Disposed));
        assert_eq!(channel.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn test_push_after_fault_returns_link_error() {
        let (channel, queue) = channel(4);
        queue.state.leave_open(ChannelState::Faulted);

        let result = channel.push(offline()).await;

        assert!(matches!(result, Err(PushError::Link(_))));
    }

    #[tokio::test]
    async fn test_push_writer_gone_returns_disposed() {
        let (channel, queue) = channel(4);
        drop(queue);

        let result = channel.push(offline()).await;

        assert_eq!(result, Err(PushError::Disposed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_full_queue_waits_for_space() {
        let (channel, mut queue) = channel(1);
        channel.push(offline()).await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_secs(1),
            channel.push(PresencePush::Kicked {
                reason: KickReason::TemporaryBan,
            }),
        )
        .await;
        assert!(blocked.is_err(), "second push should wait for queue space");

        queue.rx.recv().await;
        channel.push(offline()).await.unwrap();
    }
}
