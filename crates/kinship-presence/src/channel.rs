//! The push side of a client connection, as seen by the presence core.
//!
//! The presence layer never touches sockets. It holds `Arc` handles to
//! something implementing [`ConnectionChannel`] and asks it to push
//! [`PresencePush`] events. The connection that created the channel owns
//! it: only the connection decides when it's closed, the registry merely
//! keeps a reference while the player is online.

use std::fmt;
use std::future::Future;

use kinship_protocol::PresencePush;

/// Liveness of a channel.
///
/// ```text
///   Open ──(client left)──→ Closed
///     │
///     └──(write failed)───→ Faulted
/// ```
///
/// Only `Open` channels are worth pushing to. The other two states mean
/// the recipient is already gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Open,
    Closed,
    Faulted,
}

impl ChannelState {
    /// Returns `true` if pushes can still be attempted.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
            Self::Faulted => write!(f, "Faulted"),
        }
    }
}

/// Why a single push attempt failed.
///
/// Channel implementations return these; the
/// [`NotificationDispatcher`](crate::NotificationDispatcher) also produces
/// `Timeout` and `Unexpected` on its own when a push hangs or panics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// The push didn't complete in time.
    #[error("push timed out")]
    Timeout,

    /// The underlying link failed while writing.
    #[error("link failure: {0}")]
    Link(String),

    /// The channel was already torn down.
    #[error("channel disposed")]
    Disposed,

    /// Anything else.
    #[error("unexpected push failure: {0}")]
    Unexpected(String),
}

/// A server-initiated, one-way push link to one connected client.
///
/// `push` is fire-and-forget from the client's point of view: success
/// means the event was handed to the link, not that the client read it.
/// Implementations must not block one push on another recipient's push;
/// each channel is independent.
pub trait ConnectionChannel: Send + Sync + 'static {
    /// Current liveness.
    fn state(&self) -> ChannelState;

    /// Pushes one presence event to the client.
    fn push(
        &self,
        push: PresencePush,
    ) -> impl Future<Output = Result<(), PushError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_state_only_open_is_open() {
        assert!(ChannelState::Open.is_open());
        assert!(!ChannelState::Closed.is_open());
        assert!(!ChannelState::Faulted.is_open());
    }

    #[test]
    fn test_channel_state_display() {
        assert_eq!(ChannelState::Faulted.to_string(), "Faulted");
    }

    #[test]
    fn test_push_error_messages() {
        assert_eq!(PushError::Timeout.to_string(), "push timed out");
        assert_eq!(
            PushError::Link("reset by peer".into()).to_string(),
            "link failure: reset by peer"
        );
    }
}
