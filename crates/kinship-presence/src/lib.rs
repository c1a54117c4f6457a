//! Real-time presence for Kinship.
//!
//! Knows which players hold a live connection right now and tells their
//! friends when that changes.
//!
//! # Key types
//!
//! - [`PresenceService`]: `connect` / `disconnect` / `release` / `kick`
//! - [`PresenceRegistry`]: the single mutex-guarded map of who's online
//! - [`NotificationDispatcher`]: failure-isolated, per-recipient pushes
//! - [`ConnectionChannel`]: what a connection must offer to receive pushes
//! - [`FriendDirectory`]: where friendships come from
//!
//! # How it fits in the stack
//!
//! ```text
//! Host (above)      ← accepts connections, authenticates, owns channels
//!     ↕
//! Presence (this)   ← registry, fan-out, eviction
//!     ↕
//! Protocol (below)  ← PlayerId, PlayerIdentity, PresencePush
//! ```

mod channel;
mod config;
mod directory;
mod dispatcher;
mod error;
mod registry;
mod service;

pub use channel::{ChannelState, ConnectionChannel, PushError};
pub use config::{DuplicatePolicy, PresenceConfig};
pub use directory::{FriendDirectory, InMemoryFriendDirectory};
pub use dispatcher::{Delivery, FailureKind, Fanout, NotificationDispatcher};
pub use error::{DirectoryError, PresenceError};
pub use registry::{PresenceRegistry, Registration, Snapshot};
pub use service::{ConnectReport, ConnectStatus, DisconnectReport, PresenceService};
