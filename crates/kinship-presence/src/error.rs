//! Error types for the presence layer.
//!
//! Push failures are deliberately absent here: the dispatcher swallows
//! them. What does surface is trouble reaching the friend directory,
//! which callers need to hear about.

/// Errors reported by a [`FriendDirectory`](crate::FriendDirectory).
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The backing store couldn't be reached.
    #[error("friend directory unavailable: {0}")]
    Unavailable(String),

    /// The backing store returned an error of its own.
    #[error("friend directory backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors returned by [`PresenceService`](crate::PresenceService).
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// Looking up friends failed. A connect that fails this way never
    /// registered the player; a disconnect has already removed them.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
