//! # Kinship
//!
//! Real-time friend presence over WebSockets.
//!
//! Clients connect, authenticate with a token, and from then on receive
//! presence pushes: which friends are online when they arrive, and
//! `FriendOnline` / `FriendOffline` as friends come and go. You supply an
//! [`Authenticator`] and a [`FriendDirectory`](kinship_presence::FriendDirectory);
//! Kinship handles the connections, the registry, and the fan-out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kinship::prelude::*;
//!
//! // Implement Authenticator, then:
//! // let server = KinshipServer::builder()
//! //     .bind("0.0.0.0:8080")
//! //     .build(my_auth, InMemoryFriendDirectory::new())
//! //     .await?;
//! // server.run().await
//! ```

mod auth;
mod channel;
mod error;
mod handler;
mod server;

pub use auth::{AuthError, Authenticator};
pub use channel::PushChannel;
pub use error::KinshipError;
pub use server::{KinshipServer, KinshipServerBuilder, PROTOCOL_VERSION, ServerConfig};

pub use kinship_presence;
pub use kinship_protocol;
pub use kinship_transport;

/// Everything needed to run a server and talk to it.
pub mod prelude {
    pub use crate::{
        AuthError, Authenticator, KinshipError, KinshipServer, KinshipServerBuilder,
        PROTOCOL_VERSION, PushChannel, ServerConfig,
    };
    pub use kinship_presence::{
        ChannelState, ConnectionChannel, DirectoryError, DuplicatePolicy, FriendDirectory,
        InMemoryFriendDirectory, PresenceConfig, PresenceError, PresenceService,
    };
    pub use kinship_protocol::{
        Envelope, KickReason, Payload, PlayerId, PlayerIdentity, PresencePush, SystemMessage,
    };
}
