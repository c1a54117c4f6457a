//! Wire protocol for Kinship.
//!
//! This crate defines what clients and the server exchange:
//!
//! - **Identities** ([`PlayerId`], [`PlayerIdentity`], [`KickReason`]):
//!   shared by every layer above.
//! - **Messages** ([`Envelope`], [`Payload`], [`SystemMessage`],
//!   [`PresencePush`]): the frames on the wire.
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, frames out.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Presence (who is online)
//! ```

mod codec;
mod error;
mod identity;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use identity::{KickReason, PlayerId, PlayerIdentity};
pub use types::{Envelope, Payload, PresencePush, SystemMessage};
