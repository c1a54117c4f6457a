//! Player identity types.
//!
//! Two types live here:
//!
//! - [`PlayerId`]: the 128-bit identifier every other layer keys on.
//! - [`PlayerIdentity`]: the id plus the display attributes friends see
//!   (username, avatar). It behaves like a value type: equality and
//!   hashing look at the id and nothing else.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Newtype over a UUID. `#[serde(transparent)]` keeps the wire form a
/// plain hyphenated string (`"67e55044-10b1-426f-9247-bb680e5fe0c8"`)
/// rather than `{ "0": ... }`.
///
/// The nil UUID means "unset": presence operations treat it as an
/// invalid identity and do nothing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Generates a fresh random (v4) identifier.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// The unset identifier.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns `true` if this is the unset identifier.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Returns the underlying UUID.
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for PlayerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0.as_simple())
    }
}

// ---------------------------------------------------------------------------
// PlayerIdentity
// ---------------------------------------------------------------------------

/// Who a player is, as shown to their friends.
///
/// Equality, ordering-free hashing, and map lookups are defined solely by
/// [`id`](Self::id). Two values with the same id but different usernames
/// (e.g. one fetched before a rename, one after) are the same player.
///
/// `Borrow<PlayerId>` is implemented so a `HashMap<PlayerIdentity, _>` can
/// be queried with a bare `&PlayerId`. That is sound because `Hash` here
/// hashes exactly what `PlayerId`'s `Hash` does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerIdentity {
    /// The player's unique id.
    pub id: PlayerId,

    /// Display name.
    pub username: String,

    /// Avatar reference (URL or asset key). `None` means the default avatar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl PlayerIdentity {
    /// Creates an identity with no avatar.
    pub fn new(id: PlayerId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            avatar: None,
        }
    }

    /// Sets the avatar reference.
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    /// Returns `true` if the identity carries a usable id.
    pub fn is_valid(&self) -> bool {
        !self.id.is_nil()
    }
}

impl PartialEq for PlayerIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PlayerIdentity {}

impl Hash for PlayerIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Borrow<PlayerId> for PlayerIdentity {
    fn borrow(&self) -> &PlayerId {
        &self.id
    }
}

impl fmt::Display for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.id)
    }
}

// ---------------------------------------------------------------------------
// KickReason
// ---------------------------------------------------------------------------

/// Why a connection was forcibly ended by the server.
///
/// Serialized in SCREAMING_SNAKE_CASE (`"DUPLICATE_LOGIN"`) because that's
/// what existing clients switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KickReason {
    /// A moderator suspended the account for a limited time.
    TemporaryBan,
    /// The account is banned for good.
    PermanentBan,
    /// The same player logged in from another connection.
    DuplicateLogin,
}

impl fmt::Display for KickReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemporaryBan => write!(f, "TEMPORARY_BAN"),
            Self::PermanentBan => write!(f, "PERMANENT_BAN"),
            Self::DuplicateLogin => write!(f, "DUPLICATE_LOGIN"),
        }
    }
}
