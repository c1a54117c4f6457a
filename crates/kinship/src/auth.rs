//! Authentication hook for the handshake.
//!
//! Kinship doesn't know how your players log in. It calls an
//! [`Authenticator`] with whatever token the client put in its
//! `Handshake` and trusts the [`PlayerIdentity`] that comes back. The
//! identity's id is the registry key; its username and avatar are what
//! friends see in `FriendOnline`.

use std::future::Future;

use kinship_protocol::PlayerIdentity;

/// Why a handshake token was refused.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The client sent no token at all.
    #[error("missing auth token")]
    MissingToken,

    /// The token was malformed, expired, or unknown.
    #[error("authentication failed: {0}")]
    Rejected(String),

    /// The identity provider couldn't be reached.
    #[error("auth backend unavailable: {0}")]
    Unavailable(String),
}

/// Validates a client's auth token and returns who they are.
///
/// # Example
///
/// ```rust
/// use kinship::{AuthError, Authenticator};
/// use kinship_protocol::{PlayerId, PlayerIdentity};
///
/// /// Token format `<uuid>:<username>`. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<PlayerIdentity, AuthError> {
///         let (id, username) = token
///             .split_once(':')
///             .ok_or_else(|| AuthError::Rejected("expected <uuid>:<username>".into()))?;
///         let id: uuid::Uuid = id
///             .parse()
///             .map_err(|_| AuthError::Rejected("bad uuid".into()))?;
///         Ok(PlayerIdentity::new(PlayerId(id), username))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates `token` and returns the player's identity.
    ///
    /// The token is empty if the client sent none; return
    /// [`AuthError::MissingToken`] if that isn't acceptable.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<PlayerIdentity, AuthError>> + Send;
}
