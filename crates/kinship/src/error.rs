//! Unified error type for the Kinship server.

use kinship_presence::PresenceError;
use kinship_protocol::ProtocolError;
use kinship_transport::TransportError;

use crate::AuthError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum KinshipError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, bad handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The friend directory failed during connect or disconnect.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// The handshake token was refused.
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[cfg(test)]
mod tests {
    use kinship_presence::DirectoryError;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let kinship_err: KinshipError = err.into();
        assert!(matches!(kinship_err, KinshipError::Transport(_)));
        assert!(kinship_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let kinship_err: KinshipError = err.into();
        assert!(matches!(kinship_err, KinshipError::Protocol(_)));
    }

    #[test]
    fn test_from_presence_error() {
        let err = PresenceError::from(DirectoryError::Unavailable("db down".into()));
        let kinship_err: KinshipError = err.into();
        assert!(matches!(kinship_err, KinshipError::Presence(_)));
        assert!(kinship_err.to_string().contains("db down"));
    }

    #[test]
    fn test_from_auth_error() {
        let err = AuthError::Rejected("expired".into());
        let kinship_err: KinshipError = err.into();
        assert!(matches!(kinship_err, KinshipError::Auth(_)));
    }
}
