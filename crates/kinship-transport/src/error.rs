/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer already closed the connection.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding, accepting, or upgrading a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Returns `true` if the error means the link is gone for good
    /// (as opposed to a one-off accept failure).
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed(_) | Self::SendFailed(_) | Self::ReceiveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_link_failure_classifies_variants() {
        let io = || std::io::Error::from(std::io::ErrorKind::BrokenPipe);

        assert!(TransportError::ConnectionClosed("bye".into()).is_link_failure());
        assert!(TransportError::SendFailed(io()).is_link_failure());
        assert!(TransportError::ReceiveFailed(io()).is_link_failure());
        assert!(!TransportError::AcceptFailed(io()).is_link_failure());
    }
}
