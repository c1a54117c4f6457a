//! `KinshipServer` builder and accept loop.
//!
//! This is the entry point for running a presence server. It ties the
//! layers together: transport → protocol → presence.

use std::sync::Arc;
use std::time::Duration;

use kinship_presence::{FriendDirectory, PresenceConfig, PresenceService};
use kinship_protocol::{Codec, JsonCodec};
use kinship_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{Authenticator, KinshipError, PushChannel};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Per-connection limits used by the host.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How many presence pushes may queue for one client before a push
    /// has to wait. Default: 64.
    pub outbound_buffer: usize,

    /// A connected client that sends nothing (not even a heartbeat) for
    /// this long is dropped. Default: 15 s.
    pub idle_timeout: Duration,

    /// How long a new connection has to send its `Handshake`.
    /// Default: 5 s.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: 64,
            idle_timeout: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A, D, C> {
    pub(crate) presence: PresenceService<D, PushChannel>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
}

/// Builder for configuring and starting a Kinship server.
///
/// # Example
///
/// ```rust,ignore
/// use kinship::prelude::*;
///
/// let server = KinshipServer::builder()
///     .bind("0.0.0.0:8080")
///     .idle_timeout(Duration::from_secs(30))
///     .build(my_auth, my_directory)
///     .await?;
/// server.run().await
/// ```
pub struct KinshipServerBuilder {
    bind_addr: String,
    presence_config: PresenceConfig,
    server_config: ServerConfig,
}

impl KinshipServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            presence_config: PresenceConfig::default(),
            server_config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the presence configuration (push timeout, duplicate policy).
    pub fn presence_config(mut self, config: PresenceConfig) -> Self {
        self.presence_config = config;
        self
    }

    /// Sets the per-client push queue size.
    pub fn outbound_buffer(mut self, buffer: usize) -> Self {
        self.server_config.outbound_buffer = buffer;
        self
    }

    /// Sets how long a silent client is kept.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.server_config.idle_timeout = timeout;
        self
    }

    /// Sets how long a new connection may take to handshake.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.server_config.handshake_timeout = timeout;
        self
    }

    /// Binds the listener and builds the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<A, D>(
        self,
        auth: A,
        directory: D,
    ) -> Result<KinshipServer<A, D, JsonCodec>, KinshipError>
    where
        A: Authenticator,
        D: FriendDirectory,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            presence: PresenceService::new(directory, self.presence_config),
            auth,
            codec: JsonCodec,
            config: self.server_config,
        });

        Ok(KinshipServer { transport, state })
    }
}

impl Default for KinshipServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Kinship server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct KinshipServer<A, D, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, D, C>>,
}

impl KinshipServer<(), (), JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> KinshipServerBuilder {
        KinshipServerBuilder::new()
    }
}

impl<A, D, C> KinshipServer<A, D, C>
where
    A: Authenticator,
    D: FriendDirectory,
    C: Codec + Clone,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the presence service, for kicks and online queries
    /// from outside the connection flow.
    pub fn presence(&self) -> PresenceService<D, PushChannel> {
        self.state.presence.clone()
    }

    /// Runs the accept loop.
    ///
    /// Each accepted connection gets its own task running the handshake
    /// and the presence lifecycle. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), KinshipError> {
        tracing::info!("Kinship server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.outbound_buffer, 64);
        assert_eq!(config.idle_timeout, Duration::from_secs(15));
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_setters_override_defaults() {
        let builder = KinshipServerBuilder::new()
            .bind("0.0.0.0:9000")
            .outbound_buffer(8)
            .idle_timeout(Duration::from_secs(60))
            .handshake_timeout(Duration::from_secs(2));

        assert_eq!(builder.bind_addr, "0.0.0.0:9000");
        assert_eq!(builder.server_config.outbound_buffer, 8);
        assert_eq!(builder.server_config.idle_timeout, Duration::from_secs(60));
        assert_eq!(builder.server_config.handshake_timeout, Duration::from_secs(2));
    }
}
