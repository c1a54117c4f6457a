//! Per-connection handler: handshake, auth, and the presence lifecycle.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake → validate version
//!   2. Authenticate token → get PlayerIdentity
//!   3. Send HandshakeAck
//!   4. Open a push channel and connect the player to presence
//!   5. Loop: receive envelopes → heartbeats, client disconnect
//!   6. On exit: close the channel and release the player

use std::sync::Arc;

use kinship_presence::{ConnectStatus, FriendDirectory, PresenceService};
use kinship_protocol::{
    Codec, Envelope, Payload, PlayerIdentity, ProtocolError, SystemMessage,
};
use kinship_transport::{Connection, WebSocketConnection};
use tokio::task::JoinHandle;

use crate::channel::{Outbound, PushChannel};
use crate::server::{PROTOCOL_VERSION, ServerState};
use crate::{Authenticator, KinshipError};

/// Drop guard that takes the player offline when the handler exits.
///
/// Runs on every exit path, including panics. Since `Drop` is
/// synchronous, the release is spawned as its own task.
struct PresenceGuard<D: FriendDirectory> {
    identity: PlayerIdentity,
    channel: Arc<PushChannel>,
    writer: JoinHandle<()>,
    presence: PresenceService<D, PushChannel>,
}

impl<D: FriendDirectory> Drop for PresenceGuard<D> {
    fn drop(&mut self) {
        self.channel.close();
        self.writer.abort();

        let identity = self.identity.clone();
        let channel = Arc::clone(&self.channel);
        let presence = self.presence.clone();
        tokio::spawn(async move {
            if let Err(e) = presence.release(&identity, &channel).await {
                tracing::warn!(player_id = %identity.id, error = %e, "release failed");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, D, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, D, C>>,
) -> Result<(), KinshipError>
where
    A: Authenticator,
    D: FriendDirectory,
    C: Codec + Clone,
{
    let conn_id = conn.id();
    let conn = Arc::new(conn);
    let outbound = Arc::new(Outbound::new(Arc::clone(&conn), state.codec.clone()));
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: Handshake ---
    let identity = perform_handshake(&conn, &outbound, &state).await?;
    let player_id = identity.id;
    tracing::info!(%conn_id, %player_id, username = %identity.username, "player authenticated");

    // --- Step 2: Presence ---
    let (channel, queue) = PushChannel::new(conn_id, state.config.outbound_buffer);
    let writer = queue.spawn_writer(Arc::clone(&outbound));
    let guard = PresenceGuard {
        identity: identity.clone(),
        channel: Arc::clone(&channel),
        writer,
        presence: state.presence.clone(),
    };

    match state.presence.connect(&identity, Arc::clone(&channel)).await {
        Ok(report) if report.status == ConnectStatus::Rejected => {
            // The writer delivers the kick and closes the socket; keep
            // reading until the peer acknowledges the close.
            tracing::info!(%conn_id, %player_id, "connection refused: already online");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(%conn_id, %player_id, error = %e, "presence connect failed");
            send_error(&outbound, 503, "presence unavailable").await?;
            return Err(e.into());
        }
    }

    // --- Step 3: Message loop ---
    loop {
        let data = match tokio::time::timeout(state.config.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) if e.is_link_failure() => {
                tracing::debug!(%player_id, error = %e, "connection dropped");
                break;
            }
            Ok(Err(e)) => {
                tracing::warn!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection timed out");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                continue;
            }
        };

        match envelope.payload {
            Payload::System(SystemMessage::Heartbeat { client_time }) => {
                outbound
                    .send(Payload::System(SystemMessage::HeartbeatAck {
                        client_time,
                        server_time: outbound.elapsed_ms(),
                    }))
                    .await?;
            }
            Payload::System(SystemMessage::Disconnect { reason }) => {
                tracing::info!(%player_id, %reason, "client disconnected");
                break;
            }
            Payload::System(_) => {
                tracing::debug!(%player_id, "ignoring unexpected system message");
            }
            Payload::Presence(push) => {
                tracing::debug!(%player_id, kind = push.kind(), "ignoring client-sent presence push");
            }
        }
    }

    // Offline before the socket goes away, so a reconnect that races the
    // close finds the registry already updated.
    drop(guard);
    if let Err(e) = conn.close().await {
        tracing::trace!(%conn_id, error = %e, "close after loop");
    }
    Ok(())
}

/// Performs the initial handshake: receive Handshake, validate, auth, send Ack.
async fn perform_handshake<A, D, C>(
    conn: &WebSocketConnection,
    outbound: &Outbound<C>,
    state: &ServerState<A, D, C>,
) -> Result<PlayerIdentity, KinshipError>
where
    A: Authenticator,
    D: FriendDirectory,
    C: Codec,
{
    let data = match tokio::time::timeout(state.config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = match state.codec.decode(&data) {
        Ok(env) => env,
        Err(e) => {
            send_error(outbound, 400, "malformed handshake").await?;
            return Err(e.into());
        }
    };

    let (version, token) = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version, token }) => (version, token),
        _ => {
            send_error(outbound, 400, "expected Handshake").await?;
            return Err(
                ProtocolError::InvalidMessage("first message must be Handshake".into()).into(),
            );
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            outbound,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(ProtocolError::InvalidMessage("protocol version mismatch".into()).into());
    }

    let token = token.as_deref().unwrap_or("");
    let identity = match state.auth.authenticate(token).await {
        Ok(identity) if identity.is_valid() => identity,
        Ok(_) => {
            send_error(outbound, 401, "unauthorized").await?;
            return Err(
                ProtocolError::InvalidMessage("authenticator returned an unset identity".into())
                    .into(),
            );
        }
        Err(e) => {
            send_error(outbound, 401, "unauthorized").await?;
            return Err(e.into());
        }
    };

    outbound
        .send(Payload::System(SystemMessage::HandshakeAck {
            player: identity.clone(),
            server_time: outbound.elapsed_ms(),
        }))
        .await?;

    Ok(identity)
}

/// Sends a SystemMessage::Error envelope to the client.
async fn send_error<C: Codec>(
    outbound: &Outbound<C>,
    code: u16,
    message: &str,
) -> Result<(), KinshipError> {
    outbound
        .send(Payload::System(SystemMessage::Error {
            code,
            message: message.to_string(),
        }))
        .await
}
