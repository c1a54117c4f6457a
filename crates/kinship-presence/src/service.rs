//! The presence service: connect, disconnect, and everything in between.
//!
//! Per player the state machine is tiny:
//!
//! ```text
//!            connect()
//!  Offline ───────────→ Online
//!     ↑                   │
//!     └───────────────────┘
//!   disconnect() / release() / kick() / eviction after a failed push
//! ```
//!
//! Every transition is one registry critical section. Friend lookups and
//! pushes happen outside it, against a snapshot, and pushes are spawned
//! so the caller never waits on a peer.

use std::sync::Arc;

use kinship_protocol::{KickReason, PlayerId, PlayerIdentity, PresencePush};
use tokio::task::JoinHandle;

use crate::registry::Registration;
use crate::{
    ConnectionChannel, Delivery, DuplicatePolicy, Fanout, FriendDirectory, NotificationDispatcher,
    PresenceConfig, PresenceError, PresenceRegistry,
};

/// How a connect call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStatus {
    /// The identity was unset; nothing happened.
    Ignored,
    /// The player is now online.
    Online,
    /// The player is now online on this channel; their previous
    /// connection was kicked with `DUPLICATE_LOGIN`.
    Replaced,
    /// The player was already online and the new channel was refused
    /// (kicked with `DUPLICATE_LOGIN`).
    Rejected,
}

/// What a connect call did.
#[derive(Debug)]
pub struct ConnectReport {
    pub status: ConnectStatus,
    /// The friends that were told about this player, which is also exactly
    /// the list this player received in `OnlineFriends`.
    pub online_friends: Vec<PlayerId>,
    /// The pushes started by this call.
    pub deliveries: Fanout,
}

impl ConnectReport {
    fn ignored() -> Self {
        Self {
            status: ConnectStatus::Ignored,
            online_friends: Vec::new(),
            deliveries: Fanout::new(),
        }
    }
}

/// What a disconnect (or release, kick) call did.
#[derive(Debug, Default)]
pub struct DisconnectReport {
    /// `false` if the player wasn't online; nothing else happened then.
    pub removed: bool,
    /// Friends that were told this player went offline.
    pub notified: Vec<PlayerId>,
    /// The pushes started by this call.
    pub deliveries: Fanout,
}

struct Inner<D, C> {
    directory: D,
    registry: PresenceRegistry<C>,
    dispatcher: NotificationDispatcher,
    config: PresenceConfig,
}

/// Tracks who is online and tells friends about it.
///
/// Cheap to clone; clones share the same registry. Push failure handlers
/// hold a clone so they can evict the recipient later.
pub struct PresenceService<D, C> {
    inner: Arc<Inner<D, C>>,
}

impl<D, C> Clone for PresenceService<D, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D, C> PresenceService<D, C>
where
    D: FriendDirectory,
    C: ConnectionChannel,
{
    /// Creates a service with an empty registry.
    pub fn new(directory: D, config: PresenceConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                directory,
                registry: PresenceRegistry::new(),
                dispatcher: NotificationDispatcher::new(config.push_timeout),
                config,
            }),
        }
    }

    /// The friend directory this service reads from.
    pub fn directory(&self) -> &D {
        &self.inner.directory
    }

    /// The live registry.
    pub fn registry(&self) -> &PresenceRegistry<C> {
        &self.inner.registry
    }

    /// The active configuration.
    pub fn config(&self) -> &PresenceConfig {
        &self.inner.config
    }

    /// Returns `true` if the player is online.
    pub fn is_online(&self, id: &PlayerId) -> bool {
        self.inner.registry.contains(id)
    }

    /// Number of online players.
    pub fn online_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Everyone online right now.
    pub fn online_players(&self) -> Vec<PlayerIdentity> {
        self.inner
            .registry
            .snapshot()
            .iter()
            .map(|(identity, _)| identity.clone())
            .collect()
    }

    /// Brings `player` online on `channel` and tells their online friends.
    ///
    /// Pushes started (none of them awaited):
    /// - `FriendOnline(player)` to every friend online in the snapshot
    ///   taken at registration;
    /// - `OnlineFriends` to `channel`, listing exactly those friends.
    ///
    /// A player who is already online is handled according to
    /// [`PresenceConfig::duplicate_policy`].
    ///
    /// # Errors
    /// [`PresenceError::Directory`] if the friend lookup fails. The player
    /// is not registered in that case.
    pub async fn connect(
        &self,
        player: &PlayerIdentity,
        channel: Arc<C>,
    ) -> Result<ConnectReport, PresenceError> {
        if !player.is_valid() {
            tracing::debug!("connect with unset identity ignored");
            return Ok(ConnectReport::ignored());
        }
        let player_id = player.id;
        let inner = &self.inner;

        let friends = inner.directory.get_friends(player_id).await?;

        let mut deliveries = Fanout::new();
        let (status, snapshot) = match inner.config.duplicate_policy {
            DuplicatePolicy::RejectNew => {
                match inner
                    .registry
                    .register_and_snapshot(player.clone(), Arc::clone(&channel))
                {
                    Registration::Registered(snapshot) => (ConnectStatus::Online, snapshot),
                    Registration::Duplicate { .. } => {
                        tracing::warn!(%player_id, "duplicate login rejected");
                        deliveries.push(player_id, self.kick_channel(channel, KickReason::DuplicateLogin));
                        return Ok(ConnectReport {
                            status: ConnectStatus::Rejected,
                            online_friends: Vec::new(),
                            deliveries,
                        });
                    }
                }
            }
            DuplicatePolicy::KickPrevious => {
                let (previous, snapshot) = inner
                    .registry
                    .replace_and_snapshot(player.clone(), Arc::clone(&channel));
                match previous {
                    Some(previous) if !Arc::ptr_eq(&previous, &channel) => {
                        tracing::warn!(%player_id, "duplicate login, kicking previous connection");
                        deliveries.push(player_id, self.kick_channel(previous, KickReason::DuplicateLogin));
                        (ConnectStatus::Replaced, snapshot)
                    }
                    _ => (ConnectStatus::Online, snapshot),
                }
            }
        };

        let online = snapshot.online_among(&friends);
        let mut listed = Vec::with_capacity(online.len());
        for (friend, friend_channel) in online {
            if friend.id == player_id {
                continue;
            }
            let on_failure = self.eviction_handler(friend.id, Arc::clone(&friend_channel));
            deliveries.push(
                friend.id,
                inner.dispatcher.spawn_notify(
                    friend_channel,
                    PresencePush::FriendOnline {
                        friend: player.clone(),
                    },
                    on_failure,
                ),
            );
            listed.push(friend);
        }

        let online_friends: Vec<PlayerId> = listed.iter().map(|friend| friend.id).collect();
        let on_failure = self.eviction_handler(player_id, Arc::clone(&channel));
        deliveries.push(
            player_id,
            inner.dispatcher.spawn_notify(
                channel,
                PresencePush::OnlineFriends { friends: listed },
                on_failure,
            ),
        );

        tracing::info!(
            %player_id,
            online_friends = online_friends.len(),
            ?status,
            "player online"
        );

        Ok(ConnectReport {
            status,
            online_friends,
            deliveries,
        })
    }

    /// Takes `player` offline and tells their online friends.
    ///
    /// A player who isn't online is a no-op: no directory lookup, no
    /// pushes, `removed == false`.
    ///
    /// # Errors
    /// [`PresenceError::Directory`] if the friend lookup fails. The player
    /// has already been removed by then; only the notifications are lost.
    pub async fn disconnect(
        &self,
        player: &PlayerIdentity,
    ) -> Result<DisconnectReport, PresenceError> {
        if !player.is_valid() {
            tracing::debug!("disconnect with unset identity ignored");
            return Ok(DisconnectReport::default());
        }
        if !self.inner.registry.unregister(&player.id) {
            tracing::debug!(player_id = %player.id, "disconnect for offline player ignored");
            return Ok(DisconnectReport::default());
        }
        tracing::info!(player_id = %player.id, "player offline");
        self.announce_offline(player.id).await
    }

    /// Like [`disconnect`](Self::disconnect), but only if `channel` is still
    /// the player's registered channel.
    ///
    /// Connection teardown uses this: if the player has since connected
    /// again elsewhere, the old connection closing must not take the new
    /// one offline.
    pub async fn release(
        &self,
        player: &PlayerIdentity,
        channel: &Arc<C>,
    ) -> Result<DisconnectReport, PresenceError> {
        if !self.inner.registry.unregister_channel(&player.id, channel) {
            tracing::debug!(player_id = %player.id, "release of superseded connection ignored");
            return Ok(DisconnectReport::default());
        }
        tracing::info!(player_id = %player.id, "player offline (connection closed)");
        self.announce_offline(player.id).await
    }

    /// Forces a player offline, telling them why.
    ///
    /// The player's channel gets `Kicked(reason)`; their friends get
    /// `FriendOffline`. Returns a report with `removed == false` if the
    /// player wasn't online.
    ///
    /// # Errors
    /// [`PresenceError::Directory`] if the friend lookup fails (the kick
    /// itself has already happened).
    pub async fn kick(
        &self,
        player_id: PlayerId,
        reason: KickReason,
    ) -> Result<DisconnectReport, PresenceError> {
        let Some((_, channel)) = self.inner.registry.take(&player_id) else {
            return Ok(DisconnectReport::default());
        };
        tracing::info!(%player_id, %reason, "player kicked");

        let mut kicked = Fanout::new();
        kicked.push(player_id, self.kick_channel(channel, reason));

        let mut report = self.announce_offline(player_id).await?;
        kicked.extend(report.deliveries);
        report.deliveries = kicked;
        Ok(report)
    }

    /// Pushes `FriendOffline(player_id)` to the player's friends that are
    /// online now. The caller has already removed the player.
    async fn announce_offline(&self, player_id: PlayerId) -> Result<DisconnectReport, PresenceError> {
        let friends = self.inner.directory.get_friends(player_id).await?;
        let snapshot = self.inner.registry.snapshot();

        let mut report = DisconnectReport {
            removed: true,
            ..DisconnectReport::default()
        };
        for (friend, friend_channel) in snapshot.online_among(&friends) {
            let on_failure = self.eviction_handler(friend.id, Arc::clone(&friend_channel));
            report.deliveries.push(
                friend.id,
                self.inner.dispatcher.spawn_notify(
                    friend_channel,
                    PresencePush::FriendOffline { player_id },
                    on_failure,
                ),
            );
            report.notified.push(friend.id);
        }
        Ok(report)
    }

    /// Sends `Kicked(reason)` to a channel that is no longer registered.
    /// Its failure needs no handling: there's nothing left to evict.
    fn kick_channel(&self, channel: Arc<C>, reason: KickReason) -> JoinHandle<Delivery> {
        self.inner
            .dispatcher
            .spawn_notify(channel, PresencePush::Kicked { reason }, || {})
    }

    /// The failure handler for a push to `player_id` on `channel`.
    fn eviction_handler(&self, player_id: PlayerId, channel: Arc<C>) -> impl FnOnce() + Send + 'static {
        let service = self.clone();
        move || service.evict(player_id, &channel)
    }

    /// Drops a player whose channel failed and, if that took them offline,
    /// tells their friends in the background.
    fn evict(&self, player_id: PlayerId, channel: &Arc<C>) {
        if !self.inner.registry.unregister_channel(&player_id, channel) {
            return;
        }
        tracing::info!(%player_id, "unreachable player evicted");

        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.announce_offline(player_id).await {
                tracing::warn!(%player_id, error = %e, "offline fan-out after eviction failed");
            }
        });
    }
}
