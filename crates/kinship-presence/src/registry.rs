//! The presence registry: who is online right now, and how to reach them.
//!
//! This is the only shared mutable state in the presence layer. One
//! `parking_lot::Mutex` guards one `HashMap`, and every operation is a
//! single short critical section: insert, remove, or copy the map. Nothing
//! that can block (sockets, the friend directory, `.await` of any kind)
//! ever runs while the lock is held. Callers take a [`Snapshot`] and do
//! their slow work against the copy.
//!
//! # Invariant
//!
//! At most one entry per player. `PlayerIdentity` hashes by id alone, so
//! the same player connecting with a refreshed username still maps to the
//! same slot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kinship_protocol::{PlayerId, PlayerIdentity};
use parking_lot::Mutex;

/// Result of [`PresenceRegistry::register_and_snapshot`].
#[derive(Debug)]
pub enum Registration<C> {
    /// The player was inserted. The snapshot was taken in the same
    /// critical section and already includes them.
    Registered(Snapshot<C>),

    /// The player was already online; nothing changed.
    Duplicate {
        /// The channel currently registered for the player.
        existing: Arc<C>,
    },
}

/// The in-memory map of connected players to their push channels.
///
/// Generic over the channel type so tests can register anything; the
/// presence service uses it with a [`ConnectionChannel`](crate::ConnectionChannel).
#[derive(Debug)]
pub struct PresenceRegistry<C> {
    entries: Mutex<HashMap<PlayerIdentity, Arc<C>>>,
}

impl<C> PresenceRegistry<C> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts `identity → channel` unless the player is already present.
    ///
    /// Returns `false` (and leaves the existing entry alone) on a duplicate.
    pub fn register(&self, identity: PlayerIdentity, channel: Arc<C>) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(&identity.id) {
            return false;
        }
        entries.insert(identity, channel);
        true
    }

    /// Removes the player's entry. Returns `true` if one was removed;
    /// removing an absent player is a no-op.
    pub fn unregister(&self, id: &PlayerId) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    /// Removes the player's entry only if it still points at `channel`.
    ///
    /// Failure handlers and connection teardown use this instead of
    /// [`unregister`](Self::unregister): by the time they run, the player
    /// may have reconnected on a new channel, and that entry must survive.
    pub fn unregister_channel(&self, id: &PlayerId, channel: &Arc<C>) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(id) {
            Some(current) if Arc::ptr_eq(current, channel) => {
                entries.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Removes the player's entry and hands back what was stored.
    pub fn take(&self, id: &PlayerId) -> Option<(PlayerIdentity, Arc<C>)> {
        self.entries.lock().remove_entry(id)
    }

    /// Copies the current mapping.
    pub fn snapshot(&self) -> Snapshot<C> {
        Snapshot {
            entries: self.entries.lock().clone(),
        }
    }

    /// [`register`](Self::register) and, on success,
    /// [`snapshot`](Self::snapshot), atomically.
    ///
    /// No other registry operation can interleave between the two, so the
    /// snapshot is exactly the state the new player joined.
    pub fn register_and_snapshot(
        &self,
        identity: PlayerIdentity,
        channel: Arc<C>,
    ) -> Registration<C> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&identity.id) {
            return Registration::Duplicate {
                existing: Arc::clone(existing),
            };
        }
        entries.insert(identity, channel);
        Registration::Registered(Snapshot {
            entries: entries.clone(),
        })
    }

    /// Installs `identity → channel`, replacing any previous entry, and
    /// snapshots in the same critical section.
    ///
    /// Returns the replaced channel, if there was one. The stored identity
    /// is refreshed as well, so friends see the latest display attributes.
    pub fn replace_and_snapshot(
        &self,
        identity: PlayerIdentity,
        channel: Arc<C>,
    ) -> (Option<Arc<C>>, Snapshot<C>) {
        let mut entries = self.entries.lock();
        // `insert` keeps the old key on collision; remove first so the
        // refreshed identity is what gets stored.
        let previous = entries.remove(&identity.id);
        entries.insert(identity, channel);
        (
            previous,
            Snapshot {
                entries: entries.clone(),
            },
        )
    }

    /// Returns `true` if the player is online.
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Returns the player's channel, if they're online.
    pub fn channel(&self, id: &PlayerId) -> Option<Arc<C>> {
        self.entries.lock().get(id).cloned()
    }

    /// Number of online players.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nobody is online.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<C> Default for PresenceRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// An immutable copy of the registry at one instant.
///
/// Holding a snapshot holds no lock. Channels inside are shared `Arc`
/// handles, so a snapshot can outlive the entries it was copied from;
/// pushing to a stale channel just fails and is handled like any other
/// delivery failure.
#[derive(Debug)]
pub struct Snapshot<C> {
    entries: HashMap<PlayerIdentity, Arc<C>>,
}

impl<C> Clone for Snapshot<C> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<C> Snapshot<C> {
    /// Looks up an online player's channel.
    pub fn get(&self, id: &PlayerId) -> Option<&Arc<C>> {
        self.entries.get(id)
    }

    /// Returns `true` if the player was online when the snapshot was taken.
    pub fn contains(&self, id: &PlayerId) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of online players in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over every online player and their channel.
    pub fn iter(&self) -> impl Iterator<Item = (&PlayerIdentity, &Arc<C>)> {
        self.entries.iter()
    }

    /// The members of `friends` that are online in this snapshot.
    ///
    /// Matching is by id. The identity returned is the one stored in the
    /// registry (what the friend connected with), not the directory's copy.
    pub fn online_among(
        &self,
        friends: &HashSet<PlayerIdentity>,
    ) -> Vec<(PlayerIdentity, Arc<C>)> {
        friends
            .iter()
            .filter_map(|friend| self.entries.get_key_value(&friend.id))
            .map(|(identity, channel)| (identity.clone(), Arc::clone(channel)))
            .collect()
    }
}
