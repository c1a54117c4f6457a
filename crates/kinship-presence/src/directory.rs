//! The friend directory: who is friends with whom.
//!
//! Friendships live in some external store. The presence core only needs
//! one read-only question answered, "who are this player's friends?",
//! so that's all the [`FriendDirectory`] trait asks for.
//! [`InMemoryFriendDirectory`] is a ready-made adapter for demos and tests.

use std::collections::{HashMap, HashSet};
use std::future::Future;

use kinship_protocol::{PlayerId, PlayerIdentity};
use tokio::sync::RwLock;

use crate::DirectoryError;

/// Read-only access to accepted friendships.
///
/// Implementations must treat the call as side-effect free: the presence
/// service may call it for any player at any time, and more than once per
/// connect/disconnect cycle (evictions look friends up again).
pub trait FriendDirectory: Send + Sync + 'static {
    /// Returns the accepted friends of `player`. An unknown player simply
    /// has no friends.
    fn get_friends(
        &self,
        player: PlayerId,
    ) -> impl Future<Output = Result<HashSet<PlayerIdentity>, DirectoryError>> + Send;
}

/// A [`FriendDirectory`] held entirely in memory.
///
/// Friendships are symmetric: adding A–B makes A a friend of B and B a
/// friend of A.
#[derive(Debug, Default)]
pub struct InMemoryFriendDirectory {
    edges: RwLock<HashMap<PlayerId, HashSet<PlayerIdentity>>>,
}

impl InMemoryFriendDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a friendship between `a` and `b`. Self-friendship is
    /// ignored.
    pub async fn add_friendship(&self, a: &PlayerIdentity, b: &PlayerIdentity) {
        if a == b {
            return;
        }
        let mut edges = self.edges.write().await;
        edges.entry(a.id).or_default().replace(b.clone());
        edges.entry(b.id).or_default().replace(a.clone());
        tracing::debug!(a = %a.id, b = %b.id, "friendship added");
    }

    /// Removes the friendship between `a` and `b`, if any. Returns `true`
    /// if one existed.
    pub async fn remove_friendship(&self, a: PlayerId, b: PlayerId) -> bool {
        let mut edges = self.edges.write().await;
        let removed_ab = edges.get_mut(&a).is_some_and(|set| set.remove(&b));
        let removed_ba = edges.get_mut(&b).is_some_and(|set| set.remove(&a));
        removed_ab || removed_ba
    }

    /// Number of players with at least one friend.
    pub async fn len(&self) -> usize {
        self.edges
            .read()
            .await
            .values()
            .filter(|friends| !friends.is_empty())
            .count()
    }

    /// Returns `true` if no friendships are recorded.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl FriendDirectory for InMemoryFriendDirectory {
    async fn get_friends(
        &self,
        player: PlayerId,
    ) -> Result<HashSet<PlayerIdentity>, DirectoryError> {
        Ok(self
            .edges
            .read()
            .await
            .get(&player)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn player(n: u128, name: &str) -> PlayerIdentity {
        PlayerIdentity::new(PlayerId(Uuid::from_u128(n)), name)
    }

    #[tokio::test]
    async fn test_get_friends_unknown_player_is_empty() {
        let dir = InMemoryFriendDirectory::new();

        let friends = dir.get_friends(player(1, "a").id).await.unwrap();

        assert!(friends.is_empty());
    }

    #[tokio::test]
    async fn test_add_friendship_is_symmetric() {
        let dir = InMemoryFriendDirectory::new();
        let (a, b) = (player(1, "a"), player(2, "b"));

        dir.add_friendship(&a, &b).await;

        assert!(dir.get_friends(a.id).await.unwrap().contains(&b));
        assert!(dir.get_friends(b.id).await.unwrap().contains(&a));
    }

    #[tokio::test]
    async fn test_add_friendship_is_not_transitive() {
        // A–B and B–C does not make A and C friends.
        let dir = InMemoryFriendDirectory::new();
        let (a, b, c) = (player(1, "a"), player(2, "b"), player(3, "c"));

        dir.add_friendship(&a, &b).await;
        dir.add_friendship(&b, &c).await;

        let of_a = dir.get_friends(a.id).await.unwrap();
        assert!(!of_a.contains(&c));
        assert_eq!(dir.get_friends(b.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_add_friendship_refreshes_display_attributes() {
        let dir = InMemoryFriendDirectory::new();
        let a = player(1, "a");

        dir.add_friendship(&a, &player(2, "old")).await;
        dir.add_friendship(&a, &player(2, "new")).await;

        let friends = dir.get_friends(a.id).await.unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends.iter().next().unwrap().username, "new");
    }

    #[tokio::test]
    async fn test_add_friendship_with_self_is_ignored() {
        let dir = InMemoryFriendDirectory::new();
        let a = player(1, "a");

        dir.add_friendship(&a, &a).await;

        assert!(dir.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_friendship_removes_both_directions() {
        let dir = InMemoryFriendDirectory::new();
        let (a, b) = (player(1, "a"), player(2, "b"));
        dir.add_friendship(&a, &b).await;

        assert!(dir.remove_friendship(a.id, b.id).await);

        assert!(dir.get_friends(a.id).await.unwrap().is_empty());
        assert!(dir.get_friends(b.id).await.unwrap().is_empty());
        assert!(!dir.remove_friendship(a.id, b.id).await);
    }
}
