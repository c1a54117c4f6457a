use std::collections::HashMap;

use kinship::prelude::*;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Demo roster
// ---------------------------------------------------------------------------

const PLAYERS: [&str; 5] = ["alice", "bob", "carol", "dave", "erin"];

/// alice–bob, bob–carol, carol–dave. erin has no friends.
const FRIENDSHIPS: [(&str, &str); 3] = [("alice", "bob"), ("bob", "carol"), ("carol", "dave")];

/// Fixed demo players, keyed by username.
struct Roster {
    players: HashMap<&'static str, PlayerIdentity>,
}

impl Roster {
    fn new() -> Self {
        let players = PLAYERS
            .iter()
            .enumerate()
            .map(|(i, &name)| {
                let id = PlayerId(Uuid::from_u128(i as u128 + 1));
                (name, PlayerIdentity::new(id, name))
            })
            .collect();
        Self { players }
    }

    fn get(&self, username: &str) -> Option<&PlayerIdentity> {
        self.players.get(username)
    }

    async fn directory(&self) -> InMemoryFriendDirectory {
        let directory = InMemoryFriendDirectory::new();
        for (a, b) in FRIENDSHIPS {
            if let (Some(a), Some(b)) = (self.get(a), self.get(b)) {
                directory.add_friendship(a, b).await;
            }
        }
        directory
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

/// The token is the username. Development only.
struct RosterAuth(Roster);

impl Authenticator for RosterAuth {
    async fn authenticate(&self, token: &str) -> Result<PlayerIdentity, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        self.0
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::Rejected(format!("unknown player {token:?}")))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let addr = std::env::var("KINSHIP_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into());
    let roster = Roster::new();
    let directory = roster.directory().await;

    let server = KinshipServer::builder()
        .bind(&addr)
        .build(RosterAuth(roster), directory)
        .await?;

    tracing::info!(
        addr = %server.local_addr()?,
        players = ?PLAYERS,
        "presence demo ready; handshake with a username as the token"
    );

    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    type Ws = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn start() -> String {
        let roster = Roster::new();
        let directory = roster.directory().await;
        let server = KinshipServer::builder()
            .bind("127.0.0.1:0")
            .build(RosterAuth(roster), directory)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        addr
    }

    async fn ws(addr: &str) -> Ws {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();
        ws
    }

    async fn next(ws: &mut Ws) -> Envelope {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_slice(&msg.into_data()).unwrap()
    }

    async fn next_push(ws: &mut Ws) -> PresencePush {
        match next(ws).await.payload {
            Payload::Presence(push) => push,
            other => panic!("expected push, got {other:?}"),
        }
    }

    async fn login(ws: &mut Ws, name: &str) -> Vec<String> {
        let env = Envelope {
            seq: 0,
            timestamp: 0,
            payload: Payload::System(SystemMessage::Handshake {
                version: PROTOCOL_VERSION,
                token: Some(name.into()),
            }),
        };
        ws.send(Message::Binary(serde_json::to_vec(&env).unwrap().into()))
            .await
            .unwrap();
        let _ = next(ws).await; // HandshakeAck
        match next_push(ws).await {
            PresencePush::OnlineFriends { friends } => {
                friends.into_iter().map(|f| f.username).collect()
            }
            other => panic!("expected OnlineFriends, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_roster_auth_unknown_player_rejected() {
        let auth = RosterAuth(Roster::new());
        assert!(matches!(
            auth.authenticate("mallory").await,
            Err(AuthError::Rejected(_))
        ));
        assert!(matches!(
            auth.authenticate("").await,
            Err(AuthError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn test_roster_auth_known_player_accepted() {
        let auth = RosterAuth(Roster::new());
        let alice = auth.authenticate("alice").await.unwrap();
        assert_eq!(alice.username, "alice");
        assert!(alice.is_valid());
    }

    #[tokio::test]
    async fn test_seeded_directory_is_symmetric() {
        let roster = Roster::new();
        let directory = roster.directory().await;
        let bob = roster.get("bob").unwrap();

        let friends = directory.get_friends(bob.id).await.unwrap();
        let mut names: Vec<_> = friends.into_iter().map(|f| f.username).collect();
        names.sort();

        assert_eq!(names, vec!["alice", "carol"]);
    }

    #[tokio::test]
    async fn test_demo_friend_chain() {
        let addr = start().await;

        let mut alice = ws(&addr).await;
        assert!(login(&mut alice, "alice").await.is_empty());

        let mut bob = ws(&addr).await;
        assert_eq!(login(&mut bob, "bob").await, vec!["alice"]);
        match next_push(&mut alice).await {
            PresencePush::FriendOnline { friend } => assert_eq!(friend.username, "bob"),
            other => panic!("expected FriendOnline, got {other:?}"),
        }

        let mut carol = ws(&addr).await;
        assert_eq!(login(&mut carol, "carol").await, vec!["bob"]);
        match next_push(&mut bob).await {
            PresencePush::FriendOnline { friend } => assert_eq!(friend.username, "carol"),
            other => panic!("expected FriendOnline, got {other:?}"),
        }
    }
}
