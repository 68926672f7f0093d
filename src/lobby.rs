use crate::{
    error::LobbyError,
    replication::{LobbyEvent, ObserverChannel, Observers},
    roster::{Participant, ParticipantId},
    session::{LobbySession, ServerTime},
};
use chrono::{DateTime, Utc};
use matchbox_protocol::PeerId;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

pub use crate::session::LobbyStatus;

pub type PlayerId = ParticipantId;

/// Listing entry for lobby discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbySummary {
    pub id: Uuid,
    pub owner: PlayerId,
    pub status: LobbyStatus,
    pub is_private: bool,
    pub player_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Full replicated state of a lobby.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyView {
    pub id: Uuid,
    pub owner: PlayerId,
    pub status: LobbyStatus,
    pub roster: Vec<Participant>,
    pub started_at: Option<ServerTime>,
}

#[derive(Debug)]
pub struct Lobby {
    pub id: Uuid,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
    session: LobbySession,
    observers: Observers,
}

impl Lobby {
    pub fn new(owner: PlayerId, is_private: bool) -> Self {
        Self::with_session(LobbySession::new(owner), is_private)
    }

    pub fn with_session(session: LobbySession, is_private: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            is_private,
            created_at: Utc::now(),
            session,
            observers: Observers::new(),
        }
    }

    pub fn session(&self) -> &LobbySession {
        &self.session
    }

    pub fn summary(&self) -> LobbySummary {
        LobbySummary {
            id: self.id,
            owner: self.session.owner().clone(),
            status: self.session.status(),
            is_private: self.is_private,
            player_count: self.session.roster().len(),
            created_at: self.created_at,
        }
    }

    pub fn view(&self) -> LobbyView {
        LobbyView {
            id: self.id,
            owner: self.session.owner().clone(),
            status: self.session.status(),
            roster: self.session.roster().as_slice().to_vec(),
            started_at: self.session.started_at(),
        }
    }

    pub fn snapshot(&self) -> LobbyEvent {
        LobbyEvent::Snapshot {
            roster: self.session.roster().as_slice().to_vec(),
            started_at: self.session.started_at(),
        }
    }

    /// Adds `player` to the roster, tells the existing observers, then
    /// registers the new connection as an observer.
    pub fn connect(
        &mut self,
        player: PlayerId,
        peer_id: PeerId,
        channel: ObserverChannel,
    ) -> Result<(), LobbyError> {
        let changes = self.session.connect(player)?;
        self.observers.broadcast(changes);
        let snapshot = self.snapshot();
        self.observers.register(peer_id, channel, snapshot);
        Ok(())
    }

    pub fn disconnect(&mut self, player: &str, peer_id: &PeerId) {
        self.observers.deregister(peer_id);
        let changes = self.session.disconnect(player);
        self.observers.broadcast(changes);
    }

    pub fn start_match(&mut self, caller: &str, now: ServerTime) -> Result<(), LobbyError> {
        let changes = self.session.start_match(caller, now)?;
        info!(lobby_id = %self.id, started_at = now.0, "match started");
        self.observers.broadcast(changes);
        Ok(())
    }

    /// Ends the session: whoever is still watching is told and disconnected.
    pub fn close(self) {
        self.observers.close_all(&LobbyEvent::LobbyClosed, "lobby closed");
    }
}
