use crate::auth::ChallengeManager;
use crate::error::LobbyError;
use crate::lobby::{Lobby, LobbyStatus, LobbySummary, LobbyView, PlayerId};
use crate::replication::ObserverChannel;
use crate::role::Role;
use crate::session::{ServerClock, ServerTime};
use matchbox_protocol::PeerId;
use matchbox_signaling::{common_logic::StateObj, SignalingState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;
use uuid::Uuid;

#[derive(Default, Debug)]
pub struct LobbyManager {
    lobbies: HashMap<Uuid, Lobby>,
}

impl LobbyManager {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn create_lobby(&mut self, owner: PlayerId, is_private: bool) -> LobbySummary {
        self.insert_lobby(Lobby::new(owner, is_private))
    }

    pub fn insert_lobby(&mut self, lobby: Lobby) -> LobbySummary {
        let summary = lobby.summary();
        info!(lobby_id = %summary.id, owner = %summary.owner, is_private = summary.is_private, "lobby created");
        self.lobbies.insert(lobby.id, lobby);
        summary
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.lobbies.contains_key(id)
    }

    pub fn view(&self, id: &Uuid) -> Option<LobbyView> {
        self.lobbies.get(id).map(Lobby::view)
    }

    /// Public lobbies still waiting for their match, oldest first.
    pub fn get_public_lobbies(&self) -> Vec<LobbySummary> {
        let mut lobbies: Vec<_> = self
            .lobbies
            .values()
            .filter(|lobby| !lobby.is_private && lobby.session().status() == LobbyStatus::Lobby)
            .map(Lobby::summary)
            .collect();
        lobbies.sort_by_key(|lobby| lobby.created_at);
        lobbies
    }

    /// Checks that `lobby_id` can still take new players.
    pub fn check_admission(&self, lobby_id: &Uuid) -> Result<(), LobbyError> {
        let lobby = self.lobbies.get(lobby_id).ok_or(LobbyError::UnknownLobby)?;
        if lobby.session().is_match_started() {
            return Err(LobbyError::AlreadyStarted);
        }
        Ok(())
    }

    pub fn connect(
        &mut self,
        lobby_id: &Uuid,
        player_id: PlayerId,
        peer_id: PeerId,
        channel: ObserverChannel,
    ) -> Result<(), LobbyError> {
        self.lobbies
            .get_mut(lobby_id)
            .ok_or(LobbyError::UnknownLobby)?
            .connect(player_id, peer_id, channel)
    }

    /// Removes `player_id` from the lobby roster. The session ends when the
    /// owner leaves or the roster empties; returns `true` if that happened.
    pub fn disconnect(&mut self, lobby_id: &Uuid, player_id: &str, peer_id: &PeerId) -> bool {
        let Some(lobby) = self.lobbies.get_mut(lobby_id) else {
            return false;
        };
        lobby.disconnect(player_id, peer_id);
        let session = lobby.session();
        if session.roster().is_empty() || session.owner() == player_id {
            if let Some(lobby) = self.lobbies.remove(lobby_id) {
                lobby.close();
            }
            info!(lobby_id = %lobby_id, player_id = %player_id, "lobby closed");
            return true;
        }
        false
    }

    pub fn start_match(
        &mut self,
        lobby_id: &Uuid,
        caller: &str,
        now: ServerTime,
    ) -> Result<LobbyView, LobbyError> {
        let lobby = self
            .lobbies
            .get_mut(lobby_id)
            .ok_or(LobbyError::UnknownLobby)?;
        lobby.start_match(caller, now)?;
        Ok(lobby.view())
    }

    pub fn use_ability(&self, lobby_id: &Uuid, player_id: &str) -> Result<Role, LobbyError> {
        self.lobbies
            .get(lobby_id)
            .ok_or(LobbyError::UnknownLobby)?
            .session()
            .use_ability(player_id)
    }

    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }
}

#[derive(Default, Debug, Clone)]
pub struct ServerState {
    pub lobby_manager: Arc<RwLock<LobbyManager>>,
    pub players_in_lobbies: StateObj<HashMap<PlayerId, Uuid>>,
    pub waiting_players: StateObj<HashMap<SocketAddr, PlayerId>>,
    pub peers_to_players: StateObj<HashMap<PeerId, PlayerId>>,
    pub challenge_manager: ChallengeManager,
    pub clock: ServerClock,
}

impl SignalingState for ServerState {}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ServerState {
    pub fn lobbies(&self) -> RwLockReadGuard<'_, LobbyManager> {
        self.lobby_manager
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lobbies_mut(&self) -> RwLockWriteGuard<'_, LobbyManager> {
        self.lobby_manager
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_lobby(&self, owner: PlayerId, is_private: bool) -> LobbySummary {
        let summary = self.lobbies_mut().create_lobby(owner.clone(), is_private);
        lock(&self.players_in_lobbies).insert(owner, summary.id);
        summary
    }

    /// Lets `player_id` open a connection to `lobby_id`.
    pub fn admit(&self, lobby_id: Uuid, player_id: PlayerId) -> Result<(), LobbyError> {
        self.lobbies().check_admission(&lobby_id)?;
        info!(lobby_id = %lobby_id, player_id = %player_id, "player admitted");
        lock(&self.players_in_lobbies).insert(player_id, lobby_id);
        Ok(())
    }

    pub fn admitted_lobby(&self, player_id: &str) -> Option<Uuid> {
        lock(&self.players_in_lobbies).get(player_id).copied()
    }

    pub fn start_match(&self, lobby_id: &Uuid, caller: &str) -> Result<LobbyView, LobbyError> {
        let now = self.clock.now();
        self.lobbies_mut().start_match(lobby_id, caller, now)
    }

    /// Tears down everything a closed connection left behind.
    pub fn release(&self, lobby_id: &Uuid, player_id: &str, peer_id: &PeerId) {
        lock(&self.peers_to_players).remove(peer_id);
        let closed = self.lobbies_mut().disconnect(lobby_id, player_id, peer_id);

        let mut players_in_lobbies = lock(&self.players_in_lobbies);
        if closed {
            players_in_lobbies.retain(|_, admitted| *admitted != *lobby_id);
        } else if players_in_lobbies.get(player_id) == Some(lobby_id) {
            players_in_lobbies.remove(player_id);
        }
    }
}
