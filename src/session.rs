use crate::{
    error::LobbyError,
    role::Role,
    roster::{Participant, ParticipantId, Roster},
};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Instant};
use tracing::{debug, info};

/// Milliseconds on the server's monotonic clock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ServerTime(pub u64);

/// The authoritative match clock. Every match start is stamped from here,
/// never from a client.
#[derive(Debug, Clone, Copy)]
pub struct ServerClock {
    started: Instant,
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn now(&self) -> ServerTime {
        ServerTime(u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX))
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LobbyStatus {
    Lobby,
    InProgress,
}

/// A single observable state change produced by a session mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterChange {
    Added(Participant),
    Removed(ParticipantId),
    Updated(Participant),
    MatchStarted { started_at: ServerTime },
}

/// Authoritative roster and match state for one lobby.
///
/// The session must have exactly one owner task or lock holder: every
/// mutating call assumes it is serialized with respect to the others.
pub struct LobbySession {
    owner: ParticipantId,
    roster: Roster,
    started_at: Option<ServerTime>,
    rng: Box<dyn RngCore + Send + Sync>,
}

impl fmt::Debug for LobbySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobbySession")
            .field("owner", &self.owner)
            .field("roster", &self.roster)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

impl LobbySession {
    pub fn new(owner: ParticipantId) -> Self {
        Self::with_rng(owner, StdRng::from_entropy())
    }

    /// Builds a session drawing role assignments from `rng`. Seed it to make
    /// assignment reproducible.
    pub fn with_rng(owner: ParticipantId, rng: impl RngCore + Send + Sync + 'static) -> Self {
        Self {
            owner,
            roster: Roster::new(),
            started_at: None,
            rng: Box::new(rng),
        }
    }

    pub fn owner(&self) -> &ParticipantId {
        &self.owner
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn started_at(&self) -> Option<ServerTime> {
        self.started_at
    }

    pub fn is_match_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn status(&self) -> LobbyStatus {
        if self.is_match_started() {
            LobbyStatus::InProgress
        } else {
            LobbyStatus::Lobby
        }
    }

    /// Appends `id` to the roster. Membership is frozen once the match runs.
    pub fn connect(&mut self, id: ParticipantId) -> Result<Vec<RosterChange>, LobbyError> {
        if self.is_match_started() {
            return Err(LobbyError::AlreadyStarted);
        }
        let added = self.roster.insert(id)?.clone();
        debug!(player_id = %added.id, roster_size = self.roster.len(), "participant connected");
        Ok(vec![RosterChange::Added(added)])
    }

    /// Drops `id` and whatever role it held. Unknown ids produce no changes.
    pub fn disconnect(&mut self, id: &str) -> Vec<RosterChange> {
        match self.roster.remove(id) {
            Some(removed) => {
                debug!(player_id = %removed.id, role = ?removed.role, "participant disconnected");
                vec![RosterChange::Removed(removed.id)]
            }
            None => Vec::new(),
        }
    }

    pub fn start_match(
        &mut self,
        caller: &str,
        now: ServerTime,
    ) -> Result<Vec<RosterChange>, LobbyError> {
        if caller != self.owner {
            return Err(LobbyError::Unauthorized);
        }
        if self.is_match_started() {
            return Err(LobbyError::AlreadyStarted);
        }
        if self.roster.is_empty() {
            return Err(LobbyError::EmptyRoster);
        }

        self.started_at = Some(now);
        let mut changes = vec![RosterChange::MatchStarted { started_at: now }];
        changes.extend(self.assign_roles());
        Ok(changes)
    }

    /// Triggers the ability of the role `id` was dealt.
    pub fn use_ability(&self, id: &str) -> Result<Role, LobbyError> {
        let role = self
            .roster
            .get(id)
            .and_then(|participant| participant.role)
            .ok_or(LobbyError::NotStarted)?;
        role.use_ability(id);
        Ok(role)
    }

    /// One participant, drawn uniformly, becomes the killer. Everyone else is
    /// a civilian.
    fn assign_roles(&mut self) -> Vec<RosterChange> {
        let killer_index = self.rng.gen_range(0..self.roster.len());

        let changes = self
            .roster
            .iter_mut()
            .enumerate()
            .map(|(index, participant)| {
                participant.role = Some(if index == killer_index {
                    Role::Killer
                } else {
                    Role::Civilian
                });
                RosterChange::Updated(participant.clone())
            })
            .collect();

        info!(
            roster_size = self.roster.len(),
            killer_index, "roles assigned"
        );
        changes
    }
}
