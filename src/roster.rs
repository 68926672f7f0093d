use crate::{error::LobbyError, role::Role};
use serde::{Deserialize, Serialize};

/// Authenticated player identity (the JWT subject).
pub type ParticipantId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub role: Option<Role>,
}

impl Participant {
    pub fn new(id: ParticipantId) -> Self {
        Self { id, role: None }
    }
}

/// Connected participants in arrival order. Ids are unique.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, id: ParticipantId) -> Result<&Participant, LobbyError> {
        if self.contains(&id) {
            return Err(LobbyError::DuplicateParticipant);
        }
        self.participants.push(Participant::new(id));
        Ok(&self.participants[self.participants.len() - 1])
    }

    pub fn remove(&mut self, id: &str) -> Option<Participant> {
        let index = self.participants.iter().position(|p| p.id == id)?;
        Some(self.participants.remove(index))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ParticipantId> {
        self.participants.iter().map(|p| &p.id)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Participant> {
        self.participants.iter_mut()
    }

    pub fn as_slice(&self) -> &[Participant] {
        &self.participants
    }
}
