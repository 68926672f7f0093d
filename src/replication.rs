use crate::{
    roster::{Participant, ParticipantId},
    session::{RosterChange, ServerTime},
};
use axum::extract::ws::{close_code, CloseFrame, Message};
use matchbox_protocol::PeerId;
use matchbox_signaling::common_logic;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, warn};

pub type ObserverChannel = UnboundedSender<Result<Message, axum::Error>>;

/// Server to client notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LobbyEvent {
    Snapshot {
        roster: Vec<Participant>,
        started_at: Option<ServerTime>,
    },
    ParticipantAdded(Participant),
    ParticipantRemoved(ParticipantId),
    ParticipantUpdated(Participant),
    MatchStarted {
        started_at: ServerTime,
    },
    Rejected {
        reason: String,
    },
    LobbyClosed,
}

impl From<RosterChange> for LobbyEvent {
    fn from(change: RosterChange) -> Self {
        match change {
            RosterChange::Added(participant) => LobbyEvent::ParticipantAdded(participant),
            RosterChange::Removed(id) => LobbyEvent::ParticipantRemoved(id),
            RosterChange::Updated(participant) => LobbyEvent::ParticipantUpdated(participant),
            RosterChange::MatchStarted { started_at } => LobbyEvent::MatchStarted { started_at },
        }
    }
}

impl fmt::Display for LobbyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Client to server commands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LobbyRequest {
    StartMatch,
    UseAbility,
    KeepAlive,
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("websocket error: {0}")]
    Axum(#[from] axum::Error),
    #[error("connection closed")]
    Close,
    #[error("malformed request: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported message type")]
    UnsupportedType,
}

/// Decodes one websocket frame. Ping and pong frames decode to `None`.
pub fn parse_request(
    request: Result<Message, axum::Error>,
) -> Result<Option<LobbyRequest>, RequestError> {
    match request? {
        Message::Text(text) => Ok(Some(serde_json::from_str(&text)?)),
        Message::Ping(_) | Message::Pong(_) => Ok(None),
        Message::Close(_) => Err(RequestError::Close),
        Message::Binary(_) => Err(RequestError::UnsupportedType),
    }
}

/// Frame that ends a connection whose lobby is gone or refused it.
pub fn close_message(reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: reason.into(),
    }))
}

/// Registered watchers of a single lobby.
#[derive(Debug, Default)]
pub struct Observers {
    channels: HashMap<PeerId, ObserverChannel>,
}

impl Observers {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers `channel` and hands it the current state.
    pub fn register(&mut self, peer_id: PeerId, channel: ObserverChannel, snapshot: LobbyEvent) {
        self.channels.insert(peer_id, channel);
        self.send_to(peer_id, &snapshot);
    }

    pub fn deregister(&mut self, peer_id: &PeerId) -> bool {
        self.channels.remove(peer_id).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn send_to(&self, peer_id: PeerId, event: &LobbyEvent) {
        match self.channels.get(&peer_id) {
            Some(channel) => {
                if let Err(e) = common_logic::try_send(channel, Message::Text(event.to_string())) {
                    error!("error sending to {peer_id:?}: {e:?}");
                }
            }
            None => warn!("no observer registered for {peer_id:?}"),
        }
    }

    /// Pushes each change to every observer. Delivery is not awaited.
    pub fn broadcast(&self, changes: Vec<RosterChange>) {
        for change in changes {
            self.send_all(&LobbyEvent::from(change));
        }
    }

    pub fn send_all(&self, event: &LobbyEvent) {
        self.send_raw(Message::Text(event.to_string()));
    }

    /// Sends a final `event` and closes every observer's connection.
    pub fn close_all(self, event: &LobbyEvent, reason: &'static str) {
        self.send_all(event);
        self.send_raw(close_message(reason));
    }

    fn send_raw(&self, message: Message) {
        for (peer_id, channel) in &self.channels {
            if let Err(e) = common_logic::try_send(channel, message.clone()) {
                error!("error sending to {peer_id:?}: {e:?}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
    use uuid::Uuid;

    fn observer() -> (PeerId, ObserverChannel, UnboundedReceiver<Result<Message, axum::Error>>) {
        let (tx, rx) = unbounded_channel();
        (PeerId(Uuid::new_v4()), tx, rx)
    }

    fn next_event(rx: &mut UnboundedReceiver<Result<Message, axum::Error>>) -> LobbyEvent {
        match rx.try_recv().unwrap().unwrap() {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("unexpected message {other:?}"),
        }
    }

    fn empty_snapshot() -> LobbyEvent {
        LobbyEvent::Snapshot {
            roster: Vec::new(),
            started_at: None,
        }
    }

    #[test]
    fn new_observer_receives_snapshot_first() {
        let mut observers = Observers::new();
        let (peer, tx, mut rx) = observer();
        observers.register(peer, tx, empty_snapshot());

        assert_eq!(next_event(&mut rx), empty_snapshot());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn broadcast_reaches_every_observer_in_order() {
        let mut observers = Observers::new();
        let (peer_a, tx_a, mut rx_a) = observer();
        let (peer_b, tx_b, mut rx_b) = observer();
        observers.register(peer_a, tx_a, empty_snapshot());
        observers.register(peer_b, tx_b, empty_snapshot());
        next_event(&mut rx_a);
        next_event(&mut rx_b);

        let killer = Participant {
            id: "a".to_string(),
            role: Some(Role::Killer),
        };
        observers.broadcast(vec![
            RosterChange::MatchStarted {
                started_at: ServerTime(7),
            },
            RosterChange::Updated(killer.clone()),
        ]);

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(
                next_event(rx),
                LobbyEvent::MatchStarted {
                    started_at: ServerTime(7)
                }
            );
            assert_eq!(next_event(rx), LobbyEvent::ParticipantUpdated(killer.clone()));
        }
    }

    #[test]
    fn deregistered_observer_hears_nothing() {
        let mut observers = Observers::new();
        let (peer, tx, mut rx) = observer();
        observers.register(peer, tx, empty_snapshot());
        next_event(&mut rx);

        assert!(observers.deregister(&peer));
        observers.broadcast(vec![RosterChange::Removed("a".to_string())]);
        assert!(rx.try_recv().is_err());
        assert!(observers.is_empty());
    }

    #[test]
    fn closed_channel_does_not_break_broadcast() {
        let mut observers = Observers::new();
        let (peer_a, tx_a, rx_a) = observer();
        let (peer_b, tx_b, mut rx_b) = observer();
        observers.register(peer_a, tx_a, empty_snapshot());
        observers.register(peer_b, tx_b, empty_snapshot());
        drop(rx_a);
        next_event(&mut rx_b);

        observers.broadcast(vec![RosterChange::Removed("x".to_string())]);
        assert_eq!(
            next_event(&mut rx_b),
            LobbyEvent::ParticipantRemoved("x".to_string())
        );
    }

    #[test]
    fn close_all_ends_every_connection() {
        let mut observers = Observers::new();
        let (peer, tx, mut rx) = observer();
        observers.register(peer, tx, empty_snapshot());
        next_event(&mut rx);

        observers.close_all(&LobbyEvent::LobbyClosed, "lobby closed");
        assert_eq!(next_event(&mut rx), LobbyEvent::LobbyClosed);
        match rx.try_recv().unwrap().unwrap() {
            Message::Close(Some(frame)) => assert_eq!(frame.reason, "lobby closed"),
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[test]
    fn parses_commands() {
        let request = parse_request(Ok(Message::Text("\"StartMatch\"".to_string()))).unwrap();
        assert_eq!(request, Some(LobbyRequest::StartMatch));
        assert!(parse_request(Ok(Message::Ping(Vec::new()))).unwrap().is_none());
        assert!(matches!(
            parse_request(Ok(Message::Text("{".to_string()))),
            Err(RequestError::Json(_))
        ));
        assert!(matches!(
            parse_request(Ok(Message::Close(None))),
            Err(RequestError::Close)
        ));
    }
}
