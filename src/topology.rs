use crate::replication::{
    close_message, parse_request, LobbyEvent, LobbyRequest, ObserverChannel, RequestError,
};
use crate::state::{lock, ServerState};
use async_trait::async_trait;
use axum::extract::ws::Message;
use futures::StreamExt;
use matchbox_signaling::{common_logic, NoCallbacks, SignalingTopology, WsStateMeta};
use tracing::{error, info, warn};

/// One websocket per participant: the socket opening is the connect event and
/// the socket closing is the disconnect event.
#[derive(Debug, Default)]
pub struct LobbyTopology;

fn reject(sender: &ObserverChannel, reason: String) {
    let event = LobbyEvent::Rejected { reason };
    if let Err(e) = common_logic::try_send(sender, Message::Text(event.to_string())) {
        error!("error sending rejection: {e:?}");
    }
}

fn refuse(sender: &ObserverChannel, reason: String) {
    reject(sender, reason);
    if let Err(e) = common_logic::try_send(sender, close_message("connection refused")) {
        error!("error closing refused connection: {e:?}");
    }
}

#[async_trait]
impl SignalingTopology<NoCallbacks, ServerState> for LobbyTopology {
    async fn state_machine(upgrade: WsStateMeta<NoCallbacks, ServerState>) {
        let WsStateMeta {
            peer_id,
            sender,
            mut receiver,
            state,
            ..
        } = upgrade;

        let Some(player_id) = lock(&state.peers_to_players).get(&peer_id).cloned() else {
            error!(peer_id = ?peer_id, "no player id found for peer");
            return;
        };

        let Some(lobby_id) = state.admitted_lobby(&player_id) else {
            error!(player_id = %player_id, "player is not admitted to any lobby");
            refuse(&sender, "not admitted to a lobby".to_string());
            lock(&state.peers_to_players).remove(&peer_id);
            return;
        };

        let connected = state
            .lobbies_mut()
            .connect(&lobby_id, player_id.clone(), peer_id, sender.clone());
        if let Err(e) = connected {
            warn!(lobby_id = %lobby_id, player_id = %player_id, "connection refused: {e}");
            refuse(&sender, e.to_string());
            lock(&state.peers_to_players).remove(&peer_id);
            return;
        }
        info!(lobby_id = %lobby_id, player_id = %player_id, peer_id = ?peer_id, "participant joined");

        while let Some(request) = receiver.next().await {
            let request = match parse_request(request) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => match e {
                    RequestError::Axum(_) => {
                        warn!("Unrecoverable error with {peer_id:?}: {e:?}");
                        break;
                    }
                    RequestError::Close => {
                        info!("Connection closed by {peer_id:?}");
                        break;
                    }
                    RequestError::Json(_) | RequestError::UnsupportedType => {
                        error!("Error with request: {e:?}");
                        reject(&sender, e.to_string());
                        continue;
                    }
                },
            };

            match request {
                LobbyRequest::StartMatch => {
                    if let Err(e) = state.start_match(&lobby_id, &player_id) {
                        warn!(lobby_id = %lobby_id, player_id = %player_id, "start refused: {e}");
                        reject(&sender, e.to_string());
                    }
                }
                LobbyRequest::UseAbility => {
                    let used = state.lobbies().use_ability(&lobby_id, &player_id);
                    if let Err(e) = used {
                        reject(&sender, e.to_string());
                    }
                }
                LobbyRequest::KeepAlive => {}
            }

            let lobby_open = state.lobbies().contains(&lobby_id);
            if !lobby_open {
                info!(lobby_id = %lobby_id, "lobby closed, dropping {peer_id:?}");
                break;
            }
        }

        info!(lobby_id = %lobby_id, player_id = %player_id, "Removing peer: {peer_id:?}");
        state.release(&lobby_id, &player_id, &peer_id);
    }
}
