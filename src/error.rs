use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Rejections produced by lobby commands. None of them are fatal to a
/// session; the command is refused and state is left untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LobbyError {
    #[error("participant is already connected")]
    DuplicateParticipant,
    #[error("cannot start a match with no participants")]
    EmptyRoster,
    #[error("match has already started")]
    AlreadyStarted,
    #[error("match has not started")]
    NotStarted,
    #[error("only the lobby owner may do that")]
    Unauthorized,
    #[error("lobby not found")]
    UnknownLobby,
}

impl IntoResponse for LobbyError {
    fn into_response(self) -> Response {
        let status = match self {
            LobbyError::DuplicateParticipant
            | LobbyError::EmptyRoster
            | LobbyError::AlreadyStarted
            | LobbyError::NotStarted => StatusCode::CONFLICT,
            LobbyError::Unauthorized => StatusCode::FORBIDDEN,
            LobbyError::UnknownLobby => StatusCode::NOT_FOUND,
        };
        let body = Json(json!({
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
