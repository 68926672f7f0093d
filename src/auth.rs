use crate::{state::lock, AppState};
use axum::{extract::State, http::StatusCode, Json};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub use lobby_auth::{decode_jwt, issue_jwt, verify_signature, AuthError, AuthSecret, Claims};

pub const CHALLENGE_EXPIRATION: Duration = Duration::from_secs(60);
const CHALLENGE_LENGTH: usize = 32;

/// Outstanding login challenges. Each one can be redeemed once, within
/// [`CHALLENGE_EXPIRATION`].
#[derive(Debug, Clone, Default)]
pub struct ChallengeManager {
    challenges: Arc<Mutex<HashMap<String, Instant>>>,
}

impl ChallengeManager {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        lock(&self.challenges)
            .retain(|_, issued| now.duration_since(*issued) < CHALLENGE_EXPIRATION);
    }

    pub fn generate_challenge(&self) -> String {
        self.cleanup_expired();
        let challenge: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CHALLENGE_LENGTH)
            .map(char::from)
            .collect();
        lock(&self.challenges).insert(challenge.clone(), Instant::now());
        challenge
    }

    pub fn verify_challenge(&self, challenge: &str) -> bool {
        match lock(&self.challenges).remove(challenge) {
            Some(issued) => issued.elapsed() < CHALLENGE_EXPIRATION,
            None => false,
        }
    }
}

#[derive(Serialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

pub async fn challenge_handler(State(state): State<AppState>) -> Json<ChallengeResponse> {
    let challenge = state.state.challenge_manager.generate_challenge();
    Json(ChallengeResponse { challenge })
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub public_key_b64: String,
    pub username: String,
    pub challenge: String,
    pub signature_b64: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
}

pub async fn login_handler(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, &'static str)> {
    if !state
        .state
        .challenge_manager
        .verify_challenge(&payload.challenge)
    {
        return Err((StatusCode::UNAUTHORIZED, "Invalid challenge"));
    }

    let signature_valid = verify_signature(
        &payload.public_key_b64,
        &payload.challenge,
        &payload.signature_b64,
    )
    .unwrap_or(false);
    if !signature_valid {
        warn!(username = %payload.username, "rejected login with bad signature");
        return Err((StatusCode::UNAUTHORIZED, "Invalid signature"));
    }

    let token = issue_jwt(payload.public_key_b64, payload.username.clone(), &state.secret)
        .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Failed to issue token"))?;
    info!(username = %payload.username, "player logged in");
    Ok(Json(LoginResponse { token }))
}
