pub mod args;
pub mod auth;
pub mod error;
pub mod helpers;
pub mod lobby;
pub mod replication;
pub mod role;
pub mod roster;
pub mod session;
pub mod state;
pub mod topology;

use crate::{
    args::Args,
    auth::{decode_jwt, AuthSecret, Claims},
    error::LobbyError,
    lobby::{LobbySummary, LobbyView},
    state::{lock, ServerState},
    topology::LobbyTopology,
};
use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use matchbox_signaling::SignalingServerBuilder;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::prelude::*;
use uuid::Uuid;

pub fn setup_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lobby_server=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(false)
                .with_target(false),
        )
        .init();
}

#[derive(Clone)]
pub struct AppState {
    pub state: ServerState,
    pub secret: AuthSecret,
}

impl FromRef<AppState> for AuthSecret {
    fn from_ref(input: &AppState) -> Self {
        input.secret.clone()
    }
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let secret = AuthSecret(args.jwt_secret);
    let state = ServerState::default();
    let app_router = app(AppState {
        state: state.clone(),
        secret: secret.clone(),
    });

    let server = SignalingServerBuilder::new(args.host, LobbyTopology, state.clone())
        .on_connection_request({
            let state = state.clone();
            move |connection| {
                let token = connection
                    .query_params
                    .get("token")
                    .ok_or_else(|| (StatusCode::UNAUTHORIZED, "Missing token").into_response())?;

                let claims = decode_jwt(token, &secret)
                    .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid token").into_response())?;

                if state.admitted_lobby(&claims.sub).is_none() {
                    return Err((StatusCode::FORBIDDEN, "Not admitted to a lobby").into_response());
                }

                lock(&state.waiting_players).insert(connection.origin, claims.sub);
                Ok(true)
            }
        })
        .on_id_assignment({
            let state = state.clone();
            move |(origin, peer_id)| {
                if let Some(player_id) = lock(&state.waiting_players).remove(&origin) {
                    lock(&state.peers_to_players).insert(peer_id, player_id);
                }
            }
        })
        .cors()
        .trace()
        .mutate_router(|router| router.merge(app_router))
        .build();

    info!("listening on {}", args.host);
    server
        .serve()
        .await
        .map_err(|e| anyhow::anyhow!("lobby server stopped: {e:?}"))
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/challenge", post(auth::challenge_handler))
        .route("/auth/login", post(auth::login_handler))
        .route(
            "/lobbies",
            post(create_lobby_handler).get(list_lobbies_handler),
        )
        .route("/lobbies/:lobby_id", get(get_lobby_handler))
        .route("/lobbies/:lobby_id/join", post(join_lobby_handler))
        .route("/lobbies/:lobby_id/start", post(start_match_handler))
        .with_state(state)
}

pub async fn health_handler() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Deserialize)]
pub struct CreateLobbyRequest {
    is_private: bool,
}

async fn create_lobby_handler(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<CreateLobbyRequest>,
) -> Json<LobbySummary> {
    Json(state.state.create_lobby(claims.sub, payload.is_private))
}

async fn list_lobbies_handler(State(state): State<AppState>) -> Json<Vec<LobbySummary>> {
    Json(state.state.lobbies().get_public_lobbies())
}

async fn get_lobby_handler(
    State(state): State<AppState>,
    Path(lobby_id): Path<Uuid>,
) -> Result<Json<LobbyView>, LobbyError> {
    state
        .state
        .lobbies()
        .view(&lobby_id)
        .map(Json)
        .ok_or(LobbyError::UnknownLobby)
}

async fn join_lobby_handler(
    State(state): State<AppState>,
    Path(lobby_id): Path<Uuid>,
    claims: Claims,
) -> Result<StatusCode, LobbyError> {
    state.state.admit(lobby_id, claims.sub)?;
    Ok(StatusCode::OK)
}

async fn start_match_handler(
    State(state): State<AppState>,
    Path(lobby_id): Path<Uuid>,
    claims: Claims,
) -> Result<Json<LobbyView>, LobbyError> {
    state.state.start_match(&lobby_id, &claims.sub).map(Json)
}
