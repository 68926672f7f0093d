use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signature, VerifyingKey};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// How long an issued lobby token stays valid.
pub const TOKEN_LIFETIME_HOURS: i64 = 24;

#[derive(Clone)]
pub struct AuthSecret(pub String);

/// JWT claims carried by every authenticated lobby request.
///
/// `sub` is the player's base64 ed25519 public key and doubles as the
/// participant id inside a lobby roster.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: usize,
}

pub fn verify_signature(
    public_key_b64: &str,
    message: &str,
    signature_b64: &str,
) -> Result<bool, anyhow::Error> {
    let public_key_bytes = general_purpose::STANDARD.decode(public_key_b64)?;
    let signature_bytes = general_purpose::STANDARD.decode(signature_b64)?;

    let public_key = VerifyingKey::from_bytes(
        &public_key_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("public key must be 32 bytes"))?,
    )?;
    let signature = Signature::from_bytes(
        &signature_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("signature must be 64 bytes"))?,
    );

    Ok(public_key
        .verify_strict(message.as_bytes(), &signature)
        .is_ok())
}

pub fn issue_jwt(
    public_key_b64: String,
    username: String,
    secret: &AuthSecret,
) -> Result<String, AuthError> {
    let expiration = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::hours(TOKEN_LIFETIME_HOURS))
        .ok_or(AuthError::Expiry)?
        .timestamp();

    let claims = Claims {
        sub: public_key_b64,
        username,
        exp: expiration as usize,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.0.as_ref()),
    )?)
}

/// Validates `token` and returns its claims.
pub fn decode_jwt(token: &str, secret: &AuthSecret) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.0.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidToken)
}

#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    AuthSecret: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let secret = AuthSecret::from_ref(state);
        let bearer_token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AuthError::MissingToken)?;

        decode_jwt(bearer_token, &secret)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("token expiry out of range")]
    Expiry,
    #[error("failed to encode token: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingToken | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Expiry | AuthError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
