//! Client-side login helpers, used by tooling and the integration tests.
use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("argon2 error: {0}")]
    Argon2(String),
    #[error("failed to extract hash")]
    HashExtraction,
    #[error("b64 encode error")]
    Base64,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("derived key too short")]
    KeyLength,
}

/// Derives a player's ed25519 key from their credentials. The salt is taken
/// from the username hash so the same credentials always give the same key.
pub fn signing_key(username: &str, password: &str) -> Result<SigningKey, HelperError> {
    let username_hash = Sha256::digest(username.as_bytes());
    let salt = SaltString::encode_b64(&username_hash[..16]).map_err(|_| HelperError::Base64)?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| HelperError::Argon2(e.to_string()))?;
    let hash_value = hash.hash.ok_or(HelperError::HashExtraction)?;
    let seed: [u8; 32] = hash_value
        .as_bytes()
        .get(..32)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(HelperError::KeyLength)?;
    Ok(SigningKey::from_bytes(&seed))
}

pub fn get_public_key(username: &str, password: &str) -> Result<String, HelperError> {
    let key = signing_key(username, password)?;
    Ok(general_purpose::STANDARD.encode(key.verifying_key().as_bytes()))
}

/// Signs `challenge` and builds the body expected by `POST /auth/login`.
pub fn generate_login_payload(
    username: &str,
    password: &str,
    challenge: &str,
) -> Result<String, HelperError> {
    let key = signing_key(username, password)?;
    let signature = key.sign(challenge.as_bytes());
    let login_payload = json!({
        "public_key_b64": general_purpose::STANDARD.encode(key.verifying_key().as_bytes()),
        "username": username,
        "challenge": challenge,
        "signature_b64": general_purpose::STANDARD.encode(signature.to_bytes()),
    });
    Ok(serde_json::to_string(&login_payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_signature;
    use serde_json::Value;

    #[test]
    fn payload_signature_verifies() {
        let payload = generate_login_payload("alice", "hunter2", "abc").unwrap();
        let payload: Value = serde_json::from_str(&payload).unwrap();

        let valid = verify_signature(
            payload["public_key_b64"].as_str().unwrap(),
            "abc",
            payload["signature_b64"].as_str().unwrap(),
        )
        .unwrap();
        assert!(valid);
        assert_eq!(
            payload["public_key_b64"].as_str().unwrap(),
            get_public_key("alice", "hunter2").unwrap()
        );
    }
}
