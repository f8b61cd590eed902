use ring::{
    digest,
    rand::{SecureRandom, SystemRandom},
};
use thiserror::Error;

const TOKEN_BYTES: usize = 32;

#[derive(Error, Debug)]
pub enum AccessTokenError {
    #[error("Failed to generate random token")]
    RandomFailed,
}

/// Generates a new access token (64 hex characters)
pub fn generate() -> Result<String, AccessTokenError> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; TOKEN_BYTES];
    rng.fill(&mut bytes)
        .map_err(|_| AccessTokenError::RandomFailed)?;

    Ok(hex::encode(bytes))
}

/// SHA-256 of the token; only the hash is stored
pub fn hash(token: &str) -> Vec<u8> {
    digest::digest(&digest::SHA256, token.trim().as_bytes())
        .as_ref()
        .to_vec()
}

pub fn verify(token: &str, stored_hash: &[u8]) -> bool {
    hash(token).as_slice() == stored_hash
}
