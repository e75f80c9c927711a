//! Argon2 credential hashing. Both operations are CPU-bound and run on the
//! blocking pool so request workers stay free.

use anyhow::Context;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tokio::task;

use crate::error::AuthError;

fn argon_err(stage: &'static str) -> impl FnOnce(password_hash::Error) -> AuthError {
    move |e| AuthError::Internal(anyhow::anyhow!("argon2 {stage}: {e}"))
}

/// Hashes a plaintext password into a PHC string with a fresh salt.
pub async fn hash_password(plain: &str) -> Result<String, AuthError> {
    let plain = plain.to_owned();
    task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(argon_err("hash"))
    })
    .await
    .context("password hashing task")?
}

/// `Ok(false)` on mismatch; an unparseable stored hash is an internal error.
pub async fn verify_password(plain: &str, stored_hash: &str) -> Result<bool, AuthError> {
    let plain = plain.to_owned();
    let stored_hash = stored_hash.to_owned();
    task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash).map_err(argon_err("parse stored hash"))?;
        match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(argon_err("verify")(e)),
        }
    })
    .await
    .context("password verification task")?
}
