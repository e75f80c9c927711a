use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest, VerifyRequest},
        password::{hash_password, verify_password},
        repo_types::{NewUser, User},
    },
    error::AuthError,
    mail::verification_email,
    state::AppState,
};

/// Exactly one `@` with a non-empty, whitespace-free local part and domain.
pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Uniform six-digit code in `[100000, 999999]`.
pub fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

fn code_expiry(state: &AppState, now: OffsetDateTime) -> OffsetDateTime {
    now + Duration::minutes(state.config.verification_ttl_minutes)
}

/// Sends the verification email. Delivery failures are logged, never returned.
async fn send_verification_email(state: &AppState, user: &User) {
    let Some(code) = user.verification_code.as_deref() else {
        return;
    };
    let (subject, body) = verification_email(&user.username, code);
    if let Err(e) = state.mailer.send(&user.email, subject, &body).await {
        error!(error = %e, user_id = %user.id, email = %user.email, "verification email failed");
    }
}

pub async fn register(state: &AppState, req: RegisterRequest) -> Result<User, AuthError> {
    register_at(state, req, OffsetDateTime::now_utc()).await
}

#[instrument(skip(state, req), fields(username = %req.username))]
pub async fn register_at(
    state: &AppState,
    req: RegisterRequest,
    now: OffsetDateTime,
) -> Result<User, AuthError> {
    let email = normalize_email(&req.email);
    let username = req.username.trim().to_string();

    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AuthError::InvalidInput("email".into()));
    }
    if username.is_empty() {
        return Err(AuthError::InvalidInput("username must not be empty".into()));
    }
    if req.password.is_empty() {
        return Err(AuthError::InvalidInput("password must not be empty".into()));
    }

    let password_hash = hash_password(&req.password).await?;
    let user = state
        .users
        .create(NewUser {
            email,
            username,
            password_hash,
            verification_code: generate_verification_code(),
            verification_code_expires_at: code_expiry(state, now),
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    send_verification_email(state, &user).await;
    Ok(user)
}

#[instrument(skip(state, req), fields(username = %req.username))]
pub async fn login(state: &AppState, req: LoginRequest) -> Result<User, AuthError> {
    let user = state
        .users
        .find_by_username(req.username.trim())
        .await?
        .ok_or_else(|| {
            warn!("login unknown username");
            AuthError::NotFound
        })?;

    if !user.enabled {
        warn!(user_id = %user.id, "login before verification");
        return Err(AuthError::AccountDisabled);
    }

    if !verify_password(&req.password, &user.password_hash).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

pub async fn verify_user(state: &AppState, req: VerifyRequest) -> Result<(), AuthError> {
    verify_user_at(state, req, OffsetDateTime::now_utc()).await
}

#[instrument(skip(state, req))]
pub async fn verify_user_at(
    state: &AppState,
    req: VerifyRequest,
    now: OffsetDateTime,
) -> Result<(), AuthError> {
    let email = normalize_email(&req.email);
    let mut user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::NotFound)?;

    let (Some(code), Some(expires_at)) = (
        user.verification_code.as_deref(),
        user.verification_code_expires_at,
    ) else {
        return Err(AuthError::CodeMissing);
    };
    if now >= expires_at {
        return Err(AuthError::Expired);
    }
    if code != req.verification_code {
        warn!(user_id = %user.id, "incorrect verification code");
        return Err(AuthError::IncorrectCode);
    }

    user.enabled = true;
    user.verification_code = None;
    user.verification_code_expires_at = None;
    state.users.save(&user).await?;
    info!(user_id = %user.id, "account verified");
    Ok(())
}

pub async fn resend_verification_code(state: &AppState, email: &str) -> Result<(), AuthError> {
    resend_verification_code_at(state, email, OffsetDateTime::now_utc()).await
}

#[instrument(skip(state))]
pub async fn resend_verification_code_at(
    state: &AppState,
    email: &str,
    now: OffsetDateTime,
) -> Result<(), AuthError> {
    let mut user = state
        .users
        .find_by_email(&normalize_email(email))
        .await?
        .ok_or(AuthError::NotFound)?;

    if user.enabled {
        return Err(AuthError::AlreadyVerified);
    }

    user.verification_code = Some(generate_verification_code());
    user.verification_code_expires_at = Some(code_expiry(state, now));
    let user = state.users.save(&user).await?;
    info!(user_id = %user.id, "verification code regenerated");
    send_verification_email(state, &user).await;
    Ok(())
}
