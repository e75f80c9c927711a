use axum::{extract::State, routing::get, Json, Router};
use tracing::{instrument, warn};

use super::services;
use crate::{
    auth::{extractors::AuthUser, repo_types::User},
    error::AuthError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(get_me))
}

#[instrument(skip(state, _caller))]
pub async fn list_users(
    State(state): State<AppState>,
    _caller: AuthUser,
) -> Result<Json<Vec<User>>, AuthError> {
    Ok(Json(services::all_users(&state).await?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<User>, AuthError> {
    let user = services::current_user(&state, user_id).await?.ok_or_else(|| {
        warn!(%user_id, "token subject no longer exists");
        AuthError::UnknownSubject
    })?;
    Ok(Json(user))
}
