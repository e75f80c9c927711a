use uuid::Uuid;

use crate::{auth::repo_types::User, error::AuthError, state::AppState};

pub async fn all_users(state: &AppState) -> Result<Vec<User>, AuthError> {
    Ok(state.users.list_all().await?)
}

/// Resolves the token subject to its stored record.
pub async fn current_user(state: &AppState, user_id: Uuid) -> Result<Option<User>, AuthError> {
    Ok(state.users.find_by_id(user_id).await?)
}
