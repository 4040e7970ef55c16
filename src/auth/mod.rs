use axum::Router;

use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::User;

pub mod code;
mod dto;
pub mod handlers;
pub mod jwt;
pub mod policy;

pub fn router() -> Router<AppState> {
    handlers::router()
}

/// Loads the caller behind a verified token. A token whose user has since
/// been deleted is treated as unauthenticated.
pub async fn current_user(
    state: &AppState,
    jwt::AuthUser(user_id): jwt::AuthUser,
) -> Result<User, ApiError> {
    User::get(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("user for token not found".into()))
}
