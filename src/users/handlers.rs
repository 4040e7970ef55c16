use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        current_user,
        jwt::AuthUser,
        policy::{authorize, authorize_object, Policy},
    },
    error::ApiError,
    state::AppState,
    users::{
        dto::{
            AdminCreateRequest, AdminPatchRequest, MePatchRequest, ProfileResponse, UserListQuery,
        },
        repo::{NewUser, User, UserPatch},
    },
    validate::{validate_email, validate_username},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me/", get(get_me).patch(patch_me))
        .route("/users/", get(list_users).post(create_user))
        .route(
            "/users/:username/",
            get(get_user).patch(patch_user).delete(delete_user),
        )
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let caller = current_user(&state, auth).await?;
    authorize_object(&[Policy::Me], &Method::GET, Some(&caller), Some(caller.id))?;
    Ok(Json(caller.into()))
}

#[instrument(skip(state, payload))]
pub async fn patch_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<MePatchRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let caller = current_user(&state, auth).await?;
    authorize_object(&[Policy::Me], &Method::PATCH, Some(&caller), Some(caller.id))?;

    let patch = UserPatch {
        username: payload.username,
        email: payload.email.map(|e| e.trim().to_lowercase()),
        first_name: payload.first_name,
        last_name: payload.last_name,
        bio: payload.bio,
        role: None,
    };
    check_identity_patch(&state, &caller, patch.username.as_deref(), patch.email.as_deref())
        .await?;

    let updated = User::update(&state.db, caller.id, &patch).await?;
    Ok(Json(updated.into()))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<ProfileResponse>>, ApiError> {
    let caller = current_user(&state, auth).await?;
    authorize(&[Policy::IsAdmin], &Method::GET, Some(&caller))?;

    let users =
        User::list(&state.db, query.search.as_deref(), query.limit(), query.offset()).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<AdminCreateRequest>,
) -> Result<(StatusCode, Json<ProfileResponse>), ApiError> {
    let caller = current_user(&state, auth).await?;
    authorize(&[Policy::IsAdmin], &Method::POST, Some(&caller))?;

    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_lowercase();
    validate_username(&username)?;
    validate_email(&email)?;

    if User::find_by_username(&state.db, &username).await?.is_some() {
        return Err(ApiError::validation("username", "user already exists"));
    }
    if User::find_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::validation("email", "email already in use"));
    }

    let user = User::create_full(
        &state.db,
        &NewUser {
            username,
            email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            bio: payload.bio,
            role: payload.role,
        },
    )
    .await?;

    info!(username = %user.username, role = ?user.role, "user created by admin");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let caller = current_user(&state, auth).await?;
    authorize(&[Policy::IsAdmin], &Method::GET, Some(&caller))?;

    let user = User::find_by_username(&state.db, &username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn patch_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(username): Path<String>,
    Json(payload): Json<AdminPatchRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let caller = current_user(&state, auth).await?;
    authorize(&[Policy::IsAdmin], &Method::PATCH, Some(&caller))?;

    let target = User::find_by_username(&state.db, &username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let patch = UserPatch {
        username: payload.username,
        email: payload.email.map(|e| e.trim().to_lowercase()),
        first_name: payload.first_name,
        last_name: payload.last_name,
        bio: payload.bio,
        role: payload.role,
    };
    check_identity_patch(&state, &target, patch.username.as_deref(), patch.email.as_deref())
        .await?;

    let updated = User::update(&state.db, target.id, &patch).await?;
    Ok(Json(updated.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiError> {
    let caller = current_user(&state, auth).await?;
    authorize(&[Policy::IsAdmin], &Method::DELETE, Some(&caller))?;

    if !User::delete_by_username(&state.db, &username).await? {
        return Err(ApiError::NotFound("user"));
    }
    info!(%username, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Validates a username/email change and rejects values already bound to a
/// different user.
async fn check_identity_patch(
    state: &AppState,
    target: &User,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<(), ApiError> {
    if let Some(username) = username {
        validate_username(username)?;
        if username != target.username
            && User::find_by_username(&state.db, username).await?.is_some()
        {
            return Err(ApiError::validation("username", "user already exists"));
        }
    }
    if let Some(email) = email {
        validate_email(email)?;
        if let Some(holder) = User::find_by_email(&state.db, email).await? {
            if holder.id != target.id {
                return Err(ApiError::validation("email", "email already in use"));
            }
        }
    }
    Ok(())
}
