use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        code::generate_code,
        dto::{SignupRequest, SignupResponse, TokenRequest, TokenResponse},
        jwt::JwtKeys,
    },
    error::ApiError,
    state::AppState,
    users::repo::User,
    validate::{validate_email, validate_username},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup/", post(signup))
        .route("/auth/token/", post(token))
}

/// Registration flow: validate, upsert keyed by (username, email), derive a
/// code from the fresh `updated_at` nonce and dispatch it by email.
/// Idempotent: repeating the same pair updates the nonce and re-sends.
#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<SignupResponse>, ApiError> {
    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_lowercase();

    validate_username(&username)?;
    validate_email(&email)?;

    if state.config.is_banned(&username) {
        warn!(%username, "banned username rejected");
        return Err(ApiError::validation(
            "username",
            format!("username {username} is reserved"),
        ));
    }

    if let Some(holder) = User::find_by_email(&state.db, &email).await? {
        if holder.username != username {
            return Err(ApiError::validation(
                "email",
                format!("email {email} is taken by another user"),
            ));
        }
    }

    let (user, created) = match User::find_by_username(&state.db, &username).await? {
        Some(existing) if existing.email != email => {
            return Err(ApiError::validation(
                "email",
                format!("user {username} has a different email"),
            ));
        }
        Some(existing) => (User::touch(&state.db, existing.id).await?, false),
        None => (User::create(&state.db, &username, &email).await?, true),
    };

    let code = generate_code(
        &user.username,
        &user.email,
        user.updated_at,
        &state.config.secret_key,
    )?;

    // Fire-and-forget: a delivery failure is logged, never rolled back
    // against the user record.
    if let Err(e) = state
        .mailer
        .send(
            &user.email,
            "Registration confirmation",
            &format!("Confirmation code: {code}"),
        )
        .await
    {
        error!(error = %e, email = %user.email, "confirmation email failed");
    }

    info!(username = %user.username, created, "signup processed");
    Ok(Json(SignupResponse {
        username: user.username,
        email: user.email,
    }))
}

/// Confirmation flow: recompute the expected code and, on match, rotate the
/// `updated_at` nonce and issue the session credential. The rotation is a
/// conditional update guarded on the nonce the code was derived from, so two
/// racing confirmations cannot both succeed and a replayed code always fails.
#[instrument(skip(state, payload))]
pub async fn token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = User::find_by_username(&state.db, payload.username.trim())
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let expected = generate_code(
        &user.username,
        &user.email,
        user.updated_at,
        &state.config.secret_key,
    )?;

    if payload.confirmation_code != expected {
        warn!(username = %user.username, "invalid confirmation code");
        return Err(ApiError::validation("confirmation_code", "invalid code"));
    }

    let user = User::rotate_if_unchanged(&state.db, user.id, user.updated_at)
        .await?
        .ok_or_else(|| {
            // Lost the race against a concurrent confirmation; the code was
            // already burned.
            warn!(username = %payload.username, "confirmation raced, code already used");
            ApiError::validation("confirmation_code", "invalid code")
        })?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(username = %user.username, "registration confirmed");
    Ok(Json(TokenResponse { token }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::MockMailer;
    use sqlx::PgPool;
    use std::sync::Arc;

    fn state_with_mock(db: PgPool) -> (AppState, MockMailer) {
        let fixture = AppState::fake();
        let mailer = MockMailer::new();
        let state = AppState::from_parts(db, fixture.config.clone(), Arc::new(mailer.clone()));
        (state, mailer)
    }

    fn last_code(mailer: &MockMailer) -> String {
        let sent = mailer.sent();
        let (_, _, body) = sent.last().expect("confirmation email sent");
        body.rsplit(' ').next().expect("code in body").to_string()
    }

    async fn do_signup(
        state: &AppState,
        username: &str,
        email: &str,
    ) -> Result<Json<SignupResponse>, ApiError> {
        signup(
            State(state.clone()),
            Json(SignupRequest {
                username: username.into(),
                email: email.into(),
            }),
        )
        .await
    }

    async fn do_token(state: &AppState, username: &str, code: &str) -> Result<Json<TokenResponse>, ApiError> {
        token(
            State(state.clone()),
            Json(TokenRequest {
                username: username.into(),
                confirmation_code: code.into(),
            }),
        )
        .await
    }

    #[sqlx::test]
    async fn repeated_signup_reuses_user_and_starts_new_code_family(db: PgPool) {
        let (state, mailer) = state_with_mock(db.clone());

        do_signup(&state, "neo", "neo@matrix.io").await.expect("first signup");
        let first_code = last_code(&mailer);

        do_signup(&state, "neo", "neo@matrix.io").await.expect("second signup");
        let second_code = last_code(&mailer);

        assert_eq!(mailer.sent().len(), 2);
        assert_ne!(first_code, second_code, "nonce rotation must retire the old code");

        let user = User::find_by_username(&db, "neo")
            .await
            .expect("query")
            .expect("user row");
        assert_eq!(user.email, "neo@matrix.io");
    }

    #[sqlx::test]
    async fn signup_rejects_email_held_by_another_user(db: PgPool) {
        let (state, _mailer) = state_with_mock(db);

        do_signup(&state, "neo", "neo@matrix.io").await.expect("signup");
        let err = do_signup(&state, "trinity", "neo@matrix.io")
            .await
            .expect_err("email collision");
        assert!(matches!(err, ApiError::Validation { field: "email", .. }));
    }

    #[sqlx::test]
    async fn signup_rejects_known_username_with_different_email(db: PgPool) {
        let (state, _mailer) = state_with_mock(db);

        do_signup(&state, "neo", "neo@matrix.io").await.expect("signup");
        let err = do_signup(&state, "neo", "smith@matrix.io")
            .await
            .expect_err("identity mismatch");
        assert!(matches!(err, ApiError::Validation { field: "email", .. }));
    }

    #[sqlx::test]
    async fn confirmation_code_is_single_use(db: PgPool) {
        let (state, mailer) = state_with_mock(db);

        do_signup(&state, "neo", "neo@matrix.io").await.expect("signup");
        let code = last_code(&mailer);

        let Json(issued) = do_token(&state, "neo", &code).await.expect("first confirmation");
        assert!(!issued.token.is_empty());

        let err = do_token(&state, "neo", &code).await.expect_err("replayed code");
        assert!(matches!(
            err,
            ApiError::Validation { field: "confirmation_code", .. }
        ));
    }

    #[sqlx::test]
    async fn token_for_unknown_username_is_not_found(db: PgPool) {
        let (state, _mailer) = state_with_mock(db);
        let err = do_token(&state, "nobody", "123456").await.expect_err("no such user");
        assert!(matches!(err, ApiError::NotFound("user")));
    }
}
