use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        current_user,
        jwt::AuthUser,
        policy::{authorize, authorize_object, Policy},
    },
    catalog::repo::Title,
    error::ApiError,
    reviews::{
        dto::{
            CommentCreateRequest, CommentPatchRequest, CommentResponse, Pagination,
            ReviewCreateRequest, ReviewPatchRequest, ReviewResponse,
        },
        repo::{Comment, Review},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/titles/:title_id/reviews/",
            get(list_reviews).post(create_review),
        )
        .route(
            "/titles/:title_id/reviews/:review_id/",
            get(get_review).patch(patch_review).delete(delete_review),
        )
        .route(
            "/titles/:title_id/reviews/:review_id/comments/",
            get(list_comments).post(create_comment),
        )
        .route(
            "/titles/:title_id/reviews/:review_id/comments/:comment_id/",
            get(get_comment).patch(patch_comment).delete(delete_comment),
        )
}

fn validate_score(score: i32) -> Result<(), ApiError> {
    if !(1..=10).contains(&score) {
        return Err(ApiError::validation("score", "score must be between 1 and 10"));
    }
    Ok(())
}

async fn require_title(state: &AppState, title_id: Uuid) -> Result<(), ApiError> {
    if !Title::exists(&state.db, title_id).await? {
        return Err(ApiError::NotFound("title"));
    }
    Ok(())
}

// --- reviews ---

#[instrument(skip(state))]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(title_id): Path<Uuid>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<ReviewResponse>>, ApiError> {
    require_title(&state, title_id).await?;
    let rows = Review::list_by_title(&state.db, title_id, p.limit(), p.offset()).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn get_review(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let row = Review::get(&state.db, title_id, review_id)
        .await?
        .ok_or(ApiError::NotFound("review"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
pub async fn create_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(title_id): Path<Uuid>,
    Json(payload): Json<ReviewCreateRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), ApiError> {
    let caller = current_user(&state, auth).await?;
    authorize(&[Policy::IsRedactor], &Method::POST, Some(&caller))?;

    require_title(&state, title_id).await?;
    validate_score(payload.score)?;
    if Review::exists_for_author(&state.db, title_id, caller.id).await? {
        return Err(ApiError::validation(
            "title",
            "you have already reviewed this title",
        ));
    }

    let row = Review::create(&state.db, title_id, caller.id, &payload.text, payload.score).await?;
    info!(review_id = %row.id, %title_id, "review created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state, payload))]
pub async fn patch_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ReviewPatchRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let caller = current_user(&state, auth).await?;
    let row = Review::get(&state.db, title_id, review_id)
        .await?
        .ok_or(ApiError::NotFound("review"))?;
    authorize_object(
        &[Policy::IsRedactor],
        &Method::PATCH,
        Some(&caller),
        Some(row.author_id),
    )?;

    if let Some(score) = payload.score {
        validate_score(score)?;
    }
    Review::update(&state.db, review_id, payload.text.as_deref(), payload.score).await?;

    let row = Review::get(&state.db, title_id, review_id)
        .await?
        .ok_or(ApiError::NotFound("review"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
pub async fn delete_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let caller = current_user(&state, auth).await?;
    let row = Review::get(&state.db, title_id, review_id)
        .await?
        .ok_or(ApiError::NotFound("review"))?;
    authorize_object(
        &[Policy::IsRedactor],
        &Method::DELETE,
        Some(&caller),
        Some(row.author_id),
    )?;

    Review::delete(&state.db, review_id).await?;
    info!(%review_id, "review deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- comments ---

async fn require_review(
    state: &AppState,
    title_id: Uuid,
    review_id: Uuid,
) -> Result<(), ApiError> {
    Review::get(&state.db, title_id, review_id)
        .await?
        .ok_or(ApiError::NotFound("review"))?;
    Ok(())
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<CommentResponse>>, ApiError> {
    require_review(&state, title_id, review_id).await?;
    let rows = Comment::list_by_review(&state.db, review_id, p.limit(), p.offset()).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state))]
pub async fn get_comment(
    State(state): State<AppState>,
    Path((title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<CommentResponse>, ApiError> {
    require_review(&state, title_id, review_id).await?;
    let row = Comment::get(&state.db, review_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound("comment"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((title_id, review_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CommentCreateRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let caller = current_user(&state, auth).await?;
    authorize(&[Policy::IsRedactor], &Method::POST, Some(&caller))?;

    require_review(&state, title_id, review_id).await?;
    let row = Comment::create(&state.db, review_id, caller.id, &payload.text).await?;
    info!(comment_id = %row.id, %review_id, "comment created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state, payload))]
pub async fn patch_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(payload): Json<CommentPatchRequest>,
) -> Result<Json<CommentResponse>, ApiError> {
    let caller = current_user(&state, auth).await?;
    require_review(&state, title_id, review_id).await?;
    let row = Comment::get(&state.db, review_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound("comment"))?;
    authorize_object(
        &[Policy::IsRedactor],
        &Method::PATCH,
        Some(&caller),
        Some(row.author_id),
    )?;

    if let Some(text) = payload.text.as_deref() {
        Comment::update(&state.db, comment_id, text).await?;
    }
    let row = Comment::get(&state.db, review_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound("comment"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((title_id, review_id, comment_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let caller = current_user(&state, auth).await?;
    require_review(&state, title_id, review_id).await?;
    let row = Comment::get(&state.db, review_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound("comment"))?;
    authorize_object(
        &[Policy::IsRedactor],
        &Method::DELETE,
        Some(&caller),
        Some(row.author_id),
    )?;

    Comment::delete(&state.db, comment_id).await?;
    info!(%comment_id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
