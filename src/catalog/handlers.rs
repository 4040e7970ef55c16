use std::collections::HashMap;

use anyhow::Context;
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
        policy::{authorize, Policy},
    },
    catalog::{
        dto::{
            NamedSlug, SearchQuery, TitleCreateRequest, TitleListQuery, TitlePatchRequest,
            TitleResponse,
        },
        repo::{Category, Genre, NewTitle, Title, TitleFilter, TitlePatch, TitleRow},
    },
    error::ApiError,
    state::AppState,
    validate::validate_slug,
};

/// Public read, admin-only write, on every collection in this module.
const WRITE_POLICIES: [Policy; 2] = [Policy::ReadOnly, Policy::IsAdmin];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories/", get(list_categories).post(create_category))
        .route("/categories/:slug/", axum::routing::delete(delete_category))
        .route("/genres/", get(list_genres).post(create_genre))
        .route("/genres/:slug/", axum::routing::delete(delete_genre))
        .route("/titles/", get(list_titles).post(create_title))
        .route(
            "/titles/:title_id/",
            get(get_title).patch(patch_title).delete(delete_title),
        )
}

async fn admin_caller(state: &AppState, auth: AuthUser, method: Method) -> Result<(), ApiError> {
    let caller = current_user(state, auth).await?;
    authorize(&WRITE_POLICIES, &method, Some(&caller))
}

// --- categories / genres ---

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<NamedSlug>>, ApiError> {
    let rows =
        Category::list(&state.db, query.search.as_deref(), query.limit(), query.offset()).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<NamedSlug>,
) -> Result<(StatusCode, Json<NamedSlug>), ApiError> {
    admin_caller(&state, auth, Method::POST).await?;
    validate_slug(&payload.slug)?;
    if Category::find_by_slug(&state.db, &payload.slug).await?.is_some() {
        return Err(ApiError::validation("slug", "slug already in use"));
    }
    let row = Category::create(&state.db, &payload.name, &payload.slug).await?;
    info!(slug = %row.slug, "category created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    admin_caller(&state, auth, Method::DELETE).await?;
    if !Category::delete_by_slug(&state.db, &slug).await? {
        return Err(ApiError::NotFound("category"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_genres(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<NamedSlug>>, ApiError> {
    let rows =
        Genre::list(&state.db, query.search.as_deref(), query.limit(), query.offset()).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_genre(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<NamedSlug>,
) -> Result<(StatusCode, Json<NamedSlug>), ApiError> {
    admin_caller(&state, auth, Method::POST).await?;
    validate_slug(&payload.slug)?;
    if Genre::find_by_slug(&state.db, &payload.slug).await?.is_some() {
        return Err(ApiError::validation("slug", "slug already in use"));
    }
    let row = Genre::create(&state.db, &payload.name, &payload.slug).await?;
    info!(slug = %row.slug, "genre created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state))]
pub async fn delete_genre(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    admin_caller(&state, auth, Method::DELETE).await?;
    if !Genre::delete_by_slug(&state.db, &slug).await? {
        return Err(ApiError::NotFound("genre"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- titles ---

#[instrument(skip(state))]
pub async fn list_titles(
    State(state): State<AppState>,
    Query(query): Query<TitleListQuery>,
) -> Result<Json<Vec<TitleResponse>>, ApiError> {
    let (limit, offset) = (query.limit(), query.offset());
    let filter = TitleFilter {
        category: query.category,
        genre: query.genre,
        name: query.name,
        year: query.year,
    };
    let rows = Title::list(&state.db, &filter, limit, offset).await?;
    Ok(Json(hydrate_titles(&state, rows).await?))
}

#[instrument(skip(state))]
pub async fn get_title(
    State(state): State<AppState>,
    Path(title_id): Path<Uuid>,
) -> Result<Json<TitleResponse>, ApiError> {
    let row = Title::get(&state.db, title_id)
        .await?
        .ok_or(ApiError::NotFound("title"))?;
    Ok(Json(hydrate_title(&state, row).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_title(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<TitleCreateRequest>,
) -> Result<(StatusCode, Json<TitleResponse>), ApiError> {
    admin_caller(&state, auth, Method::POST).await?;

    let category = Category::find_by_slug(&state.db, &payload.category)
        .await?
        .ok_or_else(|| ApiError::validation("category", "unknown category slug"))?;
    let genre_ids = resolve_genres(&state, &payload.genre).await?;

    let id = Title::create(
        &state.db,
        &NewTitle {
            name: payload.name,
            year: payload.year,
            description: payload.description,
            category_id: category.id,
            genre_ids,
        },
    )
    .await?;

    let row = Title::get(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("title"))?;
    info!(%id, "title created");
    Ok((StatusCode::CREATED, Json(hydrate_title(&state, row).await?)))
}

#[instrument(skip(state, payload))]
pub async fn patch_title(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(title_id): Path<Uuid>,
    Json(payload): Json<TitlePatchRequest>,
) -> Result<Json<TitleResponse>, ApiError> {
    admin_caller(&state, auth, Method::PATCH).await?;

    let category_id = match payload.category {
        Some(slug) => Some(
            Category::find_by_slug(&state.db, &slug)
                .await?
                .ok_or_else(|| ApiError::validation("category", "unknown category slug"))?
                .id,
        ),
        None => None,
    };
    let genre_ids = match payload.genre {
        Some(slugs) => Some(resolve_genres(&state, &slugs).await?),
        None => None,
    };

    let patch = TitlePatch {
        name: payload.name,
        year: payload.year,
        description: payload.description,
        category_id,
        genre_ids,
    };
    if !Title::update(&state.db, title_id, &patch).await? {
        return Err(ApiError::NotFound("title"));
    }

    let row = Title::get(&state.db, title_id)
        .await?
        .ok_or(ApiError::NotFound("title"))?;
    Ok(Json(hydrate_title(&state, row).await?))
}

#[instrument(skip(state))]
pub async fn delete_title(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(title_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    admin_caller(&state, auth, Method::DELETE).await?;
    if !Title::delete(&state.db, title_id).await? {
        return Err(ApiError::NotFound("title"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn resolve_genres(state: &AppState, slugs: &[String]) -> Result<Vec<Uuid>, ApiError> {
    let genres = Genre::find_by_slugs(&state.db, slugs).await?;
    if genres.len() != slugs.len() {
        return Err(ApiError::validation("genre", "unknown genre slug"));
    }
    Ok(genres.into_iter().map(|g| g.id).collect())
}

async fn hydrate_title(state: &AppState, row: TitleRow) -> Result<TitleResponse, ApiError> {
    let mut titles = hydrate_titles(state, vec![row]).await?;
    Ok(titles.pop().context("hydrated title missing")?)
}

/// Attaches genre lists to title rows, preserving row order.
async fn hydrate_titles(
    state: &AppState,
    rows: Vec<TitleRow>,
) -> Result<Vec<TitleResponse>, ApiError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut by_title: HashMap<Uuid, Vec<NamedSlug>> = HashMap::new();
    for g in Title::genres_for(&state.db, &ids).await? {
        by_title.entry(g.title_id).or_default().push(NamedSlug {
            name: g.name,
            slug: g.slug,
        });
    }
    Ok(rows
        .into_iter()
        .map(|r| TitleResponse {
            genre: by_title.remove(&r.id).unwrap_or_default(),
            category: match (r.category_name, r.category_slug) {
                (Some(name), Some(slug)) => Some(NamedSlug { name, slug }),
                _ => None,
            },
            id: r.id,
            name: r.name,
            year: r.year,
            rating: r.rating,
            description: r.description,
        })
        .collect())
}
