//! Post CRUD. Mutations load the target first (404 wins), then apply the
//! ownership policy (author or admin), then write.

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::models::{PostDetail, PostSummary};
use crate::pagination::PageQuery;
use crate::policy::{self, Action};
use crate::routes::AppState;
use crate::validate::{CreatePostRequest, UpdatePostRequest, ValidJson};

const DEFAULT_PAGE_SIZE: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub published: Option<String>,
}

/// GET /api/posts - published by default; `?published=false` lists drafts.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> ApiResult<Vec<PostSummary>> {
    let published = !matches!(query.published.as_deref(), Some("false"));
    let page = PageQuery { page: query.page, limit: query.limit }.normalize(DEFAULT_PAGE_SIZE);

    let (posts, total) = state.store.list_posts(published, page).await?;
    Ok(ApiResponse::paginated(posts, page.info(total)))
}

/// GET /api/posts/:id
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PostDetail> {
    let id = parse_id(&id)?;
    let post = state
        .store
        .post_detail(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;
    Ok(ApiResponse::success(post))
}

/// POST /api/posts
pub async fn create(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ValidJson(body): ValidJson<CreatePostRequest>,
) -> ApiResult<PostSummary> {
    let new_post = body.into_new_post()?;
    let post = state.store.create_post(auth_user.id, new_post).await?;
    Ok(ApiResponse::created(post, "Post created successfully"))
}

/// PUT /api/posts/:id
pub async fn update(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdatePostRequest>,
) -> ApiResult<PostSummary> {
    let id = parse_id(&id)?;
    let post = state
        .store
        .post_record(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;

    let actor = state
        .store
        .user_by_id(auth_user.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;
    policy::authorize_post(&actor, &post, Action::Update)?;

    let updated = state.store.update_post(id, body.into_patch()).await?;
    Ok(ApiResponse::with_message(updated, "Post updated successfully"))
}

/// DELETE /api/posts/:id
pub async fn delete(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id)?;
    let post = state
        .store
        .post_record(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Post"))?;

    let actor = state
        .store
        .user_by_id(auth_user.id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid token"))?;
    policy::authorize_post(&actor, &post, Action::Delete)?;

    state.store.delete_post(id).await?;
    Ok(ApiResponse::with_message((), "Post deleted successfully"))
}
