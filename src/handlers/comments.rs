//! Comment CRUD and per-post threaded listing.

use axum::extract::{Path, Query, State};

use crate::error::ApiError;
use crate::handlers::parse_id;
use crate::middleware::auth::AuthUser;
use crate::middleware::response::{ApiResponse, ApiResult};
use crate::models::{CommentThread, CommentView};
use crate::pagination::PageQuery;
use crate::policy::{self, Action};
use crate::routes::AppState;
use crate::validate::{CreateCommentRequest, UpdateCommentRequest, ValidJson};

const DEFAULT_PAGE_SIZE: i64 = 20;

/// GET /api/comments/post/:postId - top-level comments newest first, each
/// with its replies oldest first. A post with no comments and a nonexistent
/// post both list as empty.
pub async fn list_for_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Vec<CommentThread>> {
    let post_id = parse_id(&post_id)?;
    let page = query.normalize(DEFAULT_PAGE_SIZE);

    let (threads, total) = state.store.comments_for_post(post_id, page).await?;
    Ok(ApiResponse::paginated(threads, page.info(total)))
}

/// POST /api/comments - the referenced post must exist (404 otherwise).
pub async fn create(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ValidJson(body): ValidJson<CreateCommentRequest>,
) -> ApiResult<CommentView> {
    let new_comment = body.into_new_comment()?;

    if state.store.post_record(new_comment.post_id).await?.is_none() {
        return Err(ApiError::not_found("Post"));
    }

    let comment = state.store.create_comment(auth_user.id, new_comment).await?;
    Ok(ApiResponse::created(comment, "Comment created successfully"))
}

/// PUT /api/comments/:id
pub async fn update(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<UpdateCommentRequest>,
) -> ApiResult<CommentView> {
    let id = parse_id(&id)?;
    let comment = state
        .store
        .comment_record(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;
    policy::authorize_comment(auth_user.id, &comment, Action::Update)?;

    let updated = state.store.update_comment(id, &body.into_content()?).await?;
    Ok(ApiResponse::with_message(updated, "Comment updated successfully"))
}

/// DELETE /api/comments/:id
pub async fn delete(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let id = parse_id(&id)?;
    let comment = state
        .store
        .comment_record(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment"))?;
    policy::authorize_comment(auth_user.id, &comment, Action::Delete)?;

    state.store.delete_comment(id).await?;
    Ok(ApiResponse::with_message((), "Comment deleted successfully"))
}
