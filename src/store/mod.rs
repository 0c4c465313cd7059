pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Comment, CommentThread, CommentView, NewComment, NewPost, NewUser, Post, PostDetail,
    PostPatch, PostSummary, User,
};
use crate::pagination::Page;

/// Closed persistence error taxonomy. Handlers and the response layer match
/// on these variants; raw driver errors never cross this boundary untagged.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value for a unique field")]
    Duplicate,
    #[error("referenced record does not exist")]
    ForeignKey,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Data-access seam. Injected as `Arc<dyn Store>` through router state so
/// handlers never touch a global client and tests can substitute
/// [`memory::MemoryStore`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Liveness probe backing the /health endpoint.
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    // Users
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError>;
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError>;

    // Posts
    async fn list_posts(
        &self,
        published: bool,
        page: Page,
    ) -> Result<(Vec<PostSummary>, i64), StoreError>;
    /// Bare post row, used for existence and ownership checks.
    async fn post_record(&self, id: Uuid) -> Result<Option<Post>, StoreError>;
    /// Post with author, tags, counts, and nested comments (newest first).
    async fn post_detail(&self, id: Uuid) -> Result<Option<PostDetail>, StoreError>;
    async fn create_post(&self, author_id: Uuid, new: NewPost) -> Result<PostSummary, StoreError>;
    async fn update_post(&self, id: Uuid, patch: PostPatch) -> Result<PostSummary, StoreError>;
    async fn delete_post(&self, id: Uuid) -> Result<(), StoreError>;

    // Comments
    /// Top-level comments for a post, newest first, with replies oldest
    /// first; total counts top-level comments only.
    async fn comments_for_post(
        &self,
        post_id: Uuid,
        page: Page,
    ) -> Result<(Vec<CommentThread>, i64), StoreError>;
    async fn comment_record(&self, id: Uuid) -> Result<Option<Comment>, StoreError>;
    async fn create_comment(
        &self,
        author_id: Uuid,
        new: NewComment,
    ) -> Result<CommentView, StoreError>;
    async fn update_comment(&self, id: Uuid, content: &str) -> Result<CommentView, StoreError>;
    async fn delete_comment(&self, id: Uuid) -> Result<(), StoreError>;
}
