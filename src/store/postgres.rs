//! sqlx/PostgreSQL implementation of [`Store`]. SQLSTATE unique and
//! foreign-key violations are translated into the closed [`StoreError`]
//! taxonomy here; nothing downstream inspects driver codes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{
    AuthorInfo, Comment, CommentThread, CommentView, Counts, NewComment, NewPost, NewUser, Post,
    PostDetail, PostPatch, PostSummary, Tag, User,
};
use crate::pagination::Page;
use crate::store::{Store, StoreError};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect, then bring the schema up to date.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    async fn fetch_summary(&self, id: Uuid) -> Result<PostSummary, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "{POST_SELECT} WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        let tags = self.tags_for(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(row.into_summary(tags))
    }

    /// Tags for a set of posts, grouped by post id.
    async fn tags_for(
        &self,
        post_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Tag>>, StoreError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = sqlx::query_as::<_, TagRow>(
            "SELECT pt.post_id, t.id, t.name
             FROM post_tags pt
             JOIN tags t ON t.id = pt.tag_id
             WHERE pt.post_id = ANY($1)
             ORDER BY t.name",
        )
        .bind(post_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let mut grouped: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.post_id)
                .or_default()
                .push(Tag { id: row.id, name: row.name });
        }
        Ok(grouped)
    }

    async fn fetch_comment_view(&self, id: Uuid) -> Result<CommentView, StoreError> {
        sqlx::query_as::<_, CommentRow>(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map(CommentRow::into_view)
            .map_err(map_db_err)
    }
}

fn map_db_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => StoreError::Duplicate,
            Some(FOREIGN_KEY_VIOLATION) => StoreError::ForeignKey,
            _ => StoreError::Database(err),
        },
        _ => StoreError::Database(err),
    }
}

const POST_SELECT: &str = "SELECT p.id, p.author_id, p.title, p.slug, p.content, p.published,
       p.created_at, p.updated_at,
       u.username AS author_username, u.first_name AS author_first_name,
       u.last_name AS author_last_name, u.avatar AS author_avatar,
       (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
  FROM posts p
  JOIN users u ON u.id = p.author_id";

const COMMENT_SELECT: &str = "SELECT c.id, c.author_id, c.post_id, c.parent_id, c.content,
       c.created_at, c.updated_at,
       u.username AS author_username, u.first_name AS author_first_name,
       u.last_name AS author_last_name, u.avatar AS author_avatar
  FROM comments c
  JOIN users u ON u.id = c.author_id";

/// Post joined with its author and comment count.
#[derive(FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    title: String,
    slug: String,
    content: String,
    published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
    author_avatar: Option<String>,
    comment_count: i64,
}

impl PostRow {
    fn into_summary(self, tags: Vec<Tag>) -> PostSummary {
        PostSummary {
            id: self.id,
            author_id: self.author_id,
            title: self.title,
            slug: self.slug,
            content: self.content,
            published: self.published,
            author: AuthorInfo {
                id: self.author_id,
                username: self.author_username,
                first_name: self.author_first_name,
                last_name: self.author_last_name,
                avatar: self.author_avatar,
            },
            tags,
            counts: Counts { comments: self.comment_count },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TagRow {
    post_id: Uuid,
    id: Uuid,
    name: String,
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    author_id: Uuid,
    post_id: Uuid,
    parent_id: Option<Uuid>,
    content: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
    author_avatar: Option<String>,
}

impl CommentRow {
    fn into_view(self) -> CommentView {
        CommentView {
            id: self.id,
            author_id: self.author_id,
            post_id: self.post_id,
            parent_id: self.parent_id,
            content: self.content,
            author: AuthorInfo {
                id: self.author_id,
                username: self.author_username,
                first_name: self.author_first_name,
                last_name: self.author_last_name,
                avatar: self.author_avatar,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = $1 OR username = $2 LIMIT 1",
        )
        .bind(email)
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (email, username, first_name, last_name, avatar, password_hash)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(&new.email)
        .bind(&new.username)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.avatar)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)
    }

    async fn list_posts(
        &self,
        published: bool,
        page: Page,
    ) -> Result<(Vec<PostSummary>, i64), StoreError> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "{POST_SELECT}
             WHERE p.published = $1
             ORDER BY p.created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(published)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE published = $1")
                .bind(published)
                .fetch_one(&self.pool)
                .await
                .map_err(map_db_err)?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut tags = self.tags_for(&ids).await?;
        let posts = rows
            .into_iter()
            .map(|row| {
                let post_tags = tags.remove(&row.id).unwrap_or_default();
                row.into_summary(post_tags)
            })
            .collect();
        Ok((posts, total))
    }

    async fn post_record(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn post_detail(&self, id: Uuid) -> Result<Option<PostDetail>, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(&format!("{POST_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let comments = sqlx::query_as::<_, CommentRow>(&format!(
            "{COMMENT_SELECT}
             WHERE c.post_id = $1
             ORDER BY c.created_at DESC"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let tags = self.tags_for(&[id]).await?.remove(&id).unwrap_or_default();
        Ok(Some(PostDetail {
            post: row.into_summary(tags),
            comments: comments.into_iter().map(CommentRow::into_view).collect(),
        }))
    }

    async fn create_post(&self, author_id: Uuid, new: NewPost) -> Result<PostSummary, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO posts (author_id, title, slug, content, published)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(author_id)
        .bind(&new.title)
        .bind(&new.slug)
        .bind(&new.content)
        .bind(new.published)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        self.fetch_summary(id).await
    }

    async fn update_post(&self, id: Uuid, patch: PostPatch) -> Result<PostSummary, StoreError> {
        let result = sqlx::query(
            "UPDATE posts
             SET title = COALESCE($2, title),
                 content = COALESCE($3, content),
                 published = COALESCE($4, published),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.content)
        .bind(patch.published)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_summary(id).await
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), StoreError> {
        // Comments and tag links go with the post via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn comments_for_post(
        &self,
        post_id: Uuid,
        page: Page,
    ) -> Result<(Vec<CommentThread>, i64), StoreError> {
        let top_level = sqlx::query_as::<_, CommentRow>(&format!(
            "{COMMENT_SELECT}
             WHERE c.post_id = $1 AND c.parent_id IS NULL
             ORDER BY c.created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(post_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE post_id = $1 AND parent_id IS NULL",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        let parent_ids: Vec<Uuid> = top_level.iter().map(|c| c.id).collect();
        let mut replies_by_parent: HashMap<Uuid, Vec<CommentView>> = HashMap::new();
        if !parent_ids.is_empty() {
            let replies = sqlx::query_as::<_, CommentRow>(&format!(
                "{COMMENT_SELECT}
                 WHERE c.parent_id = ANY($1)
                 ORDER BY c.created_at ASC"
            ))
            .bind(&parent_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
            for reply in replies {
                if let Some(parent_id) = reply.parent_id {
                    replies_by_parent
                        .entry(parent_id)
                        .or_default()
                        .push(reply.into_view());
                }
            }
        }

        let threads = top_level
            .into_iter()
            .map(|row| {
                let replies = replies_by_parent.remove(&row.id).unwrap_or_default();
                CommentThread { comment: row.into_view(), replies }
            })
            .collect();
        Ok((threads, total))
    }

    async fn comment_record(&self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)
    }

    async fn create_comment(
        &self,
        author_id: Uuid,
        new: NewComment,
    ) -> Result<CommentView, StoreError> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO comments (author_id, post_id, parent_id, content)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(author_id)
        .bind(new.post_id)
        .bind(new.parent_id)
        .bind(&new.content)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        self.fetch_comment_view(id).await
    }

    async fn update_comment(&self, id: Uuid, content: &str) -> Result<CommentView, StoreError> {
        let result = sqlx::query(
            "UPDATE comments SET content = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(content)
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        self.fetch_comment_view(id).await
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
