//! In-process [`Store`] backend over plain maps. Serves as the development
//! fallback when no `DATABASE_URL` is configured and as the hermetic
//! backend for integration tests. Mirrors the SQL schema's behavior,
//! including the delete cascade from posts to comments.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    AuthorInfo, Comment, CommentThread, CommentView, Counts, NewComment, NewPost, NewUser, Post,
    PostDetail, PostPatch, PostSummary, Tag, User,
};
use crate::pagination::Page;
use crate::store::{Store, StoreError};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    posts: HashMap<Uuid, Post>,
    comments: HashMap<Uuid, Comment>,
    tags: HashMap<Uuid, Vec<Tag>>,
    /// Insertion order, used as a tiebreak for equal timestamps.
    arrival: HashMap<Uuid, u64>,
    next_seq: u64,
}

impl Inner {
    fn record_arrival(&mut self, id: Uuid) {
        self.arrival.insert(id, self.next_seq);
        self.next_seq += 1;
    }

    fn seq(&self, id: Uuid) -> u64 {
        self.arrival.get(&id).copied().unwrap_or(0)
    }

    fn author_of(&self, author_id: Uuid) -> Result<AuthorInfo, StoreError> {
        self.users
            .get(&author_id)
            .map(AuthorInfo::from)
            .ok_or(StoreError::NotFound)
    }

    fn comment_count(&self, post_id: Uuid) -> i64 {
        self.comments.values().filter(|c| c.post_id == post_id).count() as i64
    }

    fn summarize(&self, post: &Post) -> Result<PostSummary, StoreError> {
        Ok(PostSummary {
            id: post.id,
            author_id: post.author_id,
            title: post.title.clone(),
            slug: post.slug.clone(),
            content: post.content.clone(),
            published: post.published,
            author: self.author_of(post.author_id)?,
            tags: self.tags.get(&post.id).cloned().unwrap_or_default(),
            counts: Counts { comments: self.comment_count(post.id) },
            created_at: post.created_at,
            updated_at: post.updated_at,
        })
    }

    fn view_of(&self, comment: &Comment) -> Result<CommentView, StoreError> {
        Ok(CommentView {
            id: comment.id,
            author_id: comment.author_id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            content: comment.content.clone(),
            author: self.author_of(comment.author_id)?,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Flip an account's active flag. Account lifecycle belongs to an
    /// external admin surface; this hook exists for tests and local dev.
    pub fn set_user_active(&self, id: Uuid, is_active: bool) -> Result<(), StoreError> {
        let mut inner = self.write();
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.is_active = is_active;
        Ok(())
    }

    /// Grant or revoke the admin flag; same external-surface caveat as
    /// [`Self::set_user_active`].
    pub fn set_user_admin(&self, id: Uuid, is_admin: bool) -> Result<(), StoreError> {
        let mut inner = self.write();
        let user = inner.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.is_admin = is_admin;
        Ok(())
    }

    /// Attach a tag to a post (tag management has no HTTP surface).
    pub fn tag_post(&self, post_id: Uuid, name: &str) -> Result<(), StoreError> {
        let mut inner = self.write();
        if !inner.posts.contains_key(&post_id) {
            return Err(StoreError::ForeignKey);
        }
        inner
            .tags
            .entry(post_id)
            .or_default()
            .push(Tag { id: Uuid::new_v4(), name: name.to_string() });
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read().users.values().find(|u| u.email == email).cloned())
    }

    async fn user_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.email == email || u.username == username)
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.write();
        // Unique-index backstop, same as the SQL schema
        if inner
            .users
            .values()
            .any(|u| u.email == new.email || u.username == new.username)
        {
            return Err(StoreError::Duplicate);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            username: new.username,
            first_name: new.first_name,
            last_name: new.last_name,
            avatar: new.avatar,
            bio: None,
            password_hash: new.password_hash,
            is_admin: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.record_arrival(user.id);
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_posts(
        &self,
        published: bool,
        page: Page,
    ) -> Result<(Vec<PostSummary>, i64), StoreError> {
        let inner = self.read();
        let mut posts: Vec<&Post> = inner
            .posts
            .values()
            .filter(|p| p.published == published)
            .collect();
        posts.sort_by(|a, b| {
            (b.created_at, inner.seq(b.id)).cmp(&(a.created_at, inner.seq(a.id)))
        });

        let total = posts.len() as i64;
        let page_posts = posts
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|p| inner.summarize(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((page_posts, total))
    }

    async fn post_record(&self, id: Uuid) -> Result<Option<Post>, StoreError> {
        Ok(self.read().posts.get(&id).cloned())
    }

    async fn post_detail(&self, id: Uuid) -> Result<Option<PostDetail>, StoreError> {
        let inner = self.read();
        let post = match inner.posts.get(&id) {
            Some(post) => post,
            None => return Ok(None),
        };

        let mut comments: Vec<&Comment> =
            inner.comments.values().filter(|c| c.post_id == id).collect();
        comments.sort_by(|a, b| {
            (b.created_at, inner.seq(b.id)).cmp(&(a.created_at, inner.seq(a.id)))
        });
        let comments = comments
            .into_iter()
            .map(|c| inner.view_of(c))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(PostDetail { post: inner.summarize(post)?, comments }))
    }

    async fn create_post(&self, author_id: Uuid, new: NewPost) -> Result<PostSummary, StoreError> {
        let mut inner = self.write();
        if !inner.users.contains_key(&author_id) {
            return Err(StoreError::ForeignKey);
        }

        let now = Utc::now();
        let post = Post {
            id: Uuid::new_v4(),
            author_id,
            title: new.title,
            slug: new.slug,
            content: new.content,
            published: new.published,
            created_at: now,
            updated_at: now,
        };
        inner.record_arrival(post.id);
        inner.posts.insert(post.id, post.clone());
        inner.summarize(&post)
    }

    async fn update_post(&self, id: Uuid, patch: PostPatch) -> Result<PostSummary, StoreError> {
        let mut inner = self.write();
        let post = inner.posts.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(title) = patch.title {
            post.title = title;
        }
        if let Some(content) = patch.content {
            post.content = content;
        }
        if let Some(published) = patch.published {
            post.published = published;
        }
        post.updated_at = Utc::now();
        let post = post.clone();
        inner.summarize(&post)
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.write();
        if inner.posts.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        // ON DELETE CASCADE
        inner.comments.retain(|_, c| c.post_id != id);
        inner.tags.remove(&id);
        Ok(())
    }

    async fn comments_for_post(
        &self,
        post_id: Uuid,
        page: Page,
    ) -> Result<(Vec<CommentThread>, i64), StoreError> {
        let inner = self.read();

        let mut top_level: Vec<&Comment> = inner
            .comments
            .values()
            .filter(|c| c.post_id == post_id && c.parent_id.is_none())
            .collect();
        // Newest first at the top level
        top_level.sort_by(|a, b| {
            (b.created_at, inner.seq(b.id)).cmp(&(a.created_at, inner.seq(a.id)))
        });

        let total = top_level.len() as i64;
        let mut threads = Vec::new();
        for comment in top_level
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
        {
            let mut replies: Vec<&Comment> = inner
                .comments
                .values()
                .filter(|c| c.parent_id == Some(comment.id))
                .collect();
            // Oldest first within a thread
            replies.sort_by(|a, b| {
                (a.created_at, inner.seq(a.id)).cmp(&(b.created_at, inner.seq(b.id)))
            });
            threads.push(CommentThread {
                comment: inner.view_of(comment)?,
                replies: replies
                    .into_iter()
                    .map(|c| inner.view_of(c))
                    .collect::<Result<Vec<_>, _>>()?,
            });
        }
        Ok((threads, total))
    }

    async fn comment_record(&self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        Ok(self.read().comments.get(&id).cloned())
    }

    async fn create_comment(
        &self,
        author_id: Uuid,
        new: NewComment,
    ) -> Result<CommentView, StoreError> {
        let mut inner = self.write();
        if !inner.users.contains_key(&author_id) || !inner.posts.contains_key(&new.post_id) {
            return Err(StoreError::ForeignKey);
        }
        if let Some(parent_id) = new.parent_id {
            if !inner.comments.contains_key(&parent_id) {
                return Err(StoreError::ForeignKey);
            }
        }

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            author_id,
            post_id: new.post_id,
            parent_id: new.parent_id,
            content: new.content,
            created_at: now,
            updated_at: now,
        };
        inner.record_arrival(comment.id);
        inner.comments.insert(comment.id, comment.clone());
        inner.view_of(&comment)
    }

    async fn update_comment(&self, id: Uuid, content: &str) -> Result<CommentView, StoreError> {
        let mut inner = self.write();
        let comment = inner.comments.get_mut(&id).ok_or(StoreError::NotFound)?;
        comment.content = content.to_string();
        comment.updated_at = Utc::now();
        let comment = comment.clone();
        inner.view_of(&comment)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.write();
        if inner.comments.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        // Replies to a removed top-level comment go with it
        inner.comments.retain(|_, c| c.parent_id != Some(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::PageQuery;

    fn new_user(tag: &str) -> NewUser {
        NewUser {
            email: format!("{tag}@example.com"),
            username: tag.to_string(),
            first_name: "Test".into(),
            last_name: "User".into(),
            avatar: None,
            password_hash: "hash".into(),
        }
    }

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.to_string(),
            slug: crate::models::slugify(title),
            content: "content".into(),
            published: true,
        }
    }

    fn page(limit: i64) -> Page {
        PageQuery::default().normalize(limit)
    }

    #[tokio::test]
    async fn duplicate_email_or_username_is_rejected() {
        let store = MemoryStore::new();
        store.create_user(new_user("alice")).await.expect("first");

        let mut dup_email = new_user("bob");
        dup_email.email = "alice@example.com".into();
        assert!(matches!(
            store.create_user(dup_email).await,
            Err(StoreError::Duplicate)
        ));

        let mut dup_name = new_user("carol");
        dup_name.username = "alice".into();
        assert!(matches!(
            store.create_user(dup_name).await,
            Err(StoreError::Duplicate)
        ));
    }

    #[tokio::test]
    async fn posts_list_newest_first_and_filters_published() {
        let store = MemoryStore::new();
        let author = store.create_user(new_user("author")).await.expect("user");

        store.create_post(author.id, new_post("First")).await.expect("post");
        store.create_post(author.id, new_post("Second")).await.expect("post");
        let mut draft = new_post("Draft");
        draft.published = false;
        store.create_post(author.id, draft).await.expect("post");

        let (posts, total) = store.list_posts(true, page(10)).await.expect("list");
        assert_eq!(total, 2);
        assert_eq!(posts[0].title, "Second");
        assert_eq!(posts[1].title, "First");

        let (drafts, total) = store.list_posts(false, page(10)).await.expect("list");
        assert_eq!(total, 1);
        assert_eq!(drafts[0].title, "Draft");
    }

    #[tokio::test]
    async fn comment_requires_existing_post() {
        let store = MemoryStore::new();
        let author = store.create_user(new_user("author")).await.expect("user");
        let result = store
            .create_comment(
                author.id,
                NewComment { post_id: Uuid::new_v4(), parent_id: None, content: "hi".into() },
            )
            .await;
        assert!(matches!(result, Err(StoreError::ForeignKey)));
    }

    #[tokio::test]
    async fn threads_order_top_level_desc_replies_asc() {
        let store = MemoryStore::new();
        let author = store.create_user(new_user("author")).await.expect("user");
        let post = store.create_post(author.id, new_post("Post")).await.expect("post");

        let first = store
            .create_comment(
                author.id,
                NewComment { post_id: post.id, parent_id: None, content: "first".into() },
            )
            .await
            .expect("comment");
        let _second = store
            .create_comment(
                author.id,
                NewComment { post_id: post.id, parent_id: None, content: "second".into() },
            )
            .await
            .expect("comment");
        for content in ["reply one", "reply two"] {
            store
                .create_comment(
                    author.id,
                    NewComment {
                        post_id: post.id,
                        parent_id: Some(first.id),
                        content: content.into(),
                    },
                )
                .await
                .expect("reply");
        }

        let (threads, total) = store.comments_for_post(post.id, page(20)).await.expect("list");
        // Replies are nested, not top-level entries
        assert_eq!(total, 2);
        assert_eq!(threads[0].comment.content, "second");
        assert_eq!(threads[1].comment.content, "first");
        assert_eq!(threads[1].replies[0].content, "reply one");
        assert_eq!(threads[1].replies[1].content, "reply two");
    }

    #[tokio::test]
    async fn deleting_a_post_cascades_to_comments() {
        let store = MemoryStore::new();
        let author = store.create_user(new_user("author")).await.expect("user");
        let post = store.create_post(author.id, new_post("Post")).await.expect("post");
        let comment = store
            .create_comment(
                author.id,
                NewComment { post_id: post.id, parent_id: None, content: "hi".into() },
            )
            .await
            .expect("comment");

        store.delete_post(post.id).await.expect("delete");
        assert!(store.comment_record(comment.id).await.expect("lookup").is_none());
        assert!(store.post_record(post.id).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn update_missing_post_is_not_found() {
        let store = MemoryStore::new();
        let result = store.update_post(Uuid::new_v4(), PostPatch::default()).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }
}
