use super::{PostQuery, RepoError, RepoResult, Repository};
use crate::feed::{SortBy, SortOrder, StatusConstraint};
use crate::models::{
    Category, Comment, Like, NewPost, NewUser, Post, PostStatus, UpdatePostRequest, UpdateProfileRequest, User,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Store {
    users: BTreeMap<i64, User>,
    categories: BTreeMap<i64, Category>,
    posts: BTreeMap<i64, Post>,
    likes: HashSet<Like>,
    comments: BTreeMap<i64, Comment>,
    next_id: i64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing clock so creation order is always observable in sorts.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn likes_of(&self, post_id: i64) -> i64 {
        self.likes.iter().filter(|l| l.post_id == post_id).count() as i64
    }

    fn counted(&self, post: &Post) -> Post {
        Post {
            likes_count: self.likes_of(post.id),
            ..post.clone()
        }
    }

    fn matches(&self, post: &Post, query: &PostQuery) -> bool {
        if let StatusConstraint::Only(status) = query.status {
            if post.status != status {
                return false;
            }
        }
        if query.category_id.is_some_and(|id| post.category_id != id) {
            return false;
        }
        if query.user_id.is_some_and(|id| post.user_id != id) {
            return false;
        }
        if let Some(user_id) = query.liked_by {
            if !self.likes.contains(&Like { post_id: post.id, user_id }) {
                return false;
            }
        }
        if let Some(search) = &query.search {
            let needle = search.to_lowercase();
            let in_title = post.title.to_lowercase().contains(&needle);
            let in_description = post
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_title && !in_description {
                return false;
            }
        }
        true
    }
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. It enforces the same uniqueness,
/// foreign-key and cascade rules as the Postgres schema, which makes it usable for
/// service and router tests without a database.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
    unavailable: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every call fails with a retryable `RepoError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> RepoResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::Unavailable("in-memory store marked unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        self.check_available()?;
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        self.check_available()?;
        let mut store = self.store.write().await;
        if store.users.values().any(|u| u.username == user.username) {
            return Err(RepoError::UniqueViolation(format!("username {}", user.username)));
        }
        if store.users.values().any(|u| u.email == user.email) {
            return Err(RepoError::UniqueViolation(format!("email {}", user.email)));
        }
        let id = store.next_id();
        let now = store.tick();
        let created = User {
            id,
            username: user.username,
            nickname: user.nickname,
            email: user.email,
            password_hash: user.password_hash,
            avatar: user.avatar,
            description: None,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        store.users.insert(id, created.clone());
        Ok(created)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.check_available()?;
        Ok(self
            .store
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_user(&self, id: i64, changes: &UpdateProfileRequest) -> RepoResult<Option<User>> {
        self.check_available()?;
        let mut store = self.store.write().await;
        let now = store.tick();
        Ok(store.users.get_mut(&id).map(|user| {
            if let Some(nickname) = &changes.nickname {
                user.nickname = nickname.clone();
            }
            if let Some(description) = &changes.description {
                user.description = Some(description.clone()).filter(|d| !d.is_empty());
            }
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn set_user_avatar(&self, id: i64, avatar: &str) -> RepoResult<Option<User>> {
        self.check_available()?;
        let mut store = self.store.write().await;
        let now = store.tick();
        Ok(store.users.get_mut(&id).map(|user| {
            user.avatar = Some(avatar.to_string());
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        self.check_available()?;
        Ok(self.store.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        self.check_available()?;
        let mut categories: Vec<Category> =
            self.store.read().await.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(categories)
    }

    async fn create_category(&self, name: &str, slug: &str) -> RepoResult<Category> {
        self.check_available()?;
        let mut store = self.store.write().await;
        if store.categories.values().any(|c| c.slug == slug) {
            return Err(RepoError::UniqueViolation(format!("slug {}", slug)));
        }
        let id = store.next_id();
        let now = store.tick();
        let category = Category {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
            created_at: now,
            updated_at: now,
        };
        store.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: i64, name: &str, slug: &str) -> RepoResult<Option<Category>> {
        self.check_available()?;
        let mut store = self.store.write().await;
        if store.categories.values().any(|c| c.slug == slug && c.id != id) {
            return Err(RepoError::UniqueViolation(format!("slug {}", slug)));
        }
        let now = store.tick();
        Ok(store.categories.get_mut(&id).map(|category| {
            category.name = name.to_string();
            category.slug = slug.to_string();
            category.updated_at = now;
            category.clone()
        }))
    }

    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        self.check_available()?;
        let mut store = self.store.write().await;
        if store.posts.values().any(|p| p.category_id == id) {
            return Err(RepoError::ForeignKeyViolation(format!("category {} is referenced", id)));
        }
        Ok(store.categories.remove(&id).is_some())
    }

    async fn slug_exists(&self, slug: &str, except_id: Option<i64>) -> RepoResult<bool> {
        self.check_available()?;
        Ok(self
            .store
            .read()
            .await
            .categories
            .values()
            .any(|c| c.slug == slug && Some(c.id) != except_id))
    }

    async fn category_has_posts(&self, id: i64) -> RepoResult<bool> {
        self.check_available()?;
        Ok(self.store.read().await.posts.values().any(|p| p.category_id == id))
    }

    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        self.check_available()?;
        let mut store = self.store.write().await;
        if !store.users.contains_key(&post.user_id) {
            return Err(RepoError::ForeignKeyViolation(format!("user {}", post.user_id)));
        }
        if !store.categories.contains_key(&post.category_id) {
            return Err(RepoError::ForeignKeyViolation(format!("category {}", post.category_id)));
        }
        let id = store.next_id();
        let now = store.tick();
        let created = Post {
            id,
            user_id: post.user_id,
            category_id: post.category_id,
            title: post.title,
            description: post.description,
            media_type: post.media_type,
            media_path: post.media_path,
            status: PostStatus::Pending,
            reject_reason: None,
            likes_count: 0,
            created_at: now,
            updated_at: now,
        };
        store.posts.insert(id, created.clone());
        Ok(created)
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        self.check_available()?;
        let store = self.store.read().await;
        Ok(store.posts.get(&id).map(|p| store.counted(p)))
    }

    async fn query_posts(&self, query: &PostQuery) -> RepoResult<(Vec<Post>, i64)> {
        self.check_available()?;
        let store = self.store.read().await;
        let mut matched: Vec<Post> = store
            .posts
            .values()
            .filter(|p| store.matches(p, query))
            .map(|p| store.counted(p))
            .collect();

        matched.sort_by(|a, b| {
            let primary = match query.sort_by {
                SortBy::Date => a.created_at.cmp(&b.created_at),
                SortBy::Popularity => a.likes_count.cmp(&b.likes_count),
            };
            let primary = match query.sort_order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then(a.id.cmp(&b.id))
        });

        let total = matched.len() as i64;
        let page = matched
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_post(&self, id: i64, changes: &UpdatePostRequest) -> RepoResult<Option<Post>> {
        self.check_available()?;
        let mut store = self.store.write().await;
        if let Some(category_id) = changes.category_id {
            if !store.categories.contains_key(&category_id) {
                return Err(RepoError::ForeignKeyViolation(format!("category {}", category_id)));
            }
        }
        let now = store.tick();
        let Some(post) = store.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            post.title = title.clone();
        }
        if let Some(description) = &changes.description {
            post.description = Some(description.clone());
        }
        if let Some(category_id) = changes.category_id {
            post.category_id = category_id;
        }
        post.updated_at = now;
        let updated = post.clone();
        Ok(Some(store.counted(&updated)))
    }

    async fn set_post_status(
        &self,
        id: i64,
        expected: PostStatus,
        status: PostStatus,
        reject_reason: Option<String>,
    ) -> RepoResult<Option<Post>> {
        self.check_available()?;
        let mut store = self.store.write().await;
        let now = store.tick();
        let Some(post) = store.posts.get_mut(&id).filter(|p| p.status == expected) else {
            return Ok(None);
        };
        post.status = status;
        post.reject_reason = reject_reason;
        post.updated_at = now;
        let updated = post.clone();
        Ok(Some(store.counted(&updated)))
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        self.check_available()?;
        let mut store = self.store.write().await;
        if store.posts.remove(&id).is_none() {
            return Ok(false);
        }
        store.likes.retain(|l| l.post_id != id);
        store.comments.retain(|_, c| c.post_id != id);
        Ok(true)
    }

    async fn insert_like(&self, like: Like) -> RepoResult<bool> {
        self.check_available()?;
        let mut store = self.store.write().await;
        if !store.posts.contains_key(&like.post_id) {
            return Err(RepoError::ForeignKeyViolation(format!("post {}", like.post_id)));
        }
        if !store.users.contains_key(&like.user_id) {
            return Err(RepoError::ForeignKeyViolation(format!("user {}", like.user_id)));
        }
        Ok(store.likes.insert(like))
    }

    async fn delete_like(&self, like: Like) -> RepoResult<bool> {
        self.check_available()?;
        Ok(self.store.write().await.likes.remove(&like))
    }

    async fn count_likes(&self, post_id: i64) -> RepoResult<i64> {
        self.check_available()?;
        Ok(self.store.read().await.likes_of(post_id))
    }

    async fn is_liked(&self, like: Like) -> RepoResult<bool> {
        self.check_available()?;
        Ok(self.store.read().await.likes.contains(&like))
    }

    async fn add_comment(&self, post_id: i64, user_id: i64, content: &str) -> RepoResult<Comment> {
        self.check_available()?;
        let mut store = self.store.write().await;
        if !store.posts.contains_key(&post_id) {
            return Err(RepoError::ForeignKeyViolation(format!("post {}", post_id)));
        }
        let id = store.next_id();
        let created_at = store.tick();
        let comment = Comment {
            id,
            post_id,
            user_id,
            content: content.to_string(),
            created_at,
        };
        store.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        self.check_available()?;
        Ok(self.store.read().await.comments.get(&id).cloned())
    }

    async fn update_comment(&self, id: i64, content: &str) -> RepoResult<Option<Comment>> {
        self.check_available()?;
        Ok(self.store.write().await.comments.get_mut(&id).map(|comment| {
            comment.content = content.to_string();
            comment.clone()
        }))
    }

    async fn list_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>> {
        self.check_available()?;
        // BTreeMap order is id order, which is creation order here.
        Ok(self
            .store
            .read()
            .await
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        self.check_available()?;
        Ok(self.store.write().await.comments.remove(&id).is_some())
    }
}
