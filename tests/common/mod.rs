#![allow(dead_code)]

use async_trait::async_trait;
use designhub_feed::{
    AppConfig, AppState, InMemoryRepository, MockStorageService, Services,
    auth::AuthUser,
    models::{
        Category, Comment, Like, NewPost, NewUser, Post, PostStatus, Role, UpdatePostRequest,
        UpdateProfileRequest, User,
    },
    moderation::Decision,
    repository::{PostQuery, RepoError, RepoResult, Repository, RepositoryState},
    services::NewPostInput,
    storage::StorageState,
};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Password every seeded fixture user signs in with.
pub const PASSWORD: &str = "hunter22";

/// Everything a service-level test needs: an in-memory store, a mock media store,
/// three subjects and one category.
pub struct Fixture {
    pub repo: Arc<InMemoryRepository>,
    pub storage: MockStorageService,
    pub services: Services,
    pub owner: AuthUser,
    pub stranger: AuthUser,
    pub moderator: AuthUser,
    pub category: Category,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_storage(MockStorageService::new()).await
    }

    pub async fn with_storage(storage: MockStorageService) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let services = Services::new(
            repo.clone() as RepositoryState,
            Arc::new(storage.clone()) as StorageState,
            AppConfig::default(),
        );
        let owner = add_user(&repo, "ada", Role::User).await;
        let stranger = add_user(&repo, "bob", Role::User).await;
        let moderator = add_user(&repo, "mod", Role::Moderator).await;
        let category = repo
            .create_category("Illustration", "illustration")
            .await
            .expect("seed category");

        Self {
            repo,
            storage,
            services,
            owner,
            stranger,
            moderator,
            category,
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(
            self.repo.clone() as RepositoryState,
            Arc::new(self.storage.clone()) as StorageState,
            AppConfig::default(),
        )
    }

    pub fn input(&self, title: &str) -> NewPostInput {
        NewPostInput {
            title: title.to_string(),
            description: Some(format!("{} description", title)),
            category_id: self.category.id,
            media: vec![0x89, 0x50, 0x4e, 0x47],
            content_type: "image/png".to_string(),
        }
    }

    /// A pending post of `owner`.
    pub async fn pending(&self, owner: &AuthUser, title: &str) -> i64 {
        self.services
            .posts
            .create_post(owner.id, self.input(title))
            .await
            .expect("create post")
            .id
    }

    /// A post of `owner` already approved by the fixture moderator.
    pub async fn approved(&self, owner: &AuthUser, title: &str) -> i64 {
        let id = self.pending(owner, title).await;
        self.services
            .posts
            .moderate(id, &self.moderator, Decision::Approved, None)
            .await
            .expect("approve");
        id
    }

    pub async fn rejected(&self, owner: &AuthUser, title: &str, reason: &str) -> i64 {
        let id = self.pending(owner, title).await;
        self.services
            .posts
            .moderate(id, &self.moderator, Decision::Rejected, Some(reason.to_string()))
            .await
            .expect("reject");
        id
    }

    pub async fn user(&self, username: &str) -> AuthUser {
        add_user(&self.repo, username, Role::User).await
    }

    /// Services over `repo` sharing this fixture's media store.
    pub fn services_over(&self, repo: InterceptingRepository) -> Services {
        Services::new(
            Arc::new(repo) as RepositoryState,
            Arc::new(self.storage.clone()) as StorageState,
            AppConfig::default(),
        )
    }
}

pub async fn add_user(repo: &InMemoryRepository, username: &str, role: Role) -> AuthUser {
    let user = repo
        .create_user(NewUser {
            username: username.to_string(),
            nickname: username.to_uppercase(),
            email: format!("{}@example.com", username),
            password_hash: password_hash(),
            avatar: None,
            role,
        })
        .await
        .expect("seed user");
    AuthUser {
        id: user.id,
        role: user.role,
    }
}

/// One Argon2 hash of [`PASSWORD`], shared by every seeded user.
fn password_hash() -> String {
    static HASH: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    HASH.get_or_init(|| designhub_feed::services::auth::hash_password(PASSWORD).expect("hash"))
        .clone()
}

/// Delegates to the in-memory store, optionally misbehaving:
/// refusing post inserts, or letting another moderator decide a pending post just
/// before the next conditional status write lands.
pub struct InterceptingRepository {
    inner: Arc<InMemoryRepository>,
    refuse_post_inserts: bool,
    competing_decision: Mutex<Option<(PostStatus, Option<String>)>>,
}

impl InterceptingRepository {
    pub fn refusing_post_inserts(inner: Arc<InMemoryRepository>) -> Self {
        Self {
            inner,
            refuse_post_inserts: true,
            competing_decision: Mutex::new(None),
        }
    }

    pub fn racing(inner: Arc<InMemoryRepository>, status: PostStatus, reason: Option<&str>) -> Self {
        Self {
            inner,
            refuse_post_inserts: false,
            competing_decision: Mutex::new(Some((status, reason.map(str::to_string)))),
        }
    }
}

#[async_trait]
impl Repository for InterceptingRepository {
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        self.inner.get_user(id).await
    }
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        self.inner.create_user(user).await
    }
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.inner.get_user_by_email(email).await
    }
    async fn update_user(&self, id: i64, changes: &UpdateProfileRequest) -> RepoResult<Option<User>> {
        self.inner.update_user(id, changes).await
    }
    async fn set_user_avatar(&self, id: i64, avatar: &str) -> RepoResult<Option<User>> {
        self.inner.set_user_avatar(id, avatar).await
    }
    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        self.inner.get_category(id).await
    }
    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        self.inner.list_categories().await
    }
    async fn create_category(&self, name: &str, slug: &str) -> RepoResult<Category> {
        self.inner.create_category(name, slug).await
    }
    async fn update_category(&self, id: i64, name: &str, slug: &str) -> RepoResult<Option<Category>> {
        self.inner.update_category(id, name, slug).await
    }
    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        self.inner.delete_category(id).await
    }
    async fn slug_exists(&self, slug: &str, except_id: Option<i64>) -> RepoResult<bool> {
        self.inner.slug_exists(slug, except_id).await
    }
    async fn category_has_posts(&self, id: i64) -> RepoResult<bool> {
        self.inner.category_has_posts(id).await
    }
    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        if self.refuse_post_inserts {
            return Err(RepoError::Fatal("insert refused".into()));
        }
        self.inner.create_post(post).await
    }
    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        self.inner.get_post(id).await
    }
    async fn query_posts(&self, query: &PostQuery) -> RepoResult<(Vec<Post>, i64)> {
        self.inner.query_posts(query).await
    }
    async fn update_post(&self, id: i64, changes: &UpdatePostRequest) -> RepoResult<Option<Post>> {
        self.inner.update_post(id, changes).await
    }
    async fn set_post_status(
        &self,
        id: i64,
        expected: PostStatus,
        status: PostStatus,
        reject_reason: Option<String>,
    ) -> RepoResult<Option<Post>> {
        if let Some((competing, reason)) = self.competing_decision.lock().await.take() {
            self.inner
                .set_post_status(id, PostStatus::Pending, competing, reason)
                .await?;
        }
        self.inner.set_post_status(id, expected, status, reject_reason).await
    }
    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        self.inner.delete_post(id).await
    }
    async fn insert_like(&self, like: Like) -> RepoResult<bool> {
        self.inner.insert_like(like).await
    }
    async fn delete_like(&self, like: Like) -> RepoResult<bool> {
        self.inner.delete_like(like).await
    }
    async fn count_likes(&self, post_id: i64) -> RepoResult<i64> {
        self.inner.count_likes(post_id).await
    }
    async fn is_liked(&self, like: Like) -> RepoResult<bool> {
        self.inner.is_liked(like).await
    }
    async fn add_comment(&self, post_id: i64, user_id: i64, content: &str) -> RepoResult<Comment> {
        self.inner.add_comment(post_id, user_id, content).await
    }
    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        self.inner.get_comment(id).await
    }
    async fn update_comment(&self, id: i64, content: &str) -> RepoResult<Option<Comment>> {
        self.inner.update_comment(id, content).await
    }
    async fn list_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>> {
        self.inner.list_comments(post_id).await
    }
    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        self.inner.delete_comment(id).await
    }
}
