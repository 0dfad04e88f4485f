use crate::feed::{SortBy, SortOrder, StatusConstraint};
use crate::models::{
    Category, Comment, Like, NewPost, NewUser, Post, PostStatus, UpdatePostRequest, UpdateProfileRequest, User,
};
use async_trait::async_trait;
use std::sync::Arc;

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepoError
///
/// Raw failures surfaced by the persistence gateway. The gateway performs no
/// business logic, so it only classifies *how* the store failed; services decide
/// what that means for the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepoError {
    /// A unique or primary-key constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A foreign-key constraint rejected the write (or delete).
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    /// The store could not be reached in time. Retrying may succeed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Anything else. Retrying the same statement will fail the same way.
    #[error("store failure: {0}")]
    Fatal(String),
}

impl RepoError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepoError::Unavailable(_))
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => RepoError::UniqueViolation(db.message().to_string()),
                Some("23503") => RepoError::ForeignKeyViolation(db.message().to_string()),
                // serialization_failure / deadlock_detected are safe to replay.
                Some("40001") | Some("40P01") => RepoError::Unavailable(db.message().to_string()),
                _ => RepoError::Fatal(e.to_string()),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RepoError::Unavailable(e.to_string())
            }
            _ => RepoError::Fatal(e.to_string()),
        }
    }
}

pub type RepoResult<T> = std::result::Result<T, RepoError>;

/// PostQuery
///
/// A fully resolved feed query: status scope, conjunctive filters, sort and window.
/// Implementations must apply the *same* predicate to the page query and the count
/// query; only `limit`/`offset` differ between the two.
#[derive(Debug, Clone)]
pub struct PostQuery {
    pub status: StatusConstraint,
    pub category_id: Option<i64>,
    pub user_id: Option<i64>,
    pub search: Option<String>,
    /// Restricts to posts liked by this user.
    pub liked_by: Option<i64>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

/// Repository Trait
///
/// The persistence gateway: typed fetch/write operations against posts, likes,
/// categories, comments and users. It returns raw records and counts.
///
/// **Send + Sync + async_trait** make the trait object (`Arc<dyn Repository>`)
/// shareable across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    // Fails with UniqueViolation when the username or email is taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    // Nickname is replaced when given; an empty description clears it.
    async fn update_user(&self, id: i64, changes: &UpdateProfileRequest) -> RepoResult<Option<User>>;
    async fn set_user_avatar(&self, id: i64, avatar: &str) -> RepoResult<Option<User>>;

    // --- Categories ---
    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>>;
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    // Fails with UniqueViolation when the slug is taken.
    async fn create_category(&self, name: &str, slug: &str) -> RepoResult<Category>;
    async fn update_category(&self, id: i64, name: &str, slug: &str) -> RepoResult<Option<Category>>;
    async fn delete_category(&self, id: i64) -> RepoResult<bool>;
    async fn slug_exists(&self, slug: &str, except_id: Option<i64>) -> RepoResult<bool>;
    async fn category_has_posts(&self, id: i64) -> RepoResult<bool>;

    // --- Posts ---
    async fn create_post(&self, post: NewPost) -> RepoResult<Post>;
    // Any status; visibility is decided above this layer.
    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>>;
    // Returns the page and the full filtered count.
    async fn query_posts(&self, query: &PostQuery) -> RepoResult<(Vec<Post>, i64)>;
    // Partial update of the editable fields. Never touches status.
    async fn update_post(&self, id: i64, changes: &UpdatePostRequest) -> RepoResult<Option<Post>>;
    /// Conditional status write: applies only while the post is still in `expected`.
    /// `None` means no row matched (absent post, or the status moved concurrently).
    async fn set_post_status(
        &self,
        id: i64,
        expected: PostStatus,
        status: PostStatus,
        reject_reason: Option<String>,
    ) -> RepoResult<Option<Post>>;
    // Cascades to likes and comments.
    async fn delete_post(&self, id: i64) -> RepoResult<bool>;

    // --- Likes ---
    // Returns false when the pair already exists (no duplicate row is written).
    async fn insert_like(&self, like: Like) -> RepoResult<bool>;
    async fn delete_like(&self, like: Like) -> RepoResult<bool>;
    async fn count_likes(&self, post_id: i64) -> RepoResult<i64>;
    async fn is_liked(&self, like: Like) -> RepoResult<bool>;

    // --- Comments ---
    async fn add_comment(&self, post_id: i64, user_id: i64, content: &str) -> RepoResult<Comment>;
    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>>;
    async fn update_comment(&self, id: i64, content: &str) -> RepoResult<Option<Comment>>;
    async fn list_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>>;
    async fn delete_comment(&self, id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
