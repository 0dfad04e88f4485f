//! Per-domain services behind a single façade.
//!
//! Handlers reach a domain through a named field (`services.posts`,
//! `services.likes`, ...). Each service owns its validation and error translation;
//! none of them knows about HTTP.

use crate::{
    config::AppConfig,
    models::FeedPage,
    feed::{FeedFilter, total_pages},
    repository::RepositoryState,
    storage::StorageState,
};

pub mod auth;
pub mod categories;
pub mod comments;
pub mod likes;
pub mod posts;
pub mod users;

pub use auth::AuthService;
pub use categories::{CategoryService, generate_slug};
pub use comments::CommentService;
pub use likes::LikeService;
pub use posts::{NewPostInput, PostService};
pub use users::UserService;

/// Services
#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    pub posts: PostService,
    pub likes: LikeService,
    pub categories: CategoryService,
    pub comments: CommentService,
    pub users: UserService,
}

impl Services {
    pub fn new(repo: RepositoryState, storage: StorageState, config: AppConfig) -> Self {
        Self {
            auth: AuthService::new(repo.clone(), config),
            posts: PostService::new(repo.clone(), storage.clone()),
            likes: LikeService::new(repo.clone()),
            categories: CategoryService::new(repo.clone()),
            comments: CommentService::new(repo.clone()),
            users: UserService::new(repo, storage),
        }
    }
}

pub(crate) fn feed_page(items: Vec<crate::models::ExternalPost>, total: i64, filter: &FeedFilter) -> FeedPage {
    FeedPage {
        items,
        total,
        page: filter.page,
        per_page: filter.per_page,
        total_pages: total_pages(total, filter.per_page),
    }
}

/// Counts characters, not bytes, so multi-byte titles get the same limits.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}
