use futures::future::try_join_all;

use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{Category, CategoryBrief, ExternalPost, Like, Post, User, UserBrief},
    policy::can_view,
    repository::RepositoryState,
    storage::StorageState,
};

/// Listing
///
/// The context a batch of posts is assembled for. It decides whether the visibility
/// policy filters items and where `is_liked` comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    /// Public and per-user feeds: items failing the policy are dropped.
    Public,
    /// The liked-posts feed of the requester: `is_liked` is true by construction.
    Liked,
    /// Pending posts for moderators. The policy is not consulted.
    ModerationQueue,
}

/// Assembler
///
/// Joins raw post records with their author, category and the requester's like state.
/// A post whose author or category is gone fails the whole response: that is
/// corruption, not a permission question.
#[derive(Clone)]
pub struct Assembler {
    repo: RepositoryState,
    storage: StorageState,
}

impl Assembler {
    pub fn new(repo: RepositoryState, storage: StorageState) -> Self {
        Self { repo, storage }
    }

    /// Single-item path. The like count is read fresh rather than trusted from `post`.
    pub async fn assemble_one(&self, post: Post, requester: Option<&AuthUser>) -> Result<ExternalPost> {
        let (author, category, likes_count, is_liked) = tokio::try_join!(
            self.author(post.user_id),
            self.category(post.category_id),
            async { Ok::<_, AppError>(self.repo.count_likes(post.id).await?) },
            self.is_liked(post.id, requester),
        )?;
        Ok(self.render(post, &author, &category, likes_count, is_liked))
    }

    /// Feed path. Like counts come from the feed query itself, so the order the items
    /// were sorted in always agrees with the counts shown.
    pub async fn assemble_feed(
        &self,
        posts: Vec<Post>,
        requester: Option<&AuthUser>,
        listing: Listing,
    ) -> Result<Vec<ExternalPost>> {
        let before = posts.len();
        let visible: Vec<Post> = posts
            .into_iter()
            .filter(|post| listing == Listing::ModerationQueue || can_view(post, requester))
            .collect();
        if visible.len() != before {
            tracing::debug!(dropped = before - visible.len(), "feed items hidden by visibility policy");
        }

        try_join_all(visible.into_iter().map(|post| self.assemble_listed(post, requester, listing))).await
    }

    async fn assemble_listed(
        &self,
        post: Post,
        requester: Option<&AuthUser>,
        listing: Listing,
    ) -> Result<ExternalPost> {
        let liked = async {
            match listing {
                Listing::Liked => Ok(true),
                _ => self.is_liked(post.id, requester).await,
            }
        };
        let (author, category, is_liked) = tokio::try_join!(
            self.author(post.user_id),
            self.category(post.category_id),
            liked,
        )?;
        let likes_count = post.likes_count;
        Ok(self.render(post, &author, &category, likes_count, is_liked))
    }

    async fn author(&self, user_id: i64) -> Result<User> {
        self.repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("post references missing user {}", user_id)))
    }

    async fn category(&self, category_id: i64) -> Result<Category> {
        self.repo.get_category(category_id).await?.ok_or_else(|| {
            AppError::Internal(format!("post references missing category {}", category_id))
        })
    }

    async fn is_liked(&self, post_id: i64, requester: Option<&AuthUser>) -> Result<bool> {
        match requester {
            Some(subject) => Ok(self
                .repo
                .is_liked(Like {
                    post_id,
                    user_id: subject.id,
                })
                .await?),
            None => Ok(false),
        }
    }

    fn render(
        &self,
        post: Post,
        author: &User,
        category: &Category,
        likes_count: i64,
        is_liked: bool,
    ) -> ExternalPost {
        ExternalPost {
            id: post.id,
            title: post.title,
            description: post.description.unwrap_or_default(),
            media_type: post.media_type,
            media_url: self.storage.url(&post.media_path),
            author: UserBrief::from(author),
            category: CategoryBrief::from(category),
            status: post.status,
            reject_reason: post.reject_reason,
            likes_count,
            is_liked,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}
