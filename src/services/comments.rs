use futures::future::try_join_all;

use super::char_len;
use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{Comment, CommentResponse, User, UserBrief},
    policy::{can_view, owns_or_moderates},
    repository::{RepoError, RepositoryState},
};

pub const CONTENT_MAX: usize = 1000;

/// CommentService
///
/// Comments follow the visibility of their post: whoever cannot see a post can
/// neither read nor write its comments.
#[derive(Clone)]
pub struct CommentService {
    repo: RepositoryState,
}

impl CommentService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    async fn ensure_visible(&self, post_id: i64, requester: Option<&AuthUser>) -> Result<()> {
        let post = self
            .repo
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Post {}", post_id)))?;
        if !can_view(&post, requester) {
            return Err(AppError::forbidden(format!("post {} is not visible to you", post_id)));
        }
        Ok(())
    }

    async fn author(&self, user_id: i64) -> Result<User> {
        self.repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("comment references missing user {}", user_id)))
    }

    fn render(comment: Comment, author: &User) -> CommentResponse {
        CommentResponse {
            id: comment.id,
            post_id: comment.post_id,
            content: comment.content,
            author: UserBrief::from(author),
            created_at: comment.created_at,
        }
    }

    fn validate_content(content: &str) -> Result<&str> {
        let content = content.trim();
        if content.is_empty() || char_len(content) > CONTENT_MAX {
            return Err(AppError::validation(
                "content",
                format!("must be between 1 and {} characters", CONTENT_MAX),
            ));
        }
        Ok(content)
    }

    async fn fetch(&self, id: i64) -> Result<Comment> {
        self.repo
            .get_comment(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Comment {}", id)))
    }

    pub async fn add_comment(&self, post_id: i64, subject: &AuthUser, content: &str) -> Result<CommentResponse> {
        let content = Self::validate_content(content)?;
        self.ensure_visible(post_id, Some(subject)).await?;

        let comment = self
            .repo
            .add_comment(post_id, subject.id, content)
            .await
            .map_err(|e| match e {
                RepoError::ForeignKeyViolation(_) => AppError::not_found(format!("Post {}", post_id)),
                other => other.into(),
            })?;
        let author = self.author(subject.id).await?;
        tracing::debug!(post_id, comment_id = comment.id, "comment added");
        Ok(Self::render(comment, &author))
    }

    /// Oldest first.
    pub async fn list_comments(&self, post_id: i64, requester: Option<&AuthUser>) -> Result<Vec<CommentResponse>> {
        self.ensure_visible(post_id, requester).await?;
        let comments = self.repo.list_comments(post_id).await?;
        try_join_all(comments.into_iter().map(|comment| async move {
            let author = self.author(comment.user_id).await?;
            Ok::<_, AppError>(Self::render(comment, &author))
        }))
        .await
    }

    /// Author or moderator only. Same content rules as a new comment.
    pub async fn update_comment(&self, id: i64, subject: &AuthUser, content: &str) -> Result<CommentResponse> {
        let content = Self::validate_content(content)?;
        let comment = self.fetch(id).await?;
        if !owns_or_moderates(comment.user_id, subject) {
            return Err(AppError::forbidden(format!("comment {} belongs to another user", id)));
        }
        let updated = self
            .repo
            .update_comment(id, content)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Comment {}", id)))?;
        let author = self.author(updated.user_id).await?;
        tracing::info!(comment_id = id, actor_id = subject.id, "comment edited");
        Ok(Self::render(updated, &author))
    }

    /// Author or moderator only.
    pub async fn delete_comment(&self, id: i64, subject: &AuthUser) -> Result<()> {
        let comment = self.fetch(id).await?;
        if !owns_or_moderates(comment.user_id, subject) {
            return Err(AppError::forbidden(format!("comment {} belongs to another user", id)));
        }
        if !self.repo.delete_comment(id).await? {
            return Err(AppError::not_found(format!("Comment {}", id)));
        }
        tracing::info!(comment_id = id, actor_id = subject.id, "comment deleted");
        Ok(())
    }
}
