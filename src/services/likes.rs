use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{Like, LikeState},
    policy::can_view,
    repository::{RepoError, RepositoryState},
};

/// LikeService
///
/// Like and unlike. The `(post, user)` pair is unique in storage, so a repeated like
/// never adds a row; it is reported as a Conflict.
#[derive(Clone)]
pub struct LikeService {
    repo: RepositoryState,
}

impl LikeService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    async fn ensure_visible(&self, post_id: i64, subject: &AuthUser) -> Result<()> {
        let post = self
            .repo
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Post {}", post_id)))?;
        if !can_view(&post, Some(subject)) {
            return Err(AppError::forbidden(format!("post {} is not visible to you", post_id)));
        }
        Ok(())
    }

    async fn state(&self, post_id: i64, is_liked: bool) -> Result<LikeState> {
        Ok(LikeState {
            post_id,
            likes_count: self.repo.count_likes(post_id).await?,
            is_liked,
        })
    }

    pub async fn like(&self, post_id: i64, subject: &AuthUser) -> Result<LikeState> {
        self.ensure_visible(post_id, subject).await?;
        let like = Like {
            post_id,
            user_id: subject.id,
        };
        let inserted = self.repo.insert_like(like).await.map_err(|e| match e {
            // The post vanished between the visibility check and the insert.
            RepoError::ForeignKeyViolation(_) => AppError::not_found(format!("Post {}", post_id)),
            other => other.into(),
        })?;
        if !inserted {
            return Err(AppError::conflict(format!("post {} is already liked", post_id)));
        }
        tracing::debug!(post_id, user_id = subject.id, "post liked");
        self.state(post_id, true).await
    }

    pub async fn unlike(&self, post_id: i64, subject: &AuthUser) -> Result<LikeState> {
        if self.repo.get_post(post_id).await?.is_none() {
            return Err(AppError::not_found(format!("Post {}", post_id)));
        }
        let removed = self
            .repo
            .delete_like(Like {
                post_id,
                user_id: subject.id,
            })
            .await?;
        if !removed {
            return Err(AppError::not_found(format!("Like on post {}", post_id)));
        }
        tracing::debug!(post_id, user_id = subject.id, "post unliked");
        self.state(post_id, false).await
    }
}
