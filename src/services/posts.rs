use uuid::Uuid;

use super::{char_len, feed_page};
use crate::{
    assembler::{Assembler, Listing},
    auth::AuthUser,
    error::{AppError, Result},
    feed::{FeedEngine, FeedFilter, StatusConstraint},
    models::{CreatedPost, ExternalPost, FeedPage, MediaType, NewPost, Post, PostStatus, UpdatePostRequest},
    moderation::{Decision, Transition, plan_transition},
    policy::{can_view, owns_or_moderates},
    repository::{RepoError, RepositoryState},
    storage::StorageState,
};

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 5000;

// A lost race gets one re-read to tell an identical decision from a competing one.
const MODERATION_ATTEMPTS: usize = 2;

/// NewPostInput
///
/// Everything a client submits when creating a post, already pulled out of the
/// multipart body.
#[derive(Debug, Clone, Default)]
pub struct NewPostInput {
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    pub media: Vec<u8>,
    pub content_type: String,
}

/// Maps an accepted upload content type to its media kind and file extension.
pub fn media_kind(content_type: &str) -> Option<(MediaType, &'static str)> {
    let kind = match content_type.to_ascii_lowercase().as_str() {
        "image/jpeg" => (MediaType::Image, "jpg"),
        "image/png" => (MediaType::Image, "png"),
        "image/gif" => (MediaType::Image, "gif"),
        "image/webp" => (MediaType::Image, "webp"),
        "video/mp4" => (MediaType::Video, "mp4"),
        "video/webm" => (MediaType::Video, "webm"),
        _ => return None,
    };
    Some(kind)
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    let len = char_len(title);
    if !(TITLE_MIN..=TITLE_MAX).contains(&len) {
        return Err(AppError::validation(
            "title",
            format!("must be between {} and {} characters", TITLE_MIN, TITLE_MAX),
        ));
    }
    Ok(title.to_string())
}

fn validate_description(description: &str) -> Result<()> {
    if char_len(description) > DESCRIPTION_MAX {
        return Err(AppError::validation(
            "description",
            format!("must be at most {} characters", DESCRIPTION_MAX),
        ));
    }
    Ok(())
}

fn unknown_category(e: RepoError) -> AppError {
    match e {
        RepoError::ForeignKeyViolation(_) => AppError::validation("category_id", "category does not exist"),
        other => other.into(),
    }
}

/// PostService
///
/// Post lifecycle and feeds: creation, single fetch, the four feed flavours,
/// moderation, edit and delete.
#[derive(Clone)]
pub struct PostService {
    repo: RepositoryState,
    storage: StorageState,
    feed: FeedEngine,
    assembler: Assembler,
}

impl PostService {
    pub fn new(repo: RepositoryState, storage: StorageState) -> Self {
        Self {
            feed: FeedEngine::new(repo.clone()),
            assembler: Assembler::new(repo.clone(), storage.clone()),
            repo,
            storage,
        }
    }

    async fn fetch(&self, id: i64) -> Result<Post> {
        self.repo
            .get_post(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Post {}", id)))
    }

    async fn ensure_category(&self, category_id: i64) -> Result<()> {
        if self.repo.get_category(category_id).await?.is_none() {
            return Err(AppError::validation("category_id", "category does not exist"));
        }
        Ok(())
    }

    /// create_post
    ///
    /// Validates the input, stores the media object, then inserts the row in
    /// `pending`. If the insert fails the stored media is removed again.
    pub async fn create_post(&self, owner_id: i64, input: NewPostInput) -> Result<CreatedPost> {
        if self.repo.get_user(owner_id).await?.is_none() {
            return Err(AppError::not_found(format!("User {}", owner_id)));
        }
        let title = validate_title(&input.title)?;
        let description = input.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
        if let Some(description) = &description {
            validate_description(description)?;
        }
        if input.media.is_empty() {
            return Err(AppError::validation("media", "media file is required"));
        }
        let (media_type, extension) = media_kind(&input.content_type).ok_or_else(|| {
            AppError::validation(
                "media",
                format!("unsupported content type `{}`", input.content_type),
            )
        })?;
        self.ensure_category(input.category_id).await?;

        let name = format!("posts/post_{}_{}.{}", owner_id, Uuid::new_v4(), extension);
        let media_path = self.storage.save(input.media, &name, &input.content_type).await?;

        let inserted = self
            .repo
            .create_post(NewPost {
                user_id: owner_id,
                category_id: input.category_id,
                title,
                description,
                media_type,
                media_path: media_path.clone(),
            })
            .await;

        let post = match inserted {
            Ok(post) => post,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&media_path).await {
                    tracing::warn!("Orphaned media {} after failed insert: {}", media_path, cleanup);
                }
                return Err(unknown_category(e));
            }
        };

        tracing::info!(post_id = post.id, owner_id, "post created, awaiting moderation");
        Ok(CreatedPost {
            id: post.id,
            status: post.status,
        })
    }

    /// get_post
    ///
    /// NotFound when absent, Forbidden when present but hidden from `requester`.
    pub async fn get_post(&self, id: i64, requester: Option<&AuthUser>) -> Result<ExternalPost> {
        let post = self.fetch(id).await?;
        if !can_view(&post, requester) {
            return Err(AppError::forbidden(format!("post {} is not visible to you", id)));
        }
        self.assembler.assemble_one(post, requester).await
    }

    /// list_posts
    ///
    /// The public feed: approved posts only.
    pub async fn list_posts(&self, filter: &FeedFilter, requester: Option<&AuthUser>) -> Result<FeedPage> {
        let result = self
            .feed
            .query(filter, StatusConstraint::Only(PostStatus::Approved))
            .await?;
        let items = self
            .assembler
            .assemble_feed(result.items, requester, Listing::Public)
            .await?;
        Ok(feed_page(items, result.total, filter))
    }

    /// list_user_posts
    ///
    /// Posts of one owner. The owner and moderators see every status; everyone else
    /// sees approved posts only. The constraint is chosen before querying so `total`
    /// counts exactly what the requester may see.
    pub async fn list_user_posts(
        &self,
        owner_id: i64,
        filter: &FeedFilter,
        requester: Option<&AuthUser>,
    ) -> Result<FeedPage> {
        if self.repo.get_user(owner_id).await?.is_none() {
            return Err(AppError::not_found(format!("User {}", owner_id)));
        }
        let constraint = match requester {
            Some(subject) if owns_or_moderates(owner_id, subject) => StatusConstraint::OwnerScope(owner_id),
            _ => StatusConstraint::Only(PostStatus::Approved),
        };
        let filter = FeedFilter {
            user_id: Some(owner_id),
            ..filter.clone()
        };

        let result = self.feed.query(&filter, constraint).await?;
        let items = self
            .assembler
            .assemble_feed(result.items, requester, Listing::Public)
            .await?;
        Ok(feed_page(items, result.total, &filter))
    }

    /// list_liked_posts
    ///
    /// Approved posts liked by `user_id`; every item has `is_liked = true`.
    pub async fn list_liked_posts(&self, user: &AuthUser, filter: &FeedFilter) -> Result<FeedPage> {
        let result = self.feed.query_liked_by(filter, user.id).await?;
        let items = self
            .assembler
            .assemble_feed(result.items, Some(user), Listing::Liked)
            .await?;
        Ok(feed_page(items, result.total, filter))
    }

    /// list_moderation_queue
    ///
    /// Pending posts, for moderators only. The visibility policy is not applied.
    pub async fn list_moderation_queue(&self, moderator: &AuthUser, filter: &FeedFilter) -> Result<FeedPage> {
        if !moderator.role.is_moderator() {
            return Err(AppError::forbidden("moderator role required"));
        }
        let result = self
            .feed
            .query(filter, StatusConstraint::Only(PostStatus::Pending))
            .await?;
        let items = self
            .assembler
            .assemble_feed(result.items, Some(moderator), Listing::ModerationQueue)
            .await?;
        Ok(feed_page(items, result.total, filter))
    }

    /// moderate
    ///
    /// Applies a moderator's decision through a conditional status write. If another
    /// decision lands in between, the post is re-read: finding the same approval
    /// already in place succeeds, anything else is a Conflict. A concurrent decision
    /// is never overwritten, not even a rejection by a second rejection.
    pub async fn moderate(
        &self,
        post_id: i64,
        moderator: &AuthUser,
        decision: Decision,
        reason: Option<String>,
    ) -> Result<ExternalPost> {
        if !moderator.role.is_moderator() {
            return Err(AppError::forbidden("moderator role required"));
        }
        if decision == Decision::Rejected && reason.as_deref().is_none_or(|r| r.trim().is_empty()) {
            tracing::warn!(post_id, moderator_id = moderator.id, "post rejected without a reason");
        }

        let mut observed: Option<PostStatus> = None;
        for _ in 0..MODERATION_ATTEMPTS {
            let post = self.fetch(post_id).await?;
            let moved = observed.is_some_and(|seen| seen != post.status);
            observed = Some(post.status);

            let (expected, status, reject_reason) = match plan_transition(post.status, decision, reason.clone())? {
                Transition::Unchanged => {
                    tracing::debug!(post_id, status = post.status.as_str(), "moderation decision already applied");
                    return self.assembler.assemble_one(post, Some(moderator)).await;
                }
                Transition::Apply { .. } if moved => {
                    tracing::info!(
                        post_id,
                        moderator_id = moderator.id,
                        status = post.status.as_str(),
                        "another moderator decided first"
                    );
                    return Err(AppError::conflict(format!(
                        "post {} was decided by another moderator ({})",
                        post_id,
                        post.status.as_str()
                    )));
                }
                Transition::Apply {
                    expected,
                    status,
                    reject_reason,
                } => (expected, status, reject_reason),
            };

            if let Some(updated) = self
                .repo
                .set_post_status(post_id, expected, status, reject_reason)
                .await?
            {
                tracing::info!(
                    post_id,
                    moderator_id = moderator.id,
                    from = expected.as_str(),
                    to = status.as_str(),
                    "post moderated"
                );
                return self.assembler.assemble_one(updated, Some(moderator)).await;
            }
            tracing::debug!(post_id, "moderation lost a race, re-reading");
        }

        Err(AppError::conflict(format!(
            "post {} is being moderated concurrently",
            post_id
        )))
    }

    /// update_post
    ///
    /// Edits title, description or category. Owner or moderator only. The status is
    /// never touched by an edit.
    pub async fn update_post(
        &self,
        id: i64,
        editor: &AuthUser,
        changes: UpdatePostRequest,
    ) -> Result<ExternalPost> {
        let post = self.fetch(id).await?;
        if !owns_or_moderates(post.user_id, editor) {
            return Err(AppError::forbidden(format!("post {} belongs to another user", id)));
        }

        let changes = UpdatePostRequest {
            title: changes.title.as_deref().map(validate_title).transpose()?,
            description: changes.description.map(|d| d.trim().to_string()),
            category_id: changes.category_id,
        };
        if let Some(description) = &changes.description {
            validate_description(description)?;
        }
        if let Some(category_id) = changes.category_id {
            self.ensure_category(category_id).await?;
        }

        let updated = self
            .repo
            .update_post(id, &changes)
            .await
            .map_err(unknown_category)?
            .ok_or_else(|| AppError::not_found(format!("Post {}", id)))?;

        tracing::info!(post_id = id, editor_id = editor.id, "post updated");
        self.assembler.assemble_one(updated, Some(editor)).await
    }

    /// delete_post
    ///
    /// Owner or moderator only. The row goes first (likes and comments cascade with
    /// it); a failure to remove the media object afterwards is logged, not returned.
    pub async fn delete_post(&self, id: i64, actor: &AuthUser) -> Result<()> {
        let post = self.fetch(id).await?;
        if !owns_or_moderates(post.user_id, actor) {
            return Err(AppError::forbidden(format!("post {} belongs to another user", id)));
        }
        if !self.repo.delete_post(id).await? {
            return Err(AppError::not_found(format!("Post {}", id)));
        }
        if let Err(e) = self.storage.delete(&post.media_path).await {
            tracing::warn!(post_id = id, "media cleanup failed: {}", e);
        }
        tracing::info!(post_id = id, actor_id = actor.id, "post deleted");
        Ok(())
    }
}
