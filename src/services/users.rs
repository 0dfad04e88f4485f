use uuid::Uuid;

use super::{auth::validate_name, char_len};
use crate::{
    auth::AuthUser,
    error::{AppError, Result},
    models::{UpdateProfileRequest, User, UserProfile},
    repository::RepositoryState,
    storage::StorageState,
};

pub const ABOUT_MAX: usize = 1000;

/// Avatar uploads are images only.
pub fn avatar_extension(content_type: &str) -> Option<&'static str> {
    match content_type.to_ascii_lowercase().as_str() {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// UserService
///
/// Profiles: the public view of any user, and the requester's own account.
#[derive(Clone)]
pub struct UserService {
    repo: RepositoryState,
    storage: StorageState,
}

impl UserService {
    pub fn new(repo: RepositoryState, storage: StorageState) -> Self {
        Self { repo, storage }
    }

    async fn fetch(&self, id: i64) -> Result<User> {
        self.repo
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {}", id)))
    }

    /// The requester's own profile, including the email address.
    pub async fn profile(&self, subject: &AuthUser) -> Result<UserProfile> {
        Ok(UserProfile::own(&self.fetch(subject.id).await?))
    }

    pub async fn public_profile(&self, id: i64) -> Result<UserProfile> {
        Ok(UserProfile::public(&self.fetch(id).await?))
    }

    /// update_profile
    ///
    /// Changes nickname and/or description. An empty description clears it.
    pub async fn update_profile(&self, subject: &AuthUser, changes: UpdateProfileRequest) -> Result<UserProfile> {
        let changes = UpdateProfileRequest {
            nickname: changes
                .nickname
                .as_deref()
                .map(|n| validate_name("nickname", n))
                .transpose()?,
            description: changes.description.map(|d| d.trim().to_string()),
        };
        if changes
            .description
            .as_deref()
            .is_some_and(|d| char_len(d) > ABOUT_MAX)
        {
            return Err(AppError::validation(
                "description",
                format!("must be at most {} characters", ABOUT_MAX),
            ));
        }

        let user = self
            .repo
            .update_user(subject.id, &changes)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {}", subject.id)))?;
        tracing::info!(user_id = subject.id, "profile updated");
        Ok(UserProfile::own(&user))
    }

    /// update_avatar
    ///
    /// Stores the new image, points the profile at its public URL, then removes the
    /// previous avatar object if this service stored it. Removal failures are logged.
    pub async fn update_avatar(&self, subject: &AuthUser, image: Vec<u8>, content_type: &str) -> Result<UserProfile> {
        if image.is_empty() {
            return Err(AppError::validation("avatar", "image file is required"));
        }
        let extension = avatar_extension(content_type).ok_or_else(|| {
            AppError::validation("avatar", format!("unsupported content type `{}`", content_type))
        })?;
        let previous = self.fetch(subject.id).await?.avatar;

        let name = format!("avatars/avatar_{}_{}.{}", subject.id, Uuid::new_v4(), extension);
        let path = self.storage.save(image, &name, content_type).await?;
        let url = self.storage.url(&path);

        let user = match self.repo.set_user_avatar(subject.id, &url).await {
            Ok(Some(user)) => user,
            failed => {
                if let Err(e) = self.storage.delete(&path).await {
                    tracing::warn!("Orphaned avatar {} after failed update: {}", path, e);
                }
                return Err(match failed {
                    Err(e) => e.into(),
                    _ => AppError::not_found(format!("User {}", subject.id)),
                });
            }
        };

        let base = self.storage.url("");
        if let Some(old_path) = previous.as_deref().and_then(|old| old.strip_prefix(base.as_str())) {
            if let Err(e) = self.storage.delete(old_path).await {
                tracing::warn!(user_id = subject.id, "old avatar cleanup failed: {}", e);
            }
        }

        tracing::info!(user_id = subject.id, "avatar updated");
        Ok(UserProfile::own(&user))
    }
}
