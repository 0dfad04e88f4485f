use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Enumerations (Mapped to Postgres ENUM types) ---

/// Role
///
/// The RBAC field of a user. It is the only authorization signal consumed by the
/// visibility policy and the moderation state machine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    /// Moderators and admins share every moderation privilege.
    pub fn is_moderator(self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

/// PostStatus
///
/// Lifecycle of a post: created `pending`, then decided once by a moderator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Approved => "approved",
            PostStatus::Rejected => "rejected",
        }
    }
}

/// MediaType
///
/// Kind of the media object attached to a post, derived from the upload's content type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "media_type", rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Image,
    Video,
}

// --- Core Records (Mapped to Database) ---

/// User
///
/// A row of the `users` table. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    // Absent and empty are distinct in storage; both render as "" externally.
    pub avatar: Option<String>,
    pub description: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// NewUser
///
/// Insert payload for a user row. `password_hash` is an Argon2 PHC string.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: Option<String>,
    pub role: Role,
}

/// Category
///
/// A row of the `categories` table. `slug` is derived from `name` and unique.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Post
///
/// A row of the `posts` table joined with its derived like count. The same
/// `likes_count` expression is used for popularity sorting, so the count shown
/// never drifts from the count sorted on.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default, PartialEq)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub media_type: MediaType,
    pub media_path: String,
    pub status: PostStatus,
    /// Present iff `status == Rejected` (possibly empty).
    pub reject_reason: Option<String>,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// NewPost
///
/// Insert payload for a post. The status is not part of it: every post starts `pending`.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub category_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub media_type: MediaType,
    pub media_path: String,
}

/// Like
///
/// One row of the `likes` table. `(post_id, user_id)` is the composite primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Like {
    pub post_id: i64,
    pub user_id: i64,
}

/// Comment
///
/// A row of the `comments` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// UpdatePostRequest
///
/// Partial update of a post's editable fields (PUT /posts/{id}). Status is never
/// part of an edit; it only moves through the moderation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
}

/// CreatePostForm
///
/// Shape of the multipart form accepted by POST /posts. Only used for documentation;
/// the handler reads the parts as they stream in.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct CreatePostForm {
    pub title: String,
    pub description: Option<String>,
    pub category_id: i64,
    #[schema(value_type = String, format = Binary)]
    pub media: Vec<u8>,
}

/// ModerationRequest
///
/// Decision payload for PUT /admin/moderation/{id}.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ModerationRequest {
    pub status: crate::moderation::Decision,
    #[serde(default, alias = "message", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// CategoryRequest
///
/// Input for creating or renaming a category. The slug is always derived server-side.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryRequest {
    pub name: String,
}

/// CreateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: String,
}

/// UpdateCommentRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateCommentRequest {
    pub content: String,
}

/// SignUpRequest
///
/// Registration payload for POST /auth/sign-up. New accounts always get role `user`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignUpRequest {
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// SignInRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// UpdateProfileRequest
///
/// Partial update of the requester's own profile (PUT /me). An empty description
/// clears it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// AvatarForm
///
/// Shape of the multipart form accepted by PUT /me/avatar. Documentation only.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct AvatarForm {
    #[schema(value_type = String, format = Binary)]
    pub avatar: Vec<u8>,
}

// --- Response Schemas (Output) ---

/// UserBrief
///
/// Author block embedded in posts and comments. `avatar` is "" when none is set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UserBrief {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub avatar: String,
}

impl From<&User> for UserBrief {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            nickname: user.nickname.clone(),
            avatar: user.avatar.clone().unwrap_or_default(),
        }
    }
}

/// CategoryBrief
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CategoryBrief {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl From<&Category> for CategoryBrief {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
        }
    }
}

/// ExternalPost
///
/// The externally visible representation of a post: the raw record joined with its
/// author, category and the requester's like state.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct ExternalPost {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub media_type: MediaType,
    pub media_url: String,
    #[serde(rename = "user")]
    pub author: UserBrief,
    pub category: CategoryBrief,
    pub status: PostStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    pub likes_count: i64,
    pub is_liked: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// FeedPage
///
/// One page of a feed. `total` counts every item matching the filter, independent of
/// pagination, and `total_pages = ceil(total / per_page)`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct FeedPage {
    pub items: Vec<ExternalPost>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// CreatedPost
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatedPost {
    pub id: i64,
    pub status: PostStatus,
}

/// LikeState
///
/// Result of a like/unlike action, with the fresh aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct LikeState {
    pub post_id: i64,
    pub likes_count: i64,
    pub is_liked: bool,
}

/// CommentResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub content: String,
    #[serde(rename = "user")]
    pub author: UserBrief,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserProfile
///
/// Output schema for GET /me and GET /users/{id}. `email` is only filled in for the
/// account's own profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: UserBrief,
    pub description: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// The public view of `user`.
    pub fn public(user: &User) -> Self {
        Self {
            user: UserBrief::from(user),
            description: user.description.clone().unwrap_or_default(),
            role: user.role,
            email: None,
            created_at: user.created_at,
        }
    }

    /// The account owner's view, which adds the email address.
    pub fn own(user: &User) -> Self {
        Self {
            email: Some(user.email.clone()),
            ..Self::public(user)
        }
    }
}

/// TokenResponse
///
/// Result of a successful sign-in. Send `token` as `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}
