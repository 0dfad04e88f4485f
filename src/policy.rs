use crate::auth::AuthUser;
use crate::models::{Post, PostStatus};

/// can_view
///
/// Whether `requester` may see `post` at all, regardless of listing context.
/// Approved posts are public. Pending and rejected posts are visible to their owner
/// and to moderators/admins only. Not being visible is an answer, not an error.
pub fn can_view(post: &Post, requester: Option<&AuthUser>) -> bool {
    if post.status == PostStatus::Approved {
        return true;
    }
    match requester {
        Some(subject) => owns_or_moderates(post.user_id, subject),
        None => false,
    }
}

/// True when `subject` owns the resource or holds a moderator/admin role.
pub fn owns_or_moderates(owner_id: i64, subject: &AuthUser) -> bool {
    subject.id == owner_id || subject.role.is_moderator()
}
