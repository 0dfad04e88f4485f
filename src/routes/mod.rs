//! Routers split by access level. Access control is attached per router in
//! `create_router`, so a handler's location decides who can reach it.

/// Anonymous-or-subject routes. Handlers apply the visibility policy themselves.
pub mod public;

/// Routes behind the `AuthUser` layer.
pub mod authenticated;

/// Moderation surface, mounted under `/admin` behind `require_moderator`.
pub mod admin;
