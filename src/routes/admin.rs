use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Moderator and admin endpoints. The whole router is wrapped in
/// `auth::require_moderator`, which authenticates and checks the role before any
/// handler runs; the moderation service checks the role again.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/moderation
        // Pending posts, filtered and paginated like any feed.
        .route("/moderation", get(handlers::list_moderation_queue))
        // PUT /admin/moderation/{id}
        // Body: { "status": "approved" | "rejected", "reason"?: string }
        .route("/moderation/{id}", put(handlers::moderate_post))
        .route("/categories", post(handlers::create_category))
        .route(
            "/categories/{id}",
            put(handlers::update_category).delete(handlers::delete_category),
        )
}
