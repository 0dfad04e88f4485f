use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read-only endpoints for anonymous or logged-in clients. A present but invalid
/// token is still rejected; an absent one means "anonymous".
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/sign-up, POST /auth/sign-in
        // Sign-in returns the bearer token every authenticated route expects.
        .route("/auth/sign-up", post(handlers::sign_up))
        .route("/auth/sign-in", post(handlers::sign_in))
        .route("/categories", get(handlers::list_categories))
        .route("/categories/{id}", get(handlers::get_category))
        // GET /posts?category_id=&user_id=&q=&sort_by=&sort_order=&page=&per_page=
        // Approved posts only, whatever the requester's role.
        .route("/posts", get(handlers::list_posts))
        // GET /posts/{id}
        // Hidden states are only returned to the owner or a moderator.
        .route("/posts/{id}", get(handlers::get_post))
        .route("/posts/{id}/comments", get(handlers::list_comments))
        // GET /users/{id}
        // Public profile, without the email address.
        .route("/users/{id}", get(handlers::get_user))
        // GET /users/{id}/posts
        // Includes pending and rejected posts when the requester owns them or moderates.
        .route("/users/{id}/posts", get(handlers::list_user_posts))
}
