use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the authentication layer, so each handler receives a
/// resolved `AuthUser`. Ownership checks happen in the services.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/me", get(handlers::get_me).put(handlers::update_me))
        // PUT /me/avatar (multipart: avatar)
        .route("/me/avatar", put(handlers::update_avatar))
        // GET /me/likes
        // Approved posts the requester liked, `is_liked` always true.
        .route("/me/likes", get(handlers::list_liked_posts))
        // POST /posts (multipart: title, description, category_id, media)
        .route("/posts", post(handlers::create_post))
        // PUT/DELETE /posts/{id}
        // Owner or moderator.
        .route(
            "/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // POST/DELETE /posts/{id}/like
        // The (post, user) pair is unique; a repeated like is a 409.
        .route(
            "/posts/{id}/like",
            post(handlers::like_post).delete(handlers::unlike_post),
        )
        .route("/posts/{id}/comments", post(handlers::add_comment))
        // PUT/DELETE /comments/{id}
        // Author or moderator.
        .route(
            "/comments/{id}",
            put(handlers::update_comment).delete(handlers::delete_comment),
        )
}
