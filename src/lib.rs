use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Feed core: visibility, querying, assembly, moderation.
pub mod assembler;
pub mod feed;
pub mod moderation;
pub mod policy;

// Services, persistence and collaborators.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod services;
pub mod storage;

pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use services::Services;
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI description of every route, served at `/api-docs/openapi.json` and
/// browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::sign_up, handlers::sign_in,
        handlers::list_posts, handlers::get_post, handlers::list_user_posts,
        handlers::list_liked_posts, handlers::create_post, handlers::update_post,
        handlers::delete_post, handlers::like_post, handlers::unlike_post,
        handlers::list_comments, handlers::add_comment, handlers::update_comment,
        handlers::delete_comment, handlers::get_me, handlers::update_me, handlers::update_avatar,
        handlers::get_user, handlers::list_categories, handlers::get_category,
        handlers::create_category, handlers::update_category, handlers::delete_category,
        handlers::list_moderation_queue, handlers::moderate_post
    ),
    components(
        schemas(
            models::ExternalPost, models::FeedPage, models::CreatedPost, models::CreatePostForm,
            models::UpdatePostRequest, models::ModerationRequest, models::LikeState,
            models::CommentResponse, models::CreateCommentRequest, models::Category,
            models::CategoryRequest, models::CategoryBrief, models::UserBrief,
            models::UserProfile, models::Role, models::SignUpRequest, models::SignInRequest,
            models::TokenResponse, models::UpdateProfileRequest, models::UpdateCommentRequest,
            models::AvatarForm, models::PostStatus, models::MediaType,
            moderation::Decision,
        )
    ),
    tags(
        (name = "designhub-feed", description = "Post moderation and feed API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared state of the application: the persistence gateway, the media
/// store, the service façade built over both, and the immutable configuration.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub services: Services,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the service façade over the given collaborators.
    pub fn new(repo: RepositoryState, storage: StorageState, config: AppConfig) -> Self {
        Self {
            services: Services::new(repo.clone(), storage.clone(), config.clone()),
            repo,
            storage,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for Services {
    fn from_ref(app_state: &AppState) -> Services {
        app_state.services.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless `AuthUser` can be extracted.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the route tree, attaches the per-router access layers and the global
/// observability stack, and registers the state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_moderator,
            )),
        )
        .layer(body_limit)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span with method, uri and the request id set by
/// `SetRequestIdLayer`, so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
