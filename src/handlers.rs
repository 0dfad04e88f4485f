use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, Result},
    feed::{FeedFilter, FeedParams},
    models::{
        AvatarForm, Category, CategoryRequest, CommentResponse, CreateCommentRequest, CreatePostForm,
        CreatedPost, ExternalPost, FeedPage, LikeState, ModerationRequest, SignInRequest,
        SignUpRequest, TokenResponse, UpdateCommentRequest, UpdatePostRequest, UpdateProfileRequest,
        UserProfile,
    },
    services::NewPostInput,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
};

/// Feed query strings that fail to deserialize (e.g. `page=abc`) are reported in the
/// regular error envelope instead of axum's plain-text rejection.
fn feed_filter(params: std::result::Result<Query<FeedParams>, QueryRejection>) -> Result<FeedFilter> {
    let Query(params) = params.map_err(|e| AppError::validation("query", e.body_text()))?;
    FeedFilter::from_params(params)
}

// --- Accounts ---

/// sign_up
///
/// [Public Route] Registers a new `user`-role account.
#[utoipa::path(
    post,
    path = "/auth/sign-up",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email taken")
    )
)]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    let profile = state.services.auth.sign_up(payload).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// sign_in
///
/// [Public Route] Exchanges email and password for a bearer token.
#[utoipa::path(
    post,
    path = "/auth/sign-in",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenResponse),
        (status = 401, description = "Wrong email or password")
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> Result<Json<TokenResponse>> {
    Ok(Json(state.services.auth.sign_in(payload).await?))
}

// --- Posts & Feeds ---

/// list_posts
///
/// [Public Route] The public feed. Approved posts only, filtered, sorted and paginated.
#[utoipa::path(
    get,
    path = "/posts",
    params(FeedParams),
    responses(
        (status = 200, description = "One page of approved posts", body = FeedPage),
        (status = 400, description = "Invalid filter")
    )
)]
pub async fn list_posts(
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    params: std::result::Result<Query<FeedParams>, QueryRejection>,
) -> Result<Json<FeedPage>> {
    let filter = feed_filter(params)?;
    let page = state.services.posts.list_posts(&filter, requester.as_ref()).await?;
    Ok(Json(page))
}

/// get_post
///
/// [Public Route] A single post. Pending and rejected posts are only returned to their
/// owner and to moderators; anyone else gets 403.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = ExternalPost),
        (status = 403, description = "Not visible to the requester"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post(
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ExternalPost>> {
    Ok(Json(state.services.posts.get_post(id, requester.as_ref()).await?))
}

/// list_user_posts
///
/// [Public Route] Posts of one user. The owner and moderators also see pending and
/// rejected posts.
#[utoipa::path(
    get,
    path = "/users/{id}/posts",
    params(("id" = i64, Path, description = "Owner ID"), FeedParams),
    responses(
        (status = 200, description = "One page of the user's posts", body = FeedPage),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn list_user_posts(
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
    params: std::result::Result<Query<FeedParams>, QueryRejection>,
) -> Result<Json<FeedPage>> {
    let filter = feed_filter(params)?;
    let page = state
        .services
        .posts
        .list_user_posts(owner_id, &filter, requester.as_ref())
        .await?;
    Ok(Json(page))
}

/// list_liked_posts
///
/// [Authenticated Route] Approved posts the requester has liked.
#[utoipa::path(
    get,
    path = "/me/likes",
    params(FeedParams),
    responses((status = 200, description = "Liked posts", body = FeedPage))
)]
pub async fn list_liked_posts(
    user: AuthUser,
    State(state): State<AppState>,
    params: std::result::Result<Query<FeedParams>, QueryRejection>,
) -> Result<Json<FeedPage>> {
    let filter = feed_filter(params)?;
    Ok(Json(state.services.posts.list_liked_posts(&user, &filter).await?))
}

/// create_post
///
/// [Authenticated Route] Multipart upload of a new post. The post starts `pending`
/// and only becomes public once a moderator approves it.
#[utoipa::path(
    post,
    path = "/posts",
    request_body(content = CreatePostForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Created", body = CreatedPost),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_post(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreatedPost>)> {
    let mut input = NewPostInput::default();
    let mut category_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation("body", e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "media" => {
                input.content_type = field.content_type().unwrap_or_default().to_string();
                input.media = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation("media", e.body_text()))?
                    .to_vec();
            }
            "title" | "description" | "category_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(name.clone(), e.body_text()))?;
                match name.as_str() {
                    "title" => input.title = text,
                    "description" => input.description = Some(text),
                    _ => category_id = Some(text),
                }
            }
            // Unknown parts are ignored.
            _ => {}
        }
    }

    input.category_id = category_id
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| AppError::validation("category_id", "is required"))?
        .parse()
        .map_err(|_| AppError::validation("category_id", "must be an integer"))?;

    let created = state.services.posts.create_post(id, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_post
///
/// [Authenticated Route] Edits title, description or category. Owner or moderator only.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = ExternalPost),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<ExternalPost>> {
    Ok(Json(state.services.posts.update_post(id, &user, payload).await?))
}

/// delete_post
///
/// [Authenticated Route] Deletes a post with its likes, comments and media.
/// Owner or moderator only.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.services.posts.delete_post(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Likes ---

/// like_post
///
/// [Authenticated Route] Likes a visible post. A second like is a 409.
#[utoipa::path(
    post,
    path = "/posts/{id}/like",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Liked", body = LikeState),
        (status = 409, description = "Already liked")
    )
)]
pub async fn like_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LikeState>> {
    Ok(Json(state.services.likes.like(id, &user).await?))
}

/// unlike_post
///
/// [Authenticated Route] Removes the requester's like.
#[utoipa::path(
    delete,
    path = "/posts/{id}/like",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Unliked", body = LikeState),
        (status = 404, description = "No like to remove")
    )
)]
pub async fn unlike_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LikeState>> {
    Ok(Json(state.services.likes.unlike(id, &user).await?))
}

// --- Comments ---

/// list_comments
///
/// [Public Route] Comments of a post the requester can see, oldest first.
#[utoipa::path(
    get,
    path = "/posts/{id}/comments",
    params(("id" = i64, Path, description = "Post ID")),
    responses((status = 200, description = "Comments", body = [CommentResponse]))
)]
pub async fn list_comments(
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<CommentResponse>>> {
    Ok(Json(
        state
            .services
            .comments
            .list_comments(post_id, requester.as_ref())
            .await?,
    ))
}

/// add_comment
///
/// [Authenticated Route] Comments on a post the requester can see.
#[utoipa::path(
    post,
    path = "/posts/{id}/comments",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses((status = 201, description = "Comment Added", body = CommentResponse))
)]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    let comment = state
        .services
        .comments
        .add_comment(post_id, &user, &payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// update_comment
///
/// [Authenticated Route] Author or moderator only.
#[utoipa::path(
    put,
    path = "/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated", body = CommentResponse),
        (status = 403, description = "Not the author")
    )
)]
pub async fn update_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>> {
    Ok(Json(
        state
            .services
            .comments
            .update_comment(id, &user, &payload.content)
            .await?,
    ))
}

/// delete_comment
///
/// [Authenticated Route] Author or moderator only.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.services.comments.delete_comment(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Profile ---

/// get_me
///
/// [Authenticated Route] The requester's own brief and role.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> Result<Json<UserProfile>> {
    Ok(Json(state.services.users.profile(&user).await?))
}

/// update_me
///
/// [Authenticated Route] Changes the requester's nickname or description.
#[utoipa::path(
    put,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>> {
    Ok(Json(state.services.users.update_profile(&user, payload).await?))
}

/// update_avatar
///
/// [Authenticated Route] Multipart upload of a new avatar image (part `avatar`).
#[utoipa::path(
    put,
    path = "/me/avatar",
    request_body(content = AvatarForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 400, description = "Missing or unsupported image")
    )
)]
pub async fn update_avatar(
    user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UserProfile>> {
    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation("body", e.body_text()))?
    {
        if field.name() == Some("avatar") {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::validation("avatar", e.body_text()))?;
            image = Some((bytes.to_vec(), content_type));
        }
    }

    let (bytes, content_type) = image.ok_or_else(|| AppError::validation("avatar", "is required"))?;
    Ok(Json(
        state
            .services
            .users
            .update_avatar(&user, bytes, &content_type)
            .await?,
    ))
}

/// get_user
///
/// [Public Route] Public profile of any user. The email address is not included.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<UserProfile>> {
    Ok(Json(state.services.users.public_profile(id).await?))
}

// --- Categories ---

/// list_categories
///
/// [Public Route]
#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "All categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.services.categories.list().await?))
}

/// get_category
///
/// [Public Route]
#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Found", body = Category),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_category(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Category>> {
    Ok(Json(state.services.categories.get(id).await?))
}

/// create_category
///
/// [Moderator Route] The slug is derived from the name and must be unique.
#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 409, description = "Slug taken")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>)> {
    let category = state.services.categories.create(&payload.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category
///
/// [Moderator Route] Renames a category and regenerates its slug.
#[utoipa::path(
    put,
    path = "/admin/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 409, description = "Slug taken")
    )
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CategoryRequest>,
) -> Result<Json<Category>> {
    Ok(Json(state.services.categories.update(id, &payload.name).await?))
}

/// delete_category
///
/// [Moderator Route] Refused with 409 while posts still use the category.
#[utoipa::path(
    delete,
    path = "/admin/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 409, description = "Category in use")
    )
)]
pub async fn delete_category(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode> {
    state.services.categories.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Moderation ---

/// list_moderation_queue
///
/// [Moderator Route] Pending posts awaiting a decision.
#[utoipa::path(
    get,
    path = "/admin/moderation",
    params(FeedParams),
    responses(
        (status = 200, description = "Pending posts", body = FeedPage),
        (status = 403, description = "Not a moderator")
    )
)]
pub async fn list_moderation_queue(
    moderator: AuthUser,
    State(state): State<AppState>,
    params: std::result::Result<Query<FeedParams>, QueryRejection>,
) -> Result<Json<FeedPage>> {
    let filter = feed_filter(params)?;
    Ok(Json(
        state
            .services
            .posts
            .list_moderation_queue(&moderator, &filter)
            .await?,
    ))
}

/// moderate_post
///
/// [Moderator Route] Approves or rejects a post. Repeating the same approval is not
/// an error; reversing a decision is a 409.
#[utoipa::path(
    put,
    path = "/admin/moderation/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = ModerationRequest,
    responses(
        (status = 200, description = "Moderated", body = ExternalPost),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Conflicting decision")
    )
)]
pub async fn moderate_post(
    moderator: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ModerationRequest>,
) -> Result<Json<ExternalPost>> {
    let post = state
        .services
        .posts
        .moderate(id, &moderator, payload.status, payload.reason)
        .await?;
    Ok(Json(post))
}
