use super::{PostQuery, RepoResult, Repository};
use crate::feed::{SortBy, SortOrder, StatusConstraint};
use crate::models::{
    Category, Comment, Like, NewPost, NewUser, Post, PostStatus, UpdatePostRequest, UpdateProfileRequest, User,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};

/// Column list shared by every post read. The like count is computed with the same
/// expression the popularity sort orders on.
const POST_COLUMNS: &str = r#"
    p.id, p.user_id, p.category_id, p.title, p.description,
    p.media_type, p.media_path, p.status, p.reject_reason,
    p.created_at, p.updated_at,
    (SELECT COUNT(*) FROM likes lc WHERE lc.post_id = p.id) AS likes_count
"#;

const USER_COLUMNS: &str =
    "id, username, nickname, email, password_hash, avatar, description, role, created_at, updated_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escapes LIKE metacharacters so user search text only ever matches literally.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// push_feed_predicate
///
/// Appends `FROM ... WHERE ...` for a feed query. Used verbatim by both the page
/// query and the count query so `total` is computed over exactly the same set.
fn push_feed_predicate(builder: &mut QueryBuilder<'_, Postgres>, query: &PostQuery) {
    builder.push(" FROM posts p");

    if let Some(user_id) = query.liked_by {
        builder.push(" JOIN likes l ON l.post_id = p.id AND l.user_id = ");
        builder.push_bind(user_id);
    }

    builder.push(" WHERE TRUE");

    if let StatusConstraint::Only(status) = query.status {
        builder.push(" AND p.status = ");
        builder.push_bind(status);
    }

    if let Some(category_id) = query.category_id {
        builder.push(" AND p.category_id = ");
        builder.push_bind(category_id);
    }

    if let Some(user_id) = query.user_id {
        builder.push(" AND p.user_id = ");
        builder.push_bind(user_id);
    }

    if let Some(search) = &query.search {
        let pattern = like_pattern(search);
        builder.push(" AND (p.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR COALESCE(p.description, '') ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("get_user error: {:?}", e))?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let query = format!(
            r#"INSERT INTO users (username, nickname, email, password_hash, avatar, role)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {USER_COLUMNS}"#
        );
        let created = sqlx::query_as::<_, User>(&query)
            .bind(user.username)
            .bind(user.nickname)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.avatar)
            .bind(user.role)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("get_user_by_email error: {:?}", e))?;
        Ok(user)
    }

    async fn update_user(&self, id: i64, changes: &UpdateProfileRequest) -> RepoResult<Option<User>> {
        let query = format!(
            r#"UPDATE users
               SET nickname = COALESCE($2, nickname),
                   description = CASE WHEN $3::TEXT IS NULL THEN description ELSE NULLIF($3, '') END,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(changes.nickname.clone())
            .bind(changes.description.clone())
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("update_user error: {:?}", e))?;
        Ok(user)
    }

    async fn set_user_avatar(&self, id: i64, avatar: &str) -> RepoResult<Option<User>> {
        let query = format!(
            "UPDATE users SET avatar = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(avatar)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    // --- CATEGORIES ---

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("get_category error: {:?}", e))?;
        Ok(category)
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, created_at, updated_at FROM categories ORDER BY name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("list_categories error: {:?}", e))?;
        Ok(categories)
    }

    async fn create_category(&self, name: &str, slug: &str) -> RepoResult<Category> {
        let category = sqlx::query_as::<_, Category>(
            r#"INSERT INTO categories (name, slug) VALUES ($1, $2)
               RETURNING id, name, slug, created_at, updated_at"#,
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn update_category(&self, id: i64, name: &str, slug: &str) -> RepoResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            r#"UPDATE categories SET name = $2, slug = $3, updated_at = NOW()
               WHERE id = $1
               RETURNING id, name, slug, created_at, updated_at"#,
        )
        .bind(id)
        .bind(name)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn slug_exists(&self, slug: &str, except_id: Option<i64>) -> RepoResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE slug = $1 AND ($2::BIGINT IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(except_id)
        .fetch_one(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("slug_exists error: {:?}", e))?;
        Ok(exists)
    }

    async fn category_has_posts(&self, id: i64) -> RepoResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM posts WHERE category_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    // --- POSTS ---

    /// create_post
    ///
    /// Inserts a new post. The status column default (`pending`) is the only way a
    /// post ever enters the pending state.
    async fn create_post(&self, post: NewPost) -> RepoResult<Post> {
        let query = format!(
            r#"WITH inserted AS (
                   INSERT INTO posts (user_id, category_id, title, description, media_type, media_path)
                   VALUES ($1, $2, $3, $4, $5, $6)
                   RETURNING *
               )
               SELECT {POST_COLUMNS} FROM inserted p"#
        );
        let created = sqlx::query_as::<_, Post>(&query)
            .bind(post.user_id)
            .bind(post.category_id)
            .bind(post.title)
            .bind(post.description)
            .bind(post.media_type)
            .bind(post.media_path)
            .fetch_one(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("create_post error: {:?}", e))?;
        Ok(created)
    }

    async fn get_post(&self, id: i64) -> RepoResult<Option<Post>> {
        let query = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1");
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("get_post error: {:?}", e))?;
        Ok(post)
    }

    /// query_posts
    ///
    /// Builds the page and count queries with QueryBuilder for safe parameterization.
    /// Ties are broken by `p.id ASC` so ordering is deterministic.
    async fn query_posts(&self, query: &PostQuery) -> RepoResult<(Vec<Post>, i64)> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*)");
        push_feed_predicate(&mut count, query);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("query_posts count error: {:?}", e))?;

        let mut page: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        page.push(POST_COLUMNS);
        push_feed_predicate(&mut page, query);

        page.push(match query.sort_by {
            SortBy::Popularity => " ORDER BY likes_count",
            SortBy::Date => " ORDER BY p.created_at",
        });
        page.push(match query.sort_order {
            SortOrder::Asc => " ASC",
            SortOrder::Desc => " DESC",
        });
        page.push(", p.id ASC LIMIT ");
        page.push_bind(query.limit);
        page.push(" OFFSET ");
        page.push_bind(query.offset);

        let posts = page
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("query_posts error: {:?}", e))?;

        Ok((posts, total))
    }

    /// update_post
    ///
    /// Uses `COALESCE` so only the provided fields change.
    async fn update_post(&self, id: i64, changes: &UpdatePostRequest) -> RepoResult<Option<Post>> {
        let query = format!(
            r#"WITH updated AS (
                   UPDATE posts
                   SET title = COALESCE($2, title),
                       description = COALESCE($3, description),
                       category_id = COALESCE($4, category_id),
                       updated_at = NOW()
                   WHERE id = $1
                   RETURNING *
               )
               SELECT {POST_COLUMNS} FROM updated p"#
        );
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .bind(changes.title.clone())
            .bind(changes.description.clone())
            .bind(changes.category_id)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("update_post error: {:?}", e))?;
        Ok(post)
    }

    /// set_post_status
    ///
    /// `WHERE status = $2` makes the write conditional, so a concurrent decision
    /// cannot be silently overwritten.
    async fn set_post_status(
        &self,
        id: i64,
        expected: PostStatus,
        status: PostStatus,
        reject_reason: Option<String>,
    ) -> RepoResult<Option<Post>> {
        let query = format!(
            r#"WITH updated AS (
                   UPDATE posts
                   SET status = $3, reject_reason = $4, updated_at = NOW()
                   WHERE id = $1 AND status = $2
                   RETURNING *
               )
               SELECT {POST_COLUMNS} FROM updated p"#
        );
        let post = sqlx::query_as::<_, Post>(&query)
            .bind(id)
            .bind(expected)
            .bind(status)
            .bind(reject_reason)
            .fetch_optional(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("set_post_status error: {:?}", e))?;
        Ok(post)
    }

    async fn delete_post(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("delete_post error: {:?}", e))?;
        Ok(res.rows_affected() > 0)
    }

    // --- LIKES ---

    /// insert_like
    ///
    /// `ON CONFLICT DO NOTHING` on the `(post_id, user_id)` key: a duplicate attempt
    /// writes nothing and reports `false`.
    async fn insert_like(&self, like: Like) -> RepoResult<bool> {
        let res = sqlx::query(
            "INSERT INTO likes (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(like.post_id)
        .bind(like.user_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete_like(&self, like: Like) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(like.post_id)
            .bind(like.user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn count_likes(&self, post_id: i64) -> RepoResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn is_liked(&self, like: Like) -> RepoResult<bool> {
        let liked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE post_id = $1 AND user_id = $2)",
        )
        .bind(like.post_id)
        .bind(like.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(liked)
    }

    // --- COMMENTS ---

    async fn add_comment(&self, post_id: i64, user_id: i64, content: &str) -> RepoResult<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"INSERT INTO comments (post_id, user_id, content) VALUES ($1, $2, $3)
               RETURNING id, post_id, user_id, content, created_at"#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("add_comment error: {:?}", e))?;
        Ok(comment)
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            "SELECT id, post_id, user_id, content, created_at FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn update_comment(&self, id: i64, content: &str) -> RepoResult<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"UPDATE comments SET content = $2 WHERE id = $1
               RETURNING id, post_id, user_id, content, created_at"#,
        )
        .bind(id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn list_comments(&self, post_id: i64) -> RepoResult<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"SELECT id, post_id, user_id, content, created_at
               FROM comments WHERE post_id = $1
               ORDER BY created_at ASC, id ASC"#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|e| tracing::error!("list_comments error: {:?}", e))?;
        Ok(comments)
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
