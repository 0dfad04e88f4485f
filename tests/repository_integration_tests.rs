//! Postgres-backed gateway tests. They need a reachable database:
//!
//! ```sh
//! DATABASE_URL=postgres://... cargo test --test repository_integration_tests -- --ignored
//! ```
//!
//! Every test creates its own users and category (names carry a UUID) and only
//! queries through those, so runs never interfere with each other or with leftovers.

use designhub_feed::{
    feed::{SortBy, SortOrder, StatusConstraint},
    models::{Category, Like, MediaType, NewPost, NewUser, Post, PostStatus, Role, UpdatePostRequest,
        UpdateProfileRequest, User},
    repository::{PostQuery, PostgresRepository, RepoError, Repository},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    repo: PostgresRepository,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext {
            repo: PostgresRepository::new(pool),
        }
    }

    async fn user(&self, role: Role) -> User {
        let tag = Uuid::new_v4().simple().to_string();
        self.repo
            .create_user(NewUser {
                username: format!("user_{}", tag),
                nickname: "Tester".into(),
                email: format!("{}@test.local", tag),
                password_hash: "$argon2id$unused".into(),
                avatar: None,
                role,
            })
            .await
            .expect("create user")
    }

    async fn category(&self) -> Category {
        let tag = Uuid::new_v4().simple().to_string();
        self.repo
            .create_category(&format!("Cat {}", tag), &format!("cat-{}", tag))
            .await
            .expect("create category")
    }

    async fn post(&self, owner: &User, category: &Category, title: &str) -> Post {
        self.repo
            .create_post(NewPost {
                user_id: owner.id,
                category_id: category.id,
                title: title.to_string(),
                description: None,
                media_type: MediaType::Image,
                media_path: format!("posts/{}.png", Uuid::new_v4()),
            })
            .await
            .expect("create post")
    }

    async fn approve(&self, post: &Post) -> Post {
        self.repo
            .set_post_status(post.id, PostStatus::Pending, PostStatus::Approved, None)
            .await
            .expect("approve")
            .expect("post was pending")
    }
}

fn owned_by(user_id: i64, status: StatusConstraint) -> PostQuery {
    PostQuery {
        status,
        category_id: None,
        user_id: Some(user_id),
        search: None,
        liked_by: None,
        sort_by: SortBy::Date,
        sort_order: SortOrder::Asc,
        limit: 100,
        offset: 0,
    }
}

// --- Tests ---

#[tokio::test]
#[ignore]
async fn new_posts_start_pending_with_zero_likes() {
    let ctx = DbTestContext::setup().await;
    let owner = ctx.user(Role::User).await;
    let category = ctx.category().await;

    let post = ctx.post(&owner, &category, "Fresh").await;
    assert_eq!(post.status, PostStatus::Pending);
    assert_eq!(post.reject_reason, None);
    assert_eq!(post.likes_count, 0);
}

#[tokio::test]
#[ignore]
async fn count_ignores_the_window_but_page_respects_it() {
    let ctx = DbTestContext::setup().await;
    let owner = ctx.user(Role::User).await;
    let category = ctx.category().await;
    let mut ids = Vec::new();
    for n in 0..5 {
        let post = ctx.post(&owner, &category, &format!("Windowed {}", n)).await;
        ids.push(ctx.approve(&post).await.id);
    }

    let query = PostQuery {
        limit: 2,
        offset: 2,
        ..owned_by(owner.id, StatusConstraint::Only(PostStatus::Approved))
    };
    let (page, total) = ctx.repo.query_posts(&query).await.unwrap();
    assert_eq!(total, 5);
    assert_eq!(page.iter().map(|p| p.id).collect::<Vec<_>>(), vec![ids[2], ids[3]]);

    let beyond = PostQuery { offset: 50, ..query };
    let (page, total) = ctx.repo.query_posts(&beyond).await.unwrap();
    assert!(page.is_empty());
    assert_eq!(total, 5);
}

#[tokio::test]
#[ignore]
async fn status_constraint_is_applied_to_page_and_count() {
    let ctx = DbTestContext::setup().await;
    let owner = ctx.user(Role::User).await;
    let category = ctx.category().await;
    let approved = ctx.post(&owner, &category, "Shown").await;
    ctx.approve(&approved).await;
    ctx.post(&owner, &category, "Hidden").await;

    let (page, total) = ctx
        .repo
        .query_posts(&owned_by(owner.id, StatusConstraint::Only(PostStatus::Approved)))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(page.len(), 1);

    let (page, total) = ctx
        .repo
        .query_posts(&owned_by(owner.id, StatusConstraint::OwnerScope(owner.id)))
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(page.len(), 2);
}

#[tokio::test]
#[ignore]
async fn search_is_case_insensitive_and_literal() {
    let ctx = DbTestContext::setup().await;
    let owner = ctx.user(Role::User).await;
    let category = ctx.category().await;
    ctx.approve(&ctx.post(&owner, &category, "100% Sunset").await).await;
    ctx.approve(&ctx.post(&owner, &category, "1000 sunsets").await).await;

    let query = |search: &str| PostQuery {
        search: Some(search.to_string()),
        ..owned_by(owner.id, StatusConstraint::Only(PostStatus::Approved))
    };
    assert_eq!(ctx.repo.query_posts(&query("SUNSET")).await.unwrap().1, 2);
    // `%` must not act as a wildcard.
    assert_eq!(ctx.repo.query_posts(&query("100%")).await.unwrap().1, 1);
}

#[tokio::test]
#[ignore]
async fn popularity_uses_the_same_count_it_returns() {
    let ctx = DbTestContext::setup().await;
    let owner = ctx.user(Role::User).await;
    let category = ctx.category().await;
    let quiet = ctx.approve(&ctx.post(&owner, &category, "Quiet").await).await;
    let loud = ctx.approve(&ctx.post(&owner, &category, "Loud").await).await;

    for _ in 0..2 {
        let fan = ctx.user(Role::User).await;
        ctx.repo
            .insert_like(Like { post_id: loud.id, user_id: fan.id })
            .await
            .unwrap();
    }

    let query = PostQuery {
        sort_by: SortBy::Popularity,
        sort_order: SortOrder::Desc,
        ..owned_by(owner.id, StatusConstraint::Only(PostStatus::Approved))
    };
    let (page, _) = ctx.repo.query_posts(&query).await.unwrap();
    assert_eq!(page[0].id, loud.id);
    assert_eq!(page[0].likes_count, 2);
    assert_eq!(page[1].id, quiet.id);
    assert_eq!(page[1].likes_count, 0);
}

#[tokio::test]
#[ignore]
async fn duplicate_like_is_a_no_op() {
    let ctx = DbTestContext::setup().await;
    let owner = ctx.user(Role::User).await;
    let fan = ctx.user(Role::User).await;
    let category = ctx.category().await;
    let post = ctx.post(&owner, &category, "Liked once").await;
    let like = Like { post_id: post.id, user_id: fan.id };

    assert!(ctx.repo.insert_like(like).await.unwrap());
    assert!(!ctx.repo.insert_like(like).await.unwrap());
    assert_eq!(ctx.repo.count_likes(post.id).await.unwrap(), 1);
    assert!(ctx.repo.is_liked(like).await.unwrap());

    assert!(ctx.repo.delete_like(like).await.unwrap());
    assert!(!ctx.repo.delete_like(like).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn status_write_is_conditional() {
    let ctx = DbTestContext::setup().await;
    let owner = ctx.user(Role::User).await;
    let category = ctx.category().await;
    let post = ctx.post(&owner, &category, "Contested").await;

    let rejected = ctx
        .repo
        .set_post_status(post.id, PostStatus::Pending, PostStatus::Rejected, Some("blurry".into()))
        .await
        .unwrap()
        .expect("pending post accepts the write");
    assert_eq!(rejected.reject_reason.as_deref(), Some("blurry"));

    let lost = ctx
        .repo
        .set_post_status(post.id, PostStatus::Pending, PostStatus::Approved, None)
        .await
        .unwrap();
    assert!(lost.is_none());
    let current = ctx.repo.get_post(post.id).await.unwrap().unwrap();
    assert_eq!(current.status, PostStatus::Rejected);
}

#[tokio::test]
#[ignore]
async fn reason_is_present_iff_rejected() {
    let ctx = DbTestContext::setup().await;
    let owner = ctx.user(Role::User).await;
    let category = ctx.category().await;
    let post = ctx.post(&owner, &category, "Constraint check").await;

    let err = ctx
        .repo
        .set_post_status(post.id, PostStatus::Pending, PostStatus::Approved, Some("nope".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Fatal(_)));
}

#[tokio::test]
#[ignore]
async fn update_never_touches_status() {
    let ctx = DbTestContext::setup().await;
    let owner = ctx.user(Role::User).await;
    let category = ctx.category().await;
    let post = ctx.approve(&ctx.post(&owner, &category, "Before").await).await;

    let updated = ctx
        .repo
        .update_post(
            post.id,
            &UpdatePostRequest {
                title: Some("After".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "After");
    assert_eq!(updated.status, PostStatus::Approved);
    assert!(updated.updated_at >= post.updated_at);
}

#[tokio::test]
#[ignore]
async fn deleting_a_post_cascades() {
    let ctx = DbTestContext::setup().await;
    let owner = ctx.user(Role::User).await;
    let fan = ctx.user(Role::User).await;
    let category = ctx.category().await;
    let post = ctx.post(&owner, &category, "Doomed").await;
    let like = Like { post_id: post.id, user_id: fan.id };
    ctx.repo.insert_like(like).await.unwrap();
    let comment = ctx.repo.add_comment(post.id, fan.id, "bye").await.unwrap();

    assert!(ctx.repo.delete_post(post.id).await.unwrap());
    assert!(!ctx.repo.is_liked(like).await.unwrap());
    assert!(ctx.repo.get_comment(comment.id).await.unwrap().is_none());
    assert!(!ctx.repo.delete_post(post.id).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn constraint_violations_are_classified() {
    let ctx = DbTestContext::setup().await;
    let owner = ctx.user(Role::User).await;
    let category = ctx.category().await;

    let dup = ctx.repo.create_category("Again", &category.slug).await.unwrap_err();
    assert!(matches!(dup, RepoError::UniqueViolation(_)));
    assert!(ctx.repo.slug_exists(&category.slug, None).await.unwrap());
    assert!(!ctx.repo.slug_exists(&category.slug, Some(category.id)).await.unwrap());

    let orphan = ctx
        .repo
        .create_post(NewPost {
            user_id: owner.id,
            category_id: -1,
            title: "Orphan".into(),
            description: None,
            media_type: MediaType::Image,
            media_path: "posts/orphan.png".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(orphan, RepoError::ForeignKeyViolation(_)));

    ctx.post(&owner, &category, "Pins category").await;
    assert!(ctx.repo.category_has_posts(category.id).await.unwrap());
    let in_use = ctx.repo.delete_category(category.id).await.unwrap_err();
    assert!(matches!(in_use, RepoError::ForeignKeyViolation(_)));
}

#[tokio::test]
#[ignore]
async fn email_is_unique_and_profile_updates_are_partial() {
    let ctx = DbTestContext::setup().await;
    let user = ctx.user(Role::User).await;

    let found = ctx.repo.get_user_by_email(&user.email).await.unwrap().unwrap();
    assert_eq!(found.id, user.id);

    let clash = ctx
        .repo
        .create_user(NewUser {
            username: format!("other_{}", Uuid::new_v4().simple()),
            nickname: "Other".into(),
            email: user.email.clone(),
            password_hash: "$argon2id$unused".into(),
            avatar: None,
            role: Role::User,
        })
        .await
        .unwrap_err();
    assert!(matches!(clash, RepoError::UniqueViolation(_)));

    let described = ctx
        .repo
        .update_user(
            user.id,
            &UpdateProfileRequest {
                nickname: None,
                description: Some("Landscapes".into()),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(described.nickname, "Tester");
    assert_eq!(described.description.as_deref(), Some("Landscapes"));

    let cleared = ctx
        .repo
        .update_user(
            user.id,
            &UpdateProfileRequest {
                nickname: Some("Renamed".into()),
                description: Some(String::new()),
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cleared.nickname, "Renamed");
    assert_eq!(cleared.description, None);
}
