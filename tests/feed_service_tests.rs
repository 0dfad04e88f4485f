mod common;

use common::Fixture;
use designhub_feed::{
    AppError,
    feed::{FeedFilter, SortBy, SortOrder},
    models::{PostStatus, UpdatePostRequest},
};

fn page(page: i64, per_page: i64) -> FeedFilter {
    FeedFilter {
        page,
        per_page,
        ..FeedFilter::default()
    }
}

#[tokio::test]
async fn public_feed_never_contains_hidden_posts() {
    let f = Fixture::new().await;
    let approved = f.approved(&f.owner, "Approved one").await;
    f.pending(&f.owner, "Still pending").await;
    f.rejected(&f.owner, "Turned down", "off topic").await;

    for requester in [None, Some(&f.owner), Some(&f.moderator)] {
        let feed = f
            .services
            .posts
            .list_posts(&FeedFilter::default(), requester)
            .await
            .unwrap();
        assert_eq!(feed.total, 1);
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].id, approved);
        assert_eq!(feed.items[0].status, PostStatus::Approved);
    }
}

#[tokio::test]
async fn second_page_by_date_ascending() {
    let f = Fixture::new().await;
    let mut ids = Vec::new();
    for n in 1..=5 {
        ids.push(f.approved(&f.owner, &format!("Post t{}", n)).await);
    }

    let filter = FeedFilter {
        sort_by: SortBy::Date,
        sort_order: SortOrder::Asc,
        ..page(2, 2)
    };
    let feed = f.services.posts.list_posts(&filter, None).await.unwrap();

    let returned: Vec<i64> = feed.items.iter().map(|p| p.id).collect();
    assert_eq!(returned, vec![ids[2], ids[3]]);
    assert_eq!(feed.total, 5);
    assert_eq!(feed.total_pages, 3);
    assert_eq!(feed.page, 2);
    assert_eq!(feed.per_page, 2);
}

#[tokio::test]
async fn pages_add_up_to_total_and_overshoot_is_empty() {
    let f = Fixture::new().await;
    for n in 0..7 {
        f.approved(&f.owner, &format!("Numbered {}", n)).await;
    }

    let mut seen = Vec::new();
    for p in 1..=3 {
        let feed = f.services.posts.list_posts(&page(p, 3), None).await.unwrap();
        assert_eq!(feed.total, 7);
        seen.extend(feed.items.into_iter().map(|i| i.id));
    }
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 7);

    let beyond = f.services.posts.list_posts(&page(9, 3), None).await.unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 7);
    assert_eq!(beyond.total_pages, 3);
}

#[tokio::test]
async fn popularity_descending_orders_by_like_count() {
    let f = Fixture::new().await;
    let quiet = f.approved(&f.owner, "Quiet post").await;
    let loud = f.approved(&f.owner, "Loud post").await;
    let middle = f.approved(&f.owner, "Middle post").await;

    let fans = [f.user("fan1").await, f.user("fan2").await, f.user("fan3").await];
    for fan in &fans {
        f.services.likes.like(loud, fan).await.unwrap();
    }
    f.services.likes.like(middle, &fans[0]).await.unwrap();

    let filter = FeedFilter {
        sort_by: SortBy::Popularity,
        sort_order: SortOrder::Desc,
        ..FeedFilter::default()
    };
    let feed = f.services.posts.list_posts(&filter, Some(&fans[0])).await.unwrap();

    let order: Vec<i64> = feed.items.iter().map(|p| p.id).collect();
    assert_eq!(order, vec![loud, middle, quiet]);
    for pair in feed.items.windows(2) {
        assert!(pair[0].likes_count >= pair[1].likes_count);
    }
    assert_eq!(feed.items[0].likes_count, 3);
    assert!(feed.items[0].is_liked);
    assert!(!feed.items[2].is_liked);
}

#[tokio::test]
async fn equal_keys_fall_back_to_id_order() {
    let f = Fixture::new().await;
    let a = f.approved(&f.owner, "First tie").await;
    let b = f.approved(&f.owner, "Second tie").await;

    let filter = FeedFilter {
        sort_by: SortBy::Popularity,
        ..FeedFilter::default()
    };
    for _ in 0..3 {
        let feed = f.services.posts.list_posts(&filter, None).await.unwrap();
        let order: Vec<i64> = feed.items.iter().map(|p| p.id).collect();
        assert_eq!(order, vec![a, b]);
    }
}

#[tokio::test]
async fn filters_are_conjunctive_and_search_is_case_insensitive() {
    let f = Fixture::new().await;
    let other_category = f.services.categories.create("Photography").await.unwrap();

    let mut sunset = f.input("Sunset study");
    sunset.description = Some("Warm ORANGE tones".into());
    let sunset = f.services.posts.create_post(f.owner.id, sunset).await.unwrap().id;

    let mut photo = f.input("Orange grove");
    photo.category_id = other_category.id;
    let photo = f.services.posts.create_post(f.owner.id, photo).await.unwrap().id;

    let by_stranger = f.input("Orange again");
    let by_stranger = f.services.posts.create_post(f.stranger.id, by_stranger).await.unwrap().id;

    for id in [sunset, photo, by_stranger] {
        f.services
            .posts
            .moderate(id, &f.moderator, designhub_feed::moderation::Decision::Approved, None)
            .await
            .unwrap();
    }

    let search = FeedFilter {
        search: Some("orange".into()),
        ..FeedFilter::default()
    };
    assert_eq!(f.services.posts.list_posts(&search, None).await.unwrap().total, 3);

    let narrowed = FeedFilter {
        category_id: Some(f.category.id),
        user_id: Some(f.owner.id),
        ..search
    };
    let feed = f.services.posts.list_posts(&narrowed, None).await.unwrap();
    assert_eq!(feed.total, 1);
    assert_eq!(feed.items[0].id, sunset);
}

#[tokio::test]
async fn get_post_follows_visibility() {
    let f = Fixture::new().await;
    let hidden = f.pending(&f.owner, "Work in progress").await;

    assert!(f.services.posts.get_post(hidden, Some(&f.owner)).await.is_ok());
    assert!(f.services.posts.get_post(hidden, Some(&f.moderator)).await.is_ok());
    assert!(matches!(
        f.services.posts.get_post(hidden, Some(&f.stranger)).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        f.services.posts.get_post(hidden, None).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        f.services.posts.get_post(9_999, None).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn assembled_post_carries_author_category_and_media_url() {
    let f = Fixture::new().await;
    let id = f.approved(&f.owner, "Assembled").await;

    let post = f.services.posts.get_post(id, None).await.unwrap();
    assert_eq!(post.author.id, f.owner.id);
    assert_eq!(post.author.username, "ada");
    assert_eq!(post.author.avatar, "");
    assert_eq!(post.category.slug, "illustration");
    assert!(post.media_url.starts_with("http://localhost:9000/mock-bucket/posts/post_"));
    assert!(post.media_url.ends_with(".png"));
    assert!(!post.is_liked);
    assert_eq!(post.reject_reason, None);
}

#[tokio::test]
async fn user_feed_total_matches_what_the_requester_may_see() {
    let f = Fixture::new().await;
    f.approved(&f.owner, "Public piece").await;
    f.pending(&f.owner, "Draft piece").await;
    f.rejected(&f.owner, "Rejected piece", "blurry").await;
    f.approved(&f.stranger, "Somebody else").await;

    let posts = &f.services.posts;
    let filter = FeedFilter::default();

    let own = posts.list_user_posts(f.owner.id, &filter, Some(&f.owner)).await.unwrap();
    assert_eq!(own.total, 3);
    assert_eq!(own.items.len(), 3);

    let moderated = posts
        .list_user_posts(f.owner.id, &filter, Some(&f.moderator))
        .await
        .unwrap();
    assert_eq!(moderated.total, 3);

    let stranger = posts
        .list_user_posts(f.owner.id, &filter, Some(&f.stranger))
        .await
        .unwrap();
    assert_eq!(stranger.total, 1);
    assert_eq!(stranger.items.len(), 1);

    let anonymous = posts.list_user_posts(f.owner.id, &filter, None).await.unwrap();
    assert_eq!(anonymous.total, 1);
    assert!(anonymous.items.iter().all(|p| p.author.id == f.owner.id));

    assert!(matches!(
        posts.list_user_posts(9_999, &filter, None).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn liked_feed_is_approved_only_and_marked_liked() {
    let f = Fixture::new().await;
    let liked = f.approved(&f.stranger, "Liked piece").await;
    f.approved(&f.stranger, "Ignored piece").await;
    f.services.likes.like(liked, &f.owner).await.unwrap();

    let feed = f
        .services
        .posts
        .list_liked_posts(&f.owner, &FeedFilter::default())
        .await
        .unwrap();
    assert_eq!(feed.total, 1);
    assert_eq!(feed.items[0].id, liked);
    assert!(feed.items.iter().all(|p| p.is_liked && p.status == PostStatus::Approved));
}

#[tokio::test]
async fn like_twice_conflicts_without_duplicating() {
    let f = Fixture::new().await;
    let id = f.approved(&f.owner, "Likeable").await;

    let first = f.services.likes.like(id, &f.stranger).await.unwrap();
    assert_eq!(first.likes_count, 1);
    assert!(first.is_liked);

    assert!(matches!(
        f.services.likes.like(id, &f.stranger).await,
        Err(AppError::Conflict(_))
    ));
    let post = f.services.posts.get_post(id, Some(&f.stranger)).await.unwrap();
    assert_eq!(post.likes_count, 1);
    assert!(post.is_liked);

    let after = f.services.likes.unlike(id, &f.stranger).await.unwrap();
    assert_eq!(after.likes_count, 0);
    assert!(matches!(
        f.services.likes.unlike(id, &f.stranger).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn hidden_posts_cannot_be_liked_by_strangers() {
    let f = Fixture::new().await;
    let id = f.pending(&f.owner, "Unreviewed").await;
    assert!(matches!(
        f.services.likes.like(id, &f.stranger).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(f.services.likes.like(id, &f.owner).await.is_ok());
}

#[tokio::test]
async fn create_post_validates_input() {
    let f = Fixture::new().await;
    let posts = &f.services.posts;

    let mut short = f.input("ok");
    short.title = "no".into();
    assert!(matches!(
        posts.create_post(f.owner.id, short).await,
        Err(AppError::Validation { ref field, .. }) if field == "title"
    ));

    let mut pdf = f.input("A document");
    pdf.content_type = "application/pdf".into();
    assert!(matches!(
        posts.create_post(f.owner.id, pdf).await,
        Err(AppError::Validation { ref field, .. }) if field == "media"
    ));

    let mut empty = f.input("Empty media");
    empty.media.clear();
    assert!(matches!(
        posts.create_post(f.owner.id, empty).await,
        Err(AppError::Validation { ref field, .. }) if field == "media"
    ));

    let mut orphan = f.input("No category");
    orphan.category_id = 9_999;
    assert!(matches!(
        posts.create_post(f.owner.id, orphan).await,
        Err(AppError::Validation { ref field, .. }) if field == "category_id"
    ));

    assert!(matches!(
        posts.create_post(9_999, f.input("Ghost owner")).await,
        Err(AppError::NotFound(_))
    ));

    // None of the rejected inputs left media behind.
    assert_eq!(f.storage.object_count().await, 0);

    let created = posts.create_post(f.owner.id, f.input("Valid post")).await.unwrap();
    assert_eq!(created.status, PostStatus::Pending);
    assert_eq!(f.storage.object_count().await, 1);
}

#[tokio::test]
async fn update_is_owner_or_moderator_and_keeps_status() {
    let f = Fixture::new().await;
    let id = f.rejected(&f.owner, "Needs work", "blurry").await;

    let changes = UpdatePostRequest {
        title: Some("Needs less work".into()),
        ..Default::default()
    };
    assert!(matches!(
        f.services.posts.update_post(id, &f.stranger, changes.clone()).await,
        Err(AppError::Forbidden(_))
    ));

    let updated = f.services.posts.update_post(id, &f.owner, changes).await.unwrap();
    assert_eq!(updated.title, "Needs less work");
    assert_eq!(updated.status, PostStatus::Rejected);
    assert_eq!(updated.reject_reason.as_deref(), Some("blurry"));

    let bad_category = UpdatePostRequest {
        category_id: Some(9_999),
        ..Default::default()
    };
    assert!(matches!(
        f.services.posts.update_post(id, &f.moderator, bad_category).await,
        Err(AppError::Validation { ref field, .. }) if field == "category_id"
    ));
}

#[tokio::test]
async fn delete_cascades_and_removes_media() {
    let f = Fixture::new().await;
    let id = f.approved(&f.owner, "Short lived").await;
    f.services.likes.like(id, &f.stranger).await.unwrap();
    f.services.comments.add_comment(id, &f.stranger, "nice").await.unwrap();
    assert_eq!(f.storage.object_count().await, 1);

    assert!(matches!(
        f.services.posts.delete_post(id, &f.stranger).await,
        Err(AppError::Forbidden(_))
    ));
    f.services.posts.delete_post(id, &f.owner).await.unwrap();

    assert_eq!(f.storage.object_count().await, 0);
    assert!(matches!(
        f.services.posts.get_post(id, Some(&f.owner)).await,
        Err(AppError::NotFound(_))
    ));
    let liked = f
        .services
        .posts
        .list_liked_posts(&f.stranger, &FeedFilter::default())
        .await
        .unwrap();
    assert_eq!(liked.total, 0);
}

#[tokio::test]
async fn transient_store_failure_is_retryable() {
    let f = Fixture::new().await;
    f.approved(&f.owner, "Before outage").await;

    f.repo.set_unavailable(true);
    let err = f
        .services
        .posts
        .list_posts(&FeedFilter::default(), None)
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    f.repo.set_unavailable(false);
    assert!(f.services.posts.list_posts(&FeedFilter::default(), None).await.is_ok());
}

// --- Comments ---

#[tokio::test]
async fn comment_deletion_needs_author_or_moderator() {
    let f = Fixture::new().await;
    let post = f.approved(&f.owner, "Discussed").await;
    let by_owner = f.services.comments.add_comment(post, &f.owner, "mine").await.unwrap();
    let by_stranger = f.services.comments.add_comment(post, &f.stranger, "theirs").await.unwrap();

    assert!(matches!(
        f.services.comments.delete_comment(by_owner.id, &f.stranger).await,
        Err(AppError::Forbidden(_))
    ));
    f.services.comments.delete_comment(by_owner.id, &f.owner).await.unwrap();
    f.services.comments.delete_comment(by_stranger.id, &f.moderator).await.unwrap();

    let left = f.services.comments.list_comments(post, None).await.unwrap();
    assert!(left.is_empty());
    assert!(matches!(
        f.services.comments.delete_comment(by_owner.id, &f.owner).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn comment_edit_needs_author_or_moderator() {
    let f = Fixture::new().await;
    let post = f.approved(&f.owner, "Edited thread").await;
    let comment = f.services.comments.add_comment(post, &f.owner, "frist").await.unwrap();

    assert!(matches!(
        f.services.comments.update_comment(comment.id, &f.stranger, "hijacked").await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        f.services.comments.update_comment(comment.id, &f.owner, "   ").await,
        Err(AppError::Validation { .. })
    ));

    let edited = f
        .services
        .comments
        .update_comment(comment.id, &f.owner, " first ")
        .await
        .unwrap();
    assert_eq!(edited.content, "first");
    assert_eq!(edited.author.username, "ada");

    let moderated = f
        .services
        .comments
        .update_comment(comment.id, &f.moderator, "[removed]")
        .await
        .unwrap();
    // The author stays the original writer.
    assert_eq!(moderated.author.id, f.owner.id);
    let listed = f.services.comments.list_comments(post, None).await.unwrap();
    assert_eq!(listed[0].content, "[removed]");
}

// --- Categories ---

#[tokio::test]
async fn category_rename_regenerates_the_slug() {
    let f = Fixture::new().await;
    let renamed = f
        .services
        .categories
        .update(f.category.id, "Digital  Painting!")
        .await
        .unwrap();
    assert_eq!(renamed.name, "Digital  Painting!");
    assert_eq!(renamed.slug, "digital-painting");
    assert_eq!(f.services.categories.get(f.category.id).await.unwrap().slug, "digital-painting");
}

#[tokio::test]
async fn category_rename_may_keep_its_own_slug_but_not_take_another() {
    let f = Fixture::new().await;
    let photo = f.services.categories.create("Photography").await.unwrap();

    // Same slug as before: only this category holds it.
    let same = f.services.categories.update(f.category.id, "ILLUSTRATION").await.unwrap();
    assert_eq!(same.slug, "illustration");
    assert_eq!(same.name, "ILLUSTRATION");

    assert!(matches!(
        f.services.categories.update(f.category.id, "photography").await,
        Err(AppError::Conflict(_))
    ));
    let untouched = f.services.categories.get(photo.id).await.unwrap();
    assert_eq!(untouched.name, "Photography");

    assert!(matches!(
        f.services.categories.update(9_999, "Sculpture").await,
        Err(AppError::NotFound(_))
    ));
}
