//! End-to-end service tests on migrated `SQLite` databases.
//!
//! Most tests share one in-memory connection. The concurrency tests run on a
//! WAL file with a pool of connections so their transactions really overlap.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use vidshare_common::{AppError, LocalStorage, StorageBackend};
use vidshare_core::{
    CommentInput, CommentService, CreateUserInput, CreateVideoInput, MediaUpload, Page,
    ProgressInput, ReactionService, ReactionSummary, SearchQuery, SearchService,
    UpdateUserInput, UserService, VideoService,
};
use vidshare_db::{
    entities::{reaction::ReactionKind, user, video},
    repositories::{
        CommentRepository, ReactionRepository, ReactionTarget, SortOrder, Transition,
        UserRepository, VideoRepository, VideoSort, WatchHistoryRepository,
    },
    test_utils::TestDatabase,
};

struct Harness {
    users: UserService,
    videos: VideoService,
    comments: CommentService,
    reactions: ReactionService,
    search: SearchService,
    reaction_repo: ReactionRepository,
    storage: Arc<LocalStorage>,
    _db: TestDatabase,
}

async fn harness() -> Harness {
    harness_on(TestDatabase::sqlite().await.unwrap())
}

/// Pooled connections over a WAL file, for tests that race transactions.
async fn concurrent_harness() -> Harness {
    harness_on(TestDatabase::sqlite_file(8).await.unwrap())
}

fn harness_on(db: TestDatabase) -> Harness {
    let conn = db.shared();

    let user_repo = UserRepository::new(Arc::clone(&conn));
    let video_repo = VideoRepository::new(Arc::clone(&conn));
    let comment_repo = CommentRepository::new(Arc::clone(&conn));
    let reaction_repo = ReactionRepository::new(Arc::clone(&conn));
    let watch_history_repo = WatchHistoryRepository::new(Arc::clone(&conn));

    let storage_dir = std::env::temp_dir().join(format!("vidshare-core-{}", ulid_like()));
    let storage = Arc::new(LocalStorage::new(storage_dir, "/files".to_string()));

    Harness {
        users: UserService::new(user_repo.clone(), storage.clone()),
        videos: VideoService::new(
            video_repo.clone(),
            user_repo.clone(),
            watch_history_repo,
            storage.clone(),
        ),
        comments: CommentService::new(
            comment_repo.clone(),
            video_repo.clone(),
            user_repo.clone(),
            reaction_repo.clone(),
        ),
        reactions: ReactionService::new(reaction_repo.clone(), video_repo.clone(), comment_repo),
        search: SearchService::new(video_repo, user_repo),
        reaction_repo,
        storage,
        _db: db,
    }
}

fn ulid_like() -> String {
    vidshare_common::IdGenerator::new().generate()
}

async fn user(h: &Harness, name: &str) -> user::Model {
    h.users
        .create(
            CreateUserInput {
                username: name.to_string(),
                profile_picture: Some(format!("/files/avatars/{name}.png")),
            },
            None,
            None,
        )
        .await
        .unwrap()
}

async fn video(h: &Harness, owner: &user::Model, is_private: bool) -> video::Model {
    upload(h, owner, "Video 42", 300, is_private).await
}

async fn upload(
    h: &Harness,
    owner: &user::Model,
    title: &str,
    duration: i32,
    is_private: bool,
) -> video::Model {
    h.videos
        .upload(
            &owner.id,
            CreateVideoInput {
                title: title.to_string(),
                description: Some("the answer".to_string()),
                is_private,
                duration,
            },
            MediaUpload {
                file_name: "clip.mp4".to_string(),
                content_type: "video/mp4".to_string(),
                data: b"fake mp4 bytes".to_vec(),
            },
            None,
        )
        .await
        .unwrap()
}

fn image(name: &str) -> MediaUpload {
    MediaUpload {
        file_name: name.to_string(),
        content_type: "image/png".to_string(),
        data: b"fake png bytes".to_vec(),
    }
}

fn text(content: &str) -> CommentInput {
    CommentInput {
        content: content.to_string(),
    }
}

#[tokio::test]
async fn test_alice_and_bob_scenario() {
    let h = harness().await;
    let alice = user(&h, "alice").await;
    let bob = user(&h, "bob").await;
    let uploader = user(&h, "carol").await;
    let video_42 = video(&h, &uploader, false).await;

    let posted = h
        .comments
        .post_comment(&alice.id, &video_42.id, text("Great video!"))
        .await
        .unwrap();

    let listed = h
        .comments
        .list_comments(None, &video_42.id, Page::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].comment.content, "Great video!");
    assert_eq!(listed[0].comment.likes_count, 0);
    assert!(!listed[0].viewer_state.liked());
    assert_eq!(listed[0].author.username, "alice");

    let summary = h
        .reactions
        .set_reaction(
            &bob.id,
            &ReactionTarget::comment(&posted.comment.id),
            ReactionKind::Like,
        )
        .await
        .unwrap();
    assert_eq!(summary.likes, 1);
    assert!(summary.liked);

    let for_bob = h
        .comments
        .list_comments(Some(&bob.id), &video_42.id, Page::default())
        .await
        .unwrap();
    assert_eq!(for_bob[0].comment.likes_count, 1);
    assert!(for_bob[0].viewer_state.liked());

    let for_alice = h
        .comments
        .list_comments(Some(&alice.id), &video_42.id, Page::default())
        .await
        .unwrap();
    assert_eq!(for_alice[0].comment.likes_count, 1);
    assert!(!for_alice[0].viewer_state.liked());
}

#[tokio::test]
async fn test_like_then_dislike_moves_both_counters() {
    let h = harness().await;
    let owner = user(&h, "owner").await;
    let viewer = user(&h, "viewer").await;
    let v = video(&h, &owner, false).await;
    let target = ReactionTarget::video(&v.id);

    let before = h.reactions.summary(Some(&viewer.id), &target).await.unwrap();
    let liked = h
        .reactions
        .set_reaction(&viewer.id, &target, ReactionKind::Like)
        .await
        .unwrap();
    let disliked = h
        .reactions
        .set_reaction(&viewer.id, &target, ReactionKind::Dislike)
        .await
        .unwrap();

    assert_eq!(liked.likes, before.likes + 1);
    assert!(!disliked.liked);
    assert!(disliked.disliked);
    assert_eq!(disliked.likes, liked.likes - 1);
    assert_eq!(disliked.dislikes, before.dislikes + 1);
}

#[tokio::test]
async fn test_same_kind_twice_toggles_off_and_clear_is_idempotent() {
    let h = harness().await;
    let owner = user(&h, "owner").await;
    let viewer = user(&h, "viewer").await;
    let v = video(&h, &owner, false).await;
    let target = ReactionTarget::video(&v.id);

    h.reactions
        .set_reaction(&viewer.id, &target, ReactionKind::Dislike)
        .await
        .unwrap();
    let off = h
        .reactions
        .set_reaction(&viewer.id, &target, ReactionKind::Dislike)
        .await
        .unwrap();
    let cleared = h.reactions.clear_reaction(&viewer.id, &target).await.unwrap();

    let none = ReactionSummary {
        liked: false,
        disliked: false,
        likes: 0,
        dislikes: 0,
    };
    assert_eq!(off, none);
    assert_eq!(cleared, none);
}

#[tokio::test]
async fn test_non_author_edit_is_forbidden_and_content_unchanged() {
    let h = harness().await;
    let alice = user(&h, "alice").await;
    let mallory = user(&h, "mallory").await;
    let v = video(&h, &alice, false).await;

    let c = h
        .comments
        .post_comment(&alice.id, &v.id, text("mine"))
        .await
        .unwrap();

    let result = h
        .comments
        .edit_comment(&mallory.id, &c.comment.id, text("not anymore"))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let listed = h
        .comments
        .list_comments(None, &v.id, Page::default())
        .await
        .unwrap();
    assert_eq!(listed[0].comment.content, "mine");
    assert!(listed[0].comment.updated_at.is_none());

    let edited = h
        .comments
        .edit_comment(&alice.id, &c.comment.id, text("  mine, edited "))
        .await
        .unwrap();
    assert_eq!(edited.comment.content, "mine, edited");
    assert!(edited.comment.updated_at.is_some());
}

#[tokio::test]
async fn test_blank_comment_creates_nothing() {
    let h = harness().await;
    let alice = user(&h, "alice").await;
    let v = video(&h, &alice, false).await;

    let result = h.comments.post_comment(&alice.id, &v.id, text("   ")).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let listed = h
        .comments
        .list_comments(None, &v.id, Page::default())
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_replies_nest_once_and_delete_with_parent() {
    let h = harness().await;
    let alice = user(&h, "alice").await;
    let bob = user(&h, "bob").await;
    let v = video(&h, &alice, false).await;

    let parent = h
        .comments
        .post_comment(&alice.id, &v.id, text("parent"))
        .await
        .unwrap();
    let keep = h
        .comments
        .post_comment(&bob.id, &v.id, text("unrelated"))
        .await
        .unwrap();
    let first = h
        .comments
        .post_reply(&bob.id, &parent.comment.id, text("first reply"))
        .await
        .unwrap();
    h.comments
        .post_reply(&alice.id, &parent.comment.id, text("second reply"))
        .await
        .unwrap();
    assert_eq!(first.comment.video_id, v.id);

    let deeper = h
        .comments
        .post_reply(&alice.id, &first.comment.id, text("too deep"))
        .await;
    assert!(matches!(deeper, Err(AppError::Validation(_))));

    h.reactions
        .set_reaction(
            &alice.id,
            &ReactionTarget::comment(&first.comment.id),
            ReactionKind::Like,
        )
        .await
        .unwrap();

    let listed = h
        .comments
        .list_comments(None, &v.id, Page::default())
        .await
        .unwrap();
    let thread = listed
        .iter()
        .find(|c| c.comment.id == parent.comment.id)
        .unwrap();
    let contents: Vec<&str> = thread
        .replies
        .iter()
        .map(|r| r.comment.content.as_str())
        .collect();
    assert_eq!(contents, ["first reply", "second reply"]);

    // Replies are not deletable by others, even the video owner.
    let result = h.comments.delete_comment(&alice.id, &first.comment.id).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    h.comments
        .delete_comment(&alice.id, &parent.comment.id)
        .await
        .unwrap();

    let listed = h
        .comments
        .list_comments(None, &v.id, Page::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].comment.id, keep.comment.id);
    assert!(listed[0].replies.is_empty());

    let gone = h
        .reactions
        .set_reaction(
            &alice.id,
            &ReactionTarget::comment(&first.comment.id),
            ReactionKind::Like,
        )
        .await;
    assert!(matches!(gone, Err(AppError::CommentNotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_likes_from_distinct_users_are_all_counted() {
    const N: usize = 16;

    let h = Arc::new(concurrent_harness().await);
    let owner = user(&h, "owner").await;
    let v = video(&h, &owner, false).await;

    let mut viewers = Vec::with_capacity(N);
    for i in 0..N {
        viewers.push(user(&h, &format!("viewer_{i}")).await);
    }

    let tasks = viewers.into_iter().map(|viewer| {
        let h = Arc::clone(&h);
        let target = ReactionTarget::video(&v.id);
        tokio::spawn(async move {
            h.reactions
                .set_reaction(&viewer.id, &target, ReactionKind::Like)
                .await
        })
    });

    for result in futures::future::join_all(tasks).await {
        assert!(result.unwrap().unwrap().liked);
    }

    let target = ReactionTarget::video(&v.id);
    let summary = h.reactions.summary(None, &target).await.unwrap();
    assert_eq!(summary.likes, N as i32);
    assert_eq!(
        h.reaction_repo
            .count_by_target(&target, ReactionKind::Like)
            .await
            .unwrap(),
        N as u64
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_toggles_by_one_user_stay_consistent() {
    let h = Arc::new(concurrent_harness().await);
    let owner = user(&h, "owner").await;
    let viewer = user(&h, "viewer").await;
    let v = video(&h, &owner, false).await;

    let tasks = (0..10).map(|_| {
        let h = Arc::clone(&h);
        let viewer_id = viewer.id.clone();
        let target = ReactionTarget::video(&v.id);
        tokio::spawn(async move {
            h.reactions
                .set_reaction(&viewer_id, &target, ReactionKind::Like)
                .await
        })
    });

    let applied = futures::future::join_all(tasks)
        .await
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();

    // A caller may lose every retry, but at least one toggle gets through.
    assert!(applied >= 1);

    let target = ReactionTarget::video(&v.id);
    let summary = h.reactions.summary(Some(&viewer.id), &target).await.unwrap();
    let expect_liked = applied % 2 == 1;
    assert_eq!(summary.liked, expect_liked);
    assert_eq!(summary.likes, i32::from(expect_liked));
    assert!(!summary.disliked);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_first_likes_by_one_user_insert_once() {
    const N: usize = 8;

    let h = Arc::new(concurrent_harness().await);
    let owner = user(&h, "owner").await;
    let viewer = user(&h, "viewer").await;
    let v = video(&h, &owner, false).await;

    // Every caller read "no reaction" and now tries the same insert.
    let tasks = (0..N).map(|i| {
        let repo = h.reaction_repo.clone();
        let viewer_id = viewer.id.clone();
        let target = ReactionTarget::video(&v.id);
        tokio::spawn(async move {
            repo.apply_transition(
                format!("reaction-{i}"),
                &viewer_id,
                &target,
                None,
                Some(ReactionKind::Like),
            )
            .await
        })
    });

    let outcomes: Vec<Transition> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();
    let applied = outcomes
        .iter()
        .filter(|t| matches!(t, Transition::Applied(_)))
        .count();
    let stale = outcomes
        .iter()
        .filter(|t| matches!(t, Transition::Stale))
        .count();

    assert_eq!(applied, 1);
    assert_eq!(stale, N - 1);

    let summary = h
        .reactions
        .summary(Some(&viewer.id), &ReactionTarget::video(&v.id))
        .await
        .unwrap();
    assert!(summary.liked);
    assert_eq!(summary.likes, 1);
}

#[tokio::test]
async fn test_views_and_progress() {
    let h = harness().await;
    let owner = user(&h, "owner").await;
    let viewer = user(&h, "viewer").await;
    let v = video(&h, &owner, false).await;

    assert_eq!(h.videos.record_view(&viewer.id, &v.id).await.unwrap(), 1);
    assert_eq!(h.videos.record_view(&viewer.id, &v.id).await.unwrap(), 2);

    for position in [10, 95, 40] {
        h.videos
            .record_progress(
                &viewer.id,
                &v.id,
                ProgressInput {
                    position,
                    duration: 300,
                },
            )
            .await
            .unwrap();
    }

    let history = h
        .videos
        .watch_history(&viewer.id, Page::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entry.position, 40);
    assert_eq!(history[0].video.id, v.id);
    assert_eq!(
        h.videos.resume_position(&viewer.id, &v.id).await.unwrap(),
        Some(40)
    );
    assert_eq!(h.videos.resume_position(&owner.id, &v.id).await.unwrap(), None);

    let bad = h
        .videos
        .record_progress(
            &viewer.id,
            &v.id,
            ProgressInput {
                position: 301,
                duration: 300,
            },
        )
        .await;
    assert!(matches!(bad, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_private_video_is_owner_only() {
    let h = harness().await;
    let owner = user(&h, "owner").await;
    let stranger = user(&h, "stranger").await;
    let v = video(&h, &owner, true).await;

    assert!(h.videos.get(Some(&owner.id), &v.id).await.is_ok());
    assert!(matches!(
        h.videos.get(Some(&stranger.id), &v.id).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        h.comments
            .post_comment(&stranger.id, &v.id, text("let me in"))
            .await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        h.reactions
            .set_reaction(&stranger.id, &ReactionTarget::video(&v.id), ReactionKind::Like)
            .await,
        Err(AppError::Forbidden(_))
    ));

    assert!(
        h.videos
            .list_public(Page::default())
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        h.videos
            .list_by_user(Some(&owner.id), &owner.id, Page::default())
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(
        h.videos
            .list_by_user(Some(&stranger.id), &owner.id, Page::default())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_owner_deletes_video_with_its_comments() {
    let h = harness().await;
    let owner = user(&h, "owner").await;
    let fan = user(&h, "fan").await;
    let v = video(&h, &owner, false).await;

    h.comments
        .post_comment(&fan.id, &v.id, text("first!"))
        .await
        .unwrap();

    assert!(matches!(
        h.videos.delete(&fan.id, &v.id).await,
        Err(AppError::Forbidden(_))
    ));
    h.videos.delete(&owner.id, &v.id).await.unwrap();

    assert!(matches!(
        h.comments.list_comments(None, &v.id, Page::default()).await,
        Err(AppError::VideoNotFound(_))
    ));
}

#[tokio::test]
async fn test_search_trending_and_latest() {
    let h = harness().await;
    let alice = user(&h, "alice").await;
    let bob = user(&h, "bob").await;
    let intro = upload(&h, &alice, "Rust intro", 120, false).await;
    let deep = upload(&h, &bob, "Deep dive into RUST", 3600, false).await;
    let cats = upload(&h, &alice, "Cats", 30, false).await;
    upload(&h, &alice, "Rust private notes", 60, true).await;

    for _ in 0..3 {
        h.videos.record_view(&bob.id, &cats.id).await.unwrap();
    }
    h.videos.record_view(&bob.id, &deep.id).await.unwrap();

    let ids = |videos: Vec<video::Model>| -> Vec<String> {
        videos.into_iter().map(|v| v.id).collect()
    };

    let found = h
        .search
        .search_videos(SearchQuery {
            query: Some("rust".to_string()),
            sort_by: VideoSort::Duration,
            sort_order: SortOrder::Asc,
            limit: 10,
            ..SearchQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(ids(found), vec![intro.id.clone(), deep.id.clone()]);

    let by_alice = h
        .search
        .search_videos(SearchQuery {
            uploader: Some("alice".to_string()),
            max_duration: Some(100),
            limit: 10,
            ..SearchQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(ids(by_alice), vec![cats.id.clone()]);

    let trending = h.search.trending(2).await.unwrap();
    assert_eq!(ids(trending), vec![cats.id.clone(), deep.id.clone()]);

    let latest = h.search.latest(10).await.unwrap();
    assert_eq!(latest.len(), 3);
    assert!(latest.iter().all(|v| !v.is_private));
}

#[tokio::test]
async fn test_thumbnail_replacement_removes_old_file() {
    let h = harness().await;
    let owner = user(&h, "owner").await;
    let other = user(&h, "other").await;
    let v = video(&h, &owner, false).await;
    assert!(v.thumbnail_key.is_none());

    let first = h
        .videos
        .replace_thumbnail(&owner.id, &v.id, image("a.png"))
        .await
        .unwrap();
    let first_key = first.thumbnail_key.clone().unwrap();
    assert!(h.storage.exists(&first_key).await.unwrap());
    assert!(first.thumbnail_url.unwrap().ends_with(&first_key));

    let second = h
        .videos
        .replace_thumbnail(&owner.id, &v.id, image("b.png"))
        .await
        .unwrap();
    let second_key = second.thumbnail_key.unwrap();
    assert_ne!(first_key, second_key);
    assert!(!h.storage.exists(&first_key).await.unwrap());
    assert!(h.storage.exists(&second_key).await.unwrap());

    assert!(matches!(
        h.videos.replace_thumbnail(&other.id, &v.id, image("c.png")).await,
        Err(AppError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_profile_rename_and_picture() {
    let h = harness().await;
    let alice = user(&h, "alice").await;
    user(&h, "bob").await;

    let taken = h
        .users
        .update(
            &alice.id,
            UpdateUserInput {
                username: Some("bob".to_string()),
            },
        )
        .await;
    assert!(matches!(taken, Err(AppError::Conflict(_))));

    let renamed = h
        .users
        .update(
            &alice.id,
            UpdateUserInput {
                username: Some("alice_v2".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.username, "alice_v2");
    assert_eq!(h.users.get_by_username("alice_v2").await.unwrap().id, alice.id);
    assert!(matches!(
        h.users.get_by_username("alice").await,
        Err(AppError::UserNotFound(_))
    ));

    let first = h.users.set_profile_picture(&alice.id, image("me.png")).await.unwrap();
    let first_key = first.profile_picture_key.clone().unwrap();
    assert_eq!(first.profile_picture, Some(format!("/files/{first_key}")));

    let second = h.users.set_profile_picture(&alice.id, image("me2.png")).await.unwrap();
    assert!(!h.storage.exists(&first_key).await.unwrap());
    assert!(
        h.storage
            .exists(&second.profile_picture_key.unwrap())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_comment_count_includes_replies() {
    let h = harness().await;
    let alice = user(&h, "alice").await;
    let v = video(&h, &alice, false).await;

    let parent = h
        .comments
        .post_comment(&alice.id, &v.id, text("parent"))
        .await
        .unwrap();
    h.comments
        .post_reply(&alice.id, &parent.comment.id, text("reply"))
        .await
        .unwrap();

    assert_eq!(h.comments.count_comments(None, &v.id).await.unwrap(), 2);
}
