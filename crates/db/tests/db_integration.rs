//! Database integration tests against an in-memory `SQLite` database.
//!
//! The schema is built by the same migrations production runs, so these
//! tests cover constraints and multi-statement deletes the mock can't.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, Set};
use vidshare_db::entities::{
    comment,
    reaction::{ReactionKind, TargetType},
    user, video, watch_history,
};
use vidshare_db::repositories::{
    CommentRepository, ReactionRepository, ReactionTarget, SortOrder, Transition,
    UserRepository, VideoFilter, VideoRepository, VideoSort, WatchHistoryRepository,
};

async fn setup() -> Arc<DatabaseConnection> {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    vidshare_db::migrate(&db).await.unwrap();
    Arc::new(db)
}

async fn seed_user(db: &Arc<DatabaseConnection>, id: &str) -> user::Model {
    UserRepository::new(Arc::clone(db))
        .create(user::ActiveModel {
            id: Set(id.to_string()),
            username: Set(format!("name-{id}")),
            profile_picture: Set(None),
            profile_picture_key: Set(None),
            token: Set(Some(format!("token-{id}"))),
            token_expires_at: Set(None),
            created_at: Set(Utc::now().into()),
        })
        .await
        .unwrap()
}

async fn seed_video(db: &Arc<DatabaseConnection>, id: &str, owner: &str) -> video::Model {
    VideoRepository::new(Arc::clone(db))
        .create(video::ActiveModel {
            id: Set(id.to_string()),
            user_id: Set(owner.to_string()),
            title: Set("Clip".to_string()),
            description: Set(None),
            file_key: Set(format!("videos/{id}.mp4")),
            file_url: Set(format!("/files/videos/{id}.mp4")),
            file_md5: Set("d41d8cd98f00b204e9800998ecf8427e".to_string()),
            content_type: Set("video/mp4".to_string()),
            size: Set(0),
            thumbnail_key: Set(None),
            thumbnail_url: Set(None),
            duration: Set(120),
            is_private: Set(false),
            views_count: Set(0),
            likes_count: Set(0),
            dislikes_count: Set(0),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        })
        .await
        .unwrap()
}

async fn seed_comment(
    db: &Arc<DatabaseConnection>,
    id: &str,
    video_id: &str,
    user_id: &str,
    parent_id: Option<&str>,
) -> comment::Model {
    CommentRepository::new(Arc::clone(db))
        .create(comment::ActiveModel {
            id: Set(id.to_string()),
            video_id: Set(video_id.to_string()),
            user_id: Set(user_id.to_string()),
            parent_id: Set(parent_id.map(ToString::to_string)),
            content: Set(format!("text of {id}")),
            likes_count: Set(0),
            dislikes_count: Set(0),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_second_insert_for_same_user_is_stale() {
    let db = setup().await;
    seed_user(&db, "u1").await;
    seed_video(&db, "v1", "u1").await;

    let repo = ReactionRepository::new(Arc::clone(&db));
    let target = ReactionTarget::video("v1");

    let first = repo
        .apply_transition("r1".into(), "u1", &target, None, Some(ReactionKind::Like))
        .await
        .unwrap();
    let second = repo
        .apply_transition("r2".into(), "u1", &target, None, Some(ReactionKind::Like))
        .await
        .unwrap();

    assert!(matches!(first, Transition::Applied(c) if c.likes == 1));
    assert_eq!(second, Transition::Stale);
    assert_eq!(repo.counts(&target).await.unwrap().likes, 1);
    assert_eq!(
        repo.count_by_target(&target, ReactionKind::Like).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_flip_and_clear_keep_counters_in_step() {
    let db = setup().await;
    seed_user(&db, "u1").await;
    seed_video(&db, "v1", "u1").await;
    seed_comment(&db, "c1", "v1", "u1", None).await;

    let repo = ReactionRepository::new(Arc::clone(&db));
    let target = ReactionTarget::comment("c1");

    repo.apply_transition("r1".into(), "u1", &target, None, Some(ReactionKind::Like))
        .await
        .unwrap();
    let flipped = repo
        .apply_transition(
            "unused".into(),
            "u1",
            &target,
            Some(ReactionKind::Like),
            Some(ReactionKind::Dislike),
        )
        .await
        .unwrap();
    assert!(matches!(flipped, Transition::Applied(c) if c.likes == 0 && c.dislikes == 1));

    // A stale expectation must not touch the row.
    let stale = repo
        .apply_transition("unused".into(), "u1", &target, Some(ReactionKind::Like), None)
        .await
        .unwrap();
    assert_eq!(stale, Transition::Stale);

    let cleared = repo
        .apply_transition("unused".into(), "u1", &target, Some(ReactionKind::Dislike), None)
        .await
        .unwrap();
    assert!(matches!(cleared, Transition::Applied(c) if c.likes == 0 && c.dislikes == 0));
    assert_eq!(repo.find_kind("u1", &target).await.unwrap(), None);
}

#[tokio::test]
async fn test_transition_on_missing_target_rolls_back() {
    let db = setup().await;
    seed_user(&db, "u1").await;

    let repo = ReactionRepository::new(Arc::clone(&db));
    let target = ReactionTarget::video("nope");

    let result = repo
        .apply_transition("r1".into(), "u1", &target, None, Some(ReactionKind::Like))
        .await;

    assert!(result.is_err());
    assert_eq!(repo.find_kind("u1", &target).await.unwrap(), None);
}

#[tokio::test]
async fn test_delete_with_replies_removes_thread_and_reactions() {
    let db = setup().await;
    seed_user(&db, "u1").await;
    seed_video(&db, "v1", "u1").await;
    seed_comment(&db, "c1", "v1", "u1", None).await;
    seed_comment(&db, "c2", "v1", "u1", Some("c1")).await;
    seed_comment(&db, "c3", "v1", "u1", None).await;

    let reactions = ReactionRepository::new(Arc::clone(&db));
    reactions
        .apply_transition(
            "r1".into(),
            "u1",
            &ReactionTarget::comment("c2"),
            None,
            Some(ReactionKind::Like),
        )
        .await
        .unwrap();

    let comments = CommentRepository::new(Arc::clone(&db));
    comments.delete_with_replies("c1").await.unwrap();

    assert!(comments.find_by_id("c1").await.unwrap().is_none());
    assert!(comments.find_by_id("c2").await.unwrap().is_none());
    assert!(comments.find_by_id("c3").await.unwrap().is_some());
    assert!(
        reactions
            .find_for_targets("u1", TargetType::Comment, &["c2".to_string()])
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_watch_history_upsert_last_write_wins() {
    let db = setup().await;
    seed_user(&db, "u1").await;
    seed_video(&db, "v1", "u1").await;

    let repo = WatchHistoryRepository::new(Arc::clone(&db));
    for (id, position) in [("w1", 10), ("w2", 45), ("w3", 30)] {
        repo.upsert(watch_history::ActiveModel {
            id: Set(id.to_string()),
            user_id: Set("u1".to_string()),
            video_id: Set("v1".to_string()),
            position: Set(position),
            duration: Set(120),
            updated_at: Set(Utc::now().into()),
        })
        .await
        .unwrap();
    }

    let history = repo.find_by_user("u1", 10, 0).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].position, 30);
}

#[tokio::test]
async fn test_video_delete_cascade() {
    let db = setup().await;
    seed_user(&db, "u1").await;
    seed_video(&db, "v1", "u1").await;
    seed_comment(&db, "c1", "v1", "u1", None).await;
    seed_comment(&db, "c2", "v1", "u1", Some("c1")).await;

    let reactions = ReactionRepository::new(Arc::clone(&db));
    reactions
        .apply_transition(
            "r1".into(),
            "u1",
            &ReactionTarget::video("v1"),
            None,
            Some(ReactionKind::Dislike),
        )
        .await
        .unwrap();

    let videos = VideoRepository::new(Arc::clone(&db));
    assert_eq!(videos.increment_views_count("v1").await.unwrap(), 1);
    videos.delete_cascade("v1").await.unwrap();

    assert!(videos.find_by_id("v1").await.unwrap().is_none());
    let comments = CommentRepository::new(Arc::clone(&db));
    assert_eq!(comments.count_by_video("v1").await.unwrap(), 0);
    assert_eq!(reactions.find_kind("u1", &ReactionTarget::video("v1")).await.unwrap(), None);
    assert!(matches!(
        videos.delete_cascade("v1").await,
        Err(vidshare_common::AppError::VideoNotFound(_))
    ));
}

async fn seed_titled(
    db: &Arc<DatabaseConnection>,
    id: &str,
    owner: &str,
    title: &str,
    duration: i32,
    views: i64,
    is_private: bool,
) {
    let mut model: video::ActiveModel = seed_video(db, id, owner).await.into();
    model.title = Set(title.to_string());
    model.duration = Set(duration);
    model.views_count = Set(views);
    model.is_private = Set(is_private);
    VideoRepository::new(Arc::clone(db)).update(model).await.unwrap();
}

fn ids(videos: &[video::Model]) -> Vec<&str> {
    videos.iter().map(|v| v.id.as_str()).collect()
}

#[tokio::test]
async fn test_search_filters_and_sorts_public_videos() {
    let db = setup().await;
    seed_user(&db, "u1").await;
    seed_user(&db, "u2").await;
    seed_titled(&db, "v1", "u1", "Rust Basics", 300, 50, false).await;
    seed_titled(&db, "v2", "u2", "Advanced RUST", 1200, 10, false).await;
    seed_titled(&db, "v3", "u1", "Cooking", 60, 99, false).await;
    seed_titled(&db, "v4", "u1", "rust secrets", 400, 70, true).await;

    let repo = VideoRepository::new(Arc::clone(&db));

    let by_text = VideoFilter {
        text: Some("rust".to_string()),
        sort: VideoSort::Views,
        ..VideoFilter::default()
    };
    assert_eq!(ids(&repo.search(&by_text, 10, 0).await.unwrap()), vec!["v1", "v2"]);

    let by_uploader = VideoFilter {
        user_id: Some("u1".to_string()),
        sort: VideoSort::Duration,
        order: SortOrder::Asc,
        ..VideoFilter::default()
    };
    assert_eq!(ids(&repo.search(&by_uploader, 10, 0).await.unwrap()), vec!["v3", "v1"]);

    let by_length = VideoFilter {
        min_duration: Some(100),
        max_duration: Some(1200),
        sort: VideoSort::Duration,
        ..VideoFilter::default()
    };
    assert_eq!(ids(&repo.search(&by_length, 10, 0).await.unwrap()), vec!["v2", "v1"]);

    let paged = VideoFilter {
        sort: VideoSort::Views,
        ..VideoFilter::default()
    };
    assert_eq!(ids(&repo.search(&paged, 1, 1).await.unwrap()), vec!["v1"]);
}

#[tokio::test]
async fn test_search_text_wildcards_match_literally() {
    let db = setup().await;
    seed_user(&db, "u1").await;
    seed_titled(&db, "v1", "u1", "100% done", 10, 0, false).await;
    seed_titled(&db, "v2", "u1", "1000 done", 10, 0, false).await;

    let repo = VideoRepository::new(Arc::clone(&db));
    let filter = VideoFilter {
        text: Some("0%".to_string()),
        ..VideoFilter::default()
    };

    assert_eq!(ids(&repo.search(&filter, 10, 0).await.unwrap()), vec!["v1"]);
}
