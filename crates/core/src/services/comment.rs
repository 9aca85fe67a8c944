//! Comment service: top-level comments and one level of replies.

use std::collections::HashMap;

use crate::services::{page::Page, reaction::ReactionState, video::ensure_can_view};
use chrono::Utc;
use sea_orm::Set;
use serde::Deserialize;
use vidshare_common::{AppError, AppResult, IdGenerator};
use vidshare_db::{
    entities::{comment, reaction::TargetType, user},
    repositories::{CommentRepository, ReactionRepository, UserRepository, VideoRepository},
};

/// Longest accepted comment, in characters.
pub const MAX_COMMENT_LENGTH: usize = 5000;

/// Body of a new comment, reply or edit.
///
/// Length is checked after trimming, so surrounding whitespace never counts
/// against [`MAX_COMMENT_LENGTH`].
#[derive(Debug, Clone, Deserialize)]
pub struct CommentInput {
    pub content: String,
}

impl CommentInput {
    /// Validated and trimmed content.
    fn into_content(self) -> AppResult<String> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err(AppError::Validation(
                "Comment content must not be empty".to_string(),
            ));
        }
        if content.chars().count() > MAX_COMMENT_LENGTH {
            return Err(AppError::Validation(format!(
                "Comment content must be at most {MAX_COMMENT_LENGTH} characters"
            )));
        }
        Ok(content.to_string())
    }
}

/// A comment ready for display.
#[derive(Debug, Clone)]
pub struct CommentWithAuthor {
    pub comment: comment::Model,
    pub author: user::Model,
    /// The viewer's own reaction; `None` for anonymous viewers.
    pub viewer_state: ReactionState,
    /// Oldest first. Always empty for replies.
    pub replies: Vec<CommentWithAuthor>,
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    video_repo: VideoRepository,
    user_repo: UserRepository,
    reaction_repo: ReactionRepository,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub fn new(
        comment_repo: CommentRepository,
        video_repo: VideoRepository,
        user_repo: UserRepository,
        reaction_repo: ReactionRepository,
    ) -> Self {
        Self {
            comment_repo,
            video_repo,
            user_repo,
            reaction_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Post a top-level comment on a video.
    pub async fn post_comment(
        &self,
        user_id: &str,
        video_id: &str,
        input: CommentInput,
    ) -> AppResult<CommentWithAuthor> {
        let content = input.into_content()?;
        let video = self.video_repo.get_by_id(video_id).await?;
        ensure_can_view(&video, Some(user_id))?;

        self.insert(user_id, &video.id, None, content).await
    }

    /// Reply to a top-level comment. Replies to replies are rejected.
    pub async fn post_reply(
        &self,
        user_id: &str,
        parent_id: &str,
        input: CommentInput,
    ) -> AppResult<CommentWithAuthor> {
        let content = input.into_content()?;
        let parent = self.comment_repo.get_by_id(parent_id).await?;

        if parent.is_reply() {
            return Err(AppError::Validation(
                "Cannot reply to a reply".to_string(),
            ));
        }

        let video = self.video_repo.get_by_id(&parent.video_id).await?;
        ensure_can_view(&video, Some(user_id))?;

        self.insert(user_id, &video.id, Some(parent.id), content)
            .await
    }

    /// Edit a comment. Author only.
    pub async fn edit_comment(
        &self,
        user_id: &str,
        comment_id: &str,
        input: CommentInput,
    ) -> AppResult<CommentWithAuthor> {
        let content = input.into_content()?;
        let comment = self.comment_repo.get_by_id(comment_id).await?;

        if comment.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the author can edit this comment".to_string(),
            ));
        }

        let mut model: comment::ActiveModel = comment.into();
        model.content = Set(content);
        model.updated_at = Set(Some(Utc::now().into()));
        let updated = self.comment_repo.update(model).await?;

        let author = self.user_repo.get_by_id(user_id).await?;
        let viewer_state = ReactionState::from_kind(
            self.reaction_repo
                .find_for_targets(user_id, TargetType::Comment, &[updated.id.clone()])
                .await?
                .first()
                .map(|r| r.kind),
        );

        Ok(CommentWithAuthor {
            comment: updated,
            author,
            viewer_state,
            replies: vec![],
        })
    }

    /// Delete a comment, its replies and their reactions. Author only.
    pub async fn delete_comment(&self, user_id: &str, comment_id: &str) -> AppResult<()> {
        let comment = self.comment_repo.get_by_id(comment_id).await?;

        if comment.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the author can delete this comment".to_string(),
            ));
        }

        self.comment_repo.delete_with_replies(comment_id).await?;
        tracing::debug!(comment_id = %comment_id, user_id = %user_id, "Comment deleted");
        Ok(())
    }

    /// Number of comments on a video, replies included.
    pub async fn count_comments(
        &self,
        viewer_id: Option<&str>,
        video_id: &str,
    ) -> AppResult<u64> {
        let video = self.video_repo.get_by_id(video_id).await?;
        ensure_can_view(&video, viewer_id)?;
        self.comment_repo.count_by_video(video_id).await
    }

    /// Top-level comments on a video, newest first, each with its replies.
    pub async fn list_comments(
        &self,
        viewer_id: Option<&str>,
        video_id: &str,
        page: Page,
    ) -> AppResult<Vec<CommentWithAuthor>> {
        let video = self.video_repo.get_by_id(video_id).await?;
        ensure_can_view(&video, viewer_id)?;

        let page = page.clamped();
        let top_level = self
            .comment_repo
            .find_top_level_by_video(video_id, page.limit, page.offset)
            .await?;
        let parent_ids: Vec<String> = top_level.iter().map(|c| c.id.clone()).collect();
        let replies = self.comment_repo.find_replies(&parent_ids).await?;

        let mut author_ids: Vec<String> = top_level
            .iter()
            .chain(&replies)
            .map(|c| c.user_id.clone())
            .collect();
        author_ids.sort_unstable();
        author_ids.dedup();
        let authors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let states: HashMap<String, ReactionState> = match viewer_id {
            Some(viewer) => {
                let ids: Vec<String> = top_level
                    .iter()
                    .chain(&replies)
                    .map(|c| c.id.clone())
                    .collect();
                self.reaction_repo
                    .find_for_targets(viewer, TargetType::Comment, &ids)
                    .await?
                    .into_iter()
                    .map(|r| (r.target_id, ReactionState::from_kind(Some(r.kind))))
                    .collect()
            }
            None => HashMap::new(),
        };

        let attach = |comment: comment::Model| -> Option<CommentWithAuthor> {
            let Some(author) = authors.get(&comment.user_id).cloned() else {
                tracing::warn!(comment_id = %comment.id, "Comment author missing, skipping");
                return None;
            };
            let viewer_state = states.get(&comment.id).copied().unwrap_or_default();
            Some(CommentWithAuthor {
                comment,
                author,
                viewer_state,
                replies: vec![],
            })
        };

        let mut replies_by_parent: HashMap<String, Vec<CommentWithAuthor>> = HashMap::new();
        for reply in replies {
            let Some(parent_id) = reply.parent_id.clone() else {
                continue;
            };
            if let Some(view) = attach(reply) {
                replies_by_parent.entry(parent_id).or_default().push(view);
            }
        }

        Ok(top_level
            .into_iter()
            .filter_map(|comment| {
                let replies = replies_by_parent.remove(&comment.id).unwrap_or_default();
                attach(comment).map(|mut view| {
                    view.replies = replies;
                    view
                })
            })
            .collect())
    }

    async fn insert(
        &self,
        user_id: &str,
        video_id: &str,
        parent_id: Option<String>,
        content: String,
    ) -> AppResult<CommentWithAuthor> {
        let author = self.user_repo.get_by_id(user_id).await?;

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            video_id: Set(video_id.to_string()),
            user_id: Set(user_id.to_string()),
            parent_id: Set(parent_id),
            content: Set(content),
            likes_count: Set(0),
            dislikes_count: Set(0),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let comment = self.comment_repo.create(model).await?;
        tracing::debug!(comment_id = %comment.id, video_id = %video_id, "Comment posted");

        Ok(CommentWithAuthor {
            comment,
            author,
            viewer_state: ReactionState::None,
            replies: vec![],
        })
    }
}
