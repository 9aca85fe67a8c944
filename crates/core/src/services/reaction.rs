//! Reaction service.
//!
//! A user's reaction on a target is one of three states. Liking and disliking
//! are toggles: choosing the held kind again clears it, choosing the other
//! kind swaps it. Clearing is also available as its own transition.

use crate::services::video::ensure_can_view;
use serde::Serialize;
use vidshare_common::{AppError, AppResult, IdGenerator};
use vidshare_db::{
    entities::reaction::{ReactionKind, TargetType},
    repositories::{
        CommentRepository, ReactionCounts, ReactionRepository, ReactionTarget, Transition,
        VideoRepository,
    },
};

/// Compare-and-set attempts before giving up with a conflict.
const MAX_ATTEMPTS: usize = 5;

/// A user's reaction state on one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReactionState {
    #[default]
    None,
    Liked,
    Disliked,
}

impl ReactionState {
    #[must_use]
    pub const fn from_kind(kind: Option<ReactionKind>) -> Self {
        match kind {
            None => Self::None,
            Some(ReactionKind::Like) => Self::Liked,
            Some(ReactionKind::Dislike) => Self::Disliked,
        }
    }

    #[must_use]
    pub const fn kind(self) -> Option<ReactionKind> {
        match self {
            Self::None => None,
            Self::Liked => Some(ReactionKind::Like),
            Self::Disliked => Some(ReactionKind::Dislike),
        }
    }

    /// State after the user presses `kind`.
    #[must_use]
    pub const fn toggled(self, kind: ReactionKind) -> Self {
        match (self, kind) {
            (Self::Liked, ReactionKind::Like) | (Self::Disliked, ReactionKind::Dislike) => {
                Self::None
            }
            (_, ReactionKind::Like) => Self::Liked,
            (_, ReactionKind::Dislike) => Self::Disliked,
        }
    }

    #[must_use]
    pub const fn liked(self) -> bool {
        matches!(self, Self::Liked)
    }

    #[must_use]
    pub const fn disliked(self) -> bool {
        matches!(self, Self::Disliked)
    }
}

/// Server truth after a reaction change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReactionSummary {
    pub liked: bool,
    pub disliked: bool,
    pub likes: i32,
    pub dislikes: i32,
}

impl ReactionSummary {
    #[must_use]
    pub const fn new(state: ReactionState, counts: ReactionCounts) -> Self {
        Self {
            liked: state.liked(),
            disliked: state.disliked(),
            likes: counts.likes,
            dislikes: counts.dislikes,
        }
    }
}

/// Reaction service for business logic.
#[derive(Clone)]
pub struct ReactionService {
    reaction_repo: ReactionRepository,
    video_repo: VideoRepository,
    comment_repo: CommentRepository,
    id_gen: IdGenerator,
}

impl ReactionService {
    /// Create a new reaction service.
    #[must_use]
    pub fn new(
        reaction_repo: ReactionRepository,
        video_repo: VideoRepository,
        comment_repo: CommentRepository,
    ) -> Self {
        Self {
            reaction_repo,
            video_repo,
            comment_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Press like or dislike on a target.
    pub async fn set_reaction(
        &self,
        user_id: &str,
        target: &ReactionTarget,
        kind: ReactionKind,
    ) -> AppResult<ReactionSummary> {
        self.transition(user_id, target, |current| current.toggled(kind))
            .await
    }

    /// Remove whatever reaction the user holds. Idempotent.
    pub async fn clear_reaction(
        &self,
        user_id: &str,
        target: &ReactionTarget,
    ) -> AppResult<ReactionSummary> {
        self.transition(user_id, target, |_| ReactionState::None)
            .await
    }

    /// Current reaction state of a user on a target.
    pub async fn reaction_state(
        &self,
        user_id: &str,
        target: &ReactionTarget,
    ) -> AppResult<ReactionState> {
        Ok(ReactionState::from_kind(
            self.reaction_repo.find_kind(user_id, target).await?,
        ))
    }

    /// Current summary for a viewer, without changing anything.
    pub async fn summary(
        &self,
        viewer_id: Option<&str>,
        target: &ReactionTarget,
    ) -> AppResult<ReactionSummary> {
        self.ensure_visible(viewer_id, target).await?;
        let state = match viewer_id {
            Some(id) => self.reaction_state(id, target).await?,
            None => ReactionState::None,
        };
        let counts = self.reaction_repo.counts(target).await?;
        Ok(ReactionSummary::new(state, counts))
    }

    async fn transition<F>(
        &self,
        user_id: &str,
        target: &ReactionTarget,
        next: F,
    ) -> AppResult<ReactionSummary>
    where
        F: Fn(ReactionState) -> ReactionState + Send + Sync,
    {
        self.ensure_visible(Some(user_id), target).await?;

        for attempt in 1..=MAX_ATTEMPTS {
            let current = self.reaction_state(user_id, target).await?;
            let wanted = next(current);

            let outcome = self
                .reaction_repo
                .apply_transition(
                    self.id_gen.generate(),
                    user_id,
                    target,
                    current.kind(),
                    wanted.kind(),
                )
                .await?;

            match outcome {
                Transition::Applied(counts) => {
                    tracing::debug!(
                        user_id = %user_id,
                        target_id = %target.id,
                        from = ?current,
                        to = ?wanted,
                        "Reaction updated"
                    );
                    return Ok(ReactionSummary::new(wanted, counts));
                }
                Transition::Stale => {
                    tracing::debug!(
                        user_id = %user_id,
                        target_id = %target.id,
                        attempt,
                        "Reaction changed concurrently, retrying"
                    );
                }
            }
        }

        tracing::warn!(user_id = %user_id, target_id = %target.id, "Reaction retries exhausted");
        Err(AppError::Conflict(
            "Reaction was modified concurrently".to_string(),
        ))
    }

    /// The target must exist and its video must be visible to the viewer.
    async fn ensure_visible(
        &self,
        viewer_id: Option<&str>,
        target: &ReactionTarget,
    ) -> AppResult<()> {
        let video_id = match target.target_type {
            TargetType::Video => target.id.clone(),
            TargetType::Comment => self.comment_repo.get_by_id(&target.id).await?.video_id,
        };
        let video = self.video_repo.get_by_id(&video_id).await?;
        ensure_can_view(&video, viewer_id)
    }
}
