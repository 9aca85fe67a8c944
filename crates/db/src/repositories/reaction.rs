//! Reaction repository.
//!
//! Every state change on a reaction row goes through [`ReactionRepository::apply_transition`],
//! which pairs a compare-and-set on the per-user row with the matching counter
//! updates on the target, inside one transaction.

use std::sync::Arc;

use crate::entities::{
    Comment, Reaction, Video, comment,
    reaction::{self, ReactionKind, TargetType},
    video,
};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set, TransactionTrait,
    sea_query::{Expr, OnConflict, SimpleExpr},
};
use vidshare_common::{AppError, AppResult};

/// A video or comment that can carry reactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReactionTarget {
    /// Which table `id` lives in.
    pub target_type: TargetType,
    /// Row ID.
    pub id: String,
}

impl ReactionTarget {
    /// A video target.
    pub fn video(id: impl Into<String>) -> Self {
        Self {
            target_type: TargetType::Video,
            id: id.into(),
        }
    }

    /// A comment target.
    pub fn comment(id: impl Into<String>) -> Self {
        Self {
            target_type: TargetType::Comment,
            id: id.into(),
        }
    }

    /// The not-found error for this target.
    #[must_use]
    pub fn not_found(&self) -> AppError {
        match self.target_type {
            TargetType::Video => AppError::VideoNotFound(self.id.clone()),
            TargetType::Comment => AppError::CommentNotFound(self.id.clone()),
        }
    }
}

/// Aggregate counters stored on a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactionCounts {
    /// Number of likes.
    pub likes: i32,
    /// Number of dislikes.
    pub dislikes: i32,
}

/// Result of a compare-and-set transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The row matched the expected prior state and was updated.
    Applied(ReactionCounts),
    /// Someone else changed the row first; nothing was written.
    Stale,
}

/// Reaction repository for database operations.
#[derive(Clone)]
pub struct ReactionRepository {
    db: Arc<DatabaseConnection>,
}

impl ReactionRepository {
    /// Create a new reaction repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user's reaction on a target.
    pub async fn find(
        &self,
        user_id: &str,
        target: &ReactionTarget,
    ) -> AppResult<Option<reaction::Model>> {
        Reaction::find()
            .filter(reaction::Column::UserId.eq(user_id))
            .filter(reaction::Column::TargetType.eq(target.target_type))
            .filter(reaction::Column::TargetId.eq(target.id.as_str()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Current reaction kind of a user on a target, if any.
    pub async fn find_kind(
        &self,
        user_id: &str,
        target: &ReactionTarget,
    ) -> AppResult<Option<ReactionKind>> {
        Ok(self.find(user_id, target).await?.map(|r| r.kind))
    }

    /// A user's reactions on many targets of one type.
    pub async fn find_for_targets(
        &self,
        user_id: &str,
        target_type: TargetType,
        target_ids: &[String],
    ) -> AppResult<Vec<reaction::Model>> {
        if target_ids.is_empty() {
            return Ok(vec![]);
        }

        Reaction::find()
            .filter(reaction::Column::UserId.eq(user_id))
            .filter(reaction::Column::TargetType.eq(target_type))
            .filter(reaction::Column::TargetId.is_in(target_ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count reaction rows of one kind on a target.
    pub async fn count_by_target(
        &self,
        target: &ReactionTarget,
        kind: ReactionKind,
    ) -> AppResult<u64> {
        Reaction::find()
            .filter(reaction::Column::TargetType.eq(target.target_type))
            .filter(reaction::Column::TargetId.eq(target.id.as_str()))
            .filter(reaction::Column::Kind.eq(kind))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Read the aggregate counters of a target.
    pub async fn counts(&self, target: &ReactionTarget) -> AppResult<ReactionCounts> {
        read_counts(self.db.as_ref(), target)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| target.not_found())
    }

    /// Move a user's reaction on `target` from `from` to `to`.
    ///
    /// The row write only happens if the stored state still equals `from`;
    /// otherwise nothing is written and [`Transition::Stale`] is returned so the
    /// caller can re-read and retry. Counters move in the same transaction.
    pub async fn apply_transition(
        &self,
        new_id: String,
        user_id: &str,
        target: &ReactionTarget,
        from: Option<ReactionKind>,
        to: Option<ReactionKind>,
    ) -> AppResult<Transition> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let swapped = swap_row(&txn, new_id, user_id, target, from, to)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !swapped {
            txn.rollback()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(Transition::Stale);
        }

        if from != to {
            if let Some(old) = from {
                adjust_counter(&txn, target, old, false).await?;
            }
            if let Some(new) = to {
                adjust_counter(&txn, target, new, true).await?;
            }
        }

        let counts = read_counts(&txn, target)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| target.not_found())?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(Transition::Applied(counts))
    }
}

/// Conditional write on the reaction row. Returns whether the prior state matched.
async fn swap_row<C: ConnectionTrait>(
    conn: &C,
    new_id: String,
    user_id: &str,
    target: &ReactionTarget,
    from: Option<ReactionKind>,
    to: Option<ReactionKind>,
) -> Result<bool, DbErr> {
    let rows = match (from, to) {
        (None, None) => return Ok(true),
        (Some(old), Some(new)) if old == new => return Ok(true),
        (None, Some(kind)) => {
            let model = reaction::ActiveModel {
                id: Set(new_id),
                user_id: Set(user_id.to_string()),
                target_type: Set(target.target_type),
                target_id: Set(target.id.clone()),
                kind: Set(kind),
                created_at: Set(Utc::now().into()),
            };
            Reaction::insert(model)
                .on_conflict(
                    OnConflict::columns([
                        reaction::Column::UserId,
                        reaction::Column::TargetType,
                        reaction::Column::TargetId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(conn)
                .await?
        }
        (Some(old), None) => {
            Reaction::delete_many()
                .filter(reaction::Column::UserId.eq(user_id))
                .filter(reaction::Column::TargetType.eq(target.target_type))
                .filter(reaction::Column::TargetId.eq(target.id.as_str()))
                .filter(reaction::Column::Kind.eq(old))
                .exec(conn)
                .await?
                .rows_affected
        }
        (Some(old), Some(new)) => {
            Reaction::update_many()
                .col_expr(reaction::Column::Kind, Expr::value(new))
                .filter(reaction::Column::UserId.eq(user_id))
                .filter(reaction::Column::TargetType.eq(target.target_type))
                .filter(reaction::Column::TargetId.eq(target.id.as_str()))
                .filter(reaction::Column::Kind.eq(old))
                .exec(conn)
                .await?
                .rows_affected
        }
    };
    Ok(rows == 1)
}

/// `col + 1`, or `col - 1` floored at zero.
fn step(col: impl sea_orm::sea_query::IntoColumnRef + Copy, increment: bool) -> SimpleExpr {
    if increment {
        Expr::col(col).add(1)
    } else {
        Expr::case(Expr::col(col).gt(0), Expr::col(col).sub(1))
            .finally(0)
            .into()
    }
}

async fn adjust_counter<C: ConnectionTrait>(
    conn: &C,
    target: &ReactionTarget,
    kind: ReactionKind,
    increment: bool,
) -> AppResult<()> {
    let result = match target.target_type {
        TargetType::Video => {
            let col = match kind {
                ReactionKind::Like => video::Column::LikesCount,
                ReactionKind::Dislike => video::Column::DislikesCount,
            };
            Video::update_many()
                .col_expr(col, step(col, increment))
                .filter(video::Column::Id.eq(target.id.as_str()))
                .exec(conn)
                .await
        }
        TargetType::Comment => {
            let col = match kind {
                ReactionKind::Like => comment::Column::LikesCount,
                ReactionKind::Dislike => comment::Column::DislikesCount,
            };
            Comment::update_many()
                .col_expr(col, step(col, increment))
                .filter(comment::Column::Id.eq(target.id.as_str()))
                .exec(conn)
                .await
        }
    }
    .map_err(|e| AppError::Database(e.to_string()))?;

    if result.rows_affected == 0 {
        return Err(target.not_found());
    }
    Ok(())
}

async fn read_counts<C: ConnectionTrait>(
    conn: &C,
    target: &ReactionTarget,
) -> Result<Option<ReactionCounts>, DbErr> {
    Ok(match target.target_type {
        TargetType::Video => Video::find_by_id(target.id.as_str())
            .one(conn)
            .await?
            .map(|v| ReactionCounts {
                likes: v.likes_count,
                dislikes: v.dislikes_count,
            }),
        TargetType::Comment => Comment::find_by_id(target.id.as_str())
            .one(conn)
            .await?
            .map(|c| ReactionCounts {
                likes: c.likes_count,
                dislikes: c.dislikes_count,
            }),
    })
}

/// Remove every reaction on the given targets. Used by cascading deletes.
pub(crate) async fn delete_for_targets<C: ConnectionTrait>(
    conn: &C,
    target_type: TargetType,
    target_ids: Vec<String>,
) -> Result<u64, DbErr> {
    if target_ids.is_empty() {
        return Ok(0);
    }

    Reaction::delete_many()
        .filter(reaction::Column::TargetType.eq(target_type))
        .filter(reaction::Column::TargetId.is_in(target_ids))
        .exec(conn)
        .await
        .map(|r| r.rows_affected)
}
