//! Video repository.

use std::sync::Arc;

use crate::entities::{Comment, Video, WatchHistory, comment, reaction::TargetType, video, watch_history};
use crate::repositories::reaction::delete_for_targets;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
    sea_query::{Expr, Func, LikeExpr},
};
use serde::{Deserialize, Serialize};
use vidshare_common::{AppError, AppResult};

/// Column a video search is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoSort {
    /// Upload time
    #[default]
    CreatedAt,
    /// View counter
    Views,
    /// Reported length
    Duration,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending
    #[default]
    Desc,
}

impl From<SortOrder> for Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Self::Asc,
            SortOrder::Desc => Self::Desc,
        }
    }
}

/// Filters for [`VideoRepository::search`].
///
/// Private videos never match, whoever is asking.
#[derive(Debug, Clone, Default)]
pub struct VideoFilter {
    /// Case-insensitive substring of the title or description
    pub text: Option<String>,
    /// Only this uploader's videos
    pub user_id: Option<String>,
    /// Inclusive lower bound on duration, in seconds
    pub min_duration: Option<i32>,
    /// Inclusive upper bound on duration, in seconds
    pub max_duration: Option<i32>,
    /// Sort column
    pub sort: VideoSort,
    /// Sort direction
    pub order: SortOrder,
}

/// Escape `LIKE` wildcards with `!`.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '!') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

/// Video repository for database operations.
#[derive(Clone)]
pub struct VideoRepository {
    db: Arc<DatabaseConnection>,
}

impl VideoRepository {
    /// Create a new video repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a video by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<video::Model>> {
        Video::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a video by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<video::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::VideoNotFound(id.to_string()))
    }

    /// Find videos by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<video::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Video::find()
            .filter(video::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new video.
    pub async fn create(&self, model: video::ActiveModel) -> AppResult<video::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a video.
    pub async fn update(&self, model: video::ActiveModel) -> AppResult<video::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Public videos, newest first.
    pub async fn find_public(&self, limit: u64, offset: u64) -> AppResult<Vec<video::Model>> {
        Video::find()
            .filter(video::Column::IsPrivate.eq(false))
            .order_by_desc(video::Column::CreatedAt)
            .order_by_desc(video::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Public videos matching `filter`.
    ///
    /// Text matching lowercases both sides; `SQLite` only folds ASCII.
    pub async fn search(
        &self,
        filter: &VideoFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<video::Model>> {
        let mut query = Video::find().filter(video::Column::IsPrivate.eq(false));

        if let Some(text) = filter.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", escape_like(&text.to_lowercase()));
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(video::Column::Title)))
                            .like(LikeExpr::new(pattern.clone()).escape('!')),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(video::Column::Description)))
                            .like(LikeExpr::new(pattern).escape('!')),
                    ),
            );
        }

        if let Some(user_id) = &filter.user_id {
            query = query.filter(video::Column::UserId.eq(user_id.as_str()));
        }
        if let Some(min) = filter.min_duration {
            query = query.filter(video::Column::Duration.gte(min));
        }
        if let Some(max) = filter.max_duration {
            query = query.filter(video::Column::Duration.lte(max));
        }

        let column = match filter.sort {
            VideoSort::CreatedAt => video::Column::CreatedAt,
            VideoSort::Views => video::Column::ViewsCount,
            VideoSort::Duration => video::Column::Duration,
        };

        query
            .order_by(column, filter.order.into())
            .order_by(video::Column::Id, filter.order.into())
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A user's uploads, newest first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
        include_private: bool,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<video::Model>> {
        let mut query = Video::find().filter(video::Column::UserId.eq(user_id));

        if !include_private {
            query = query.filter(video::Column::IsPrivate.eq(false));
        }

        query
            .order_by_desc(video::Column::CreatedAt)
            .order_by_desc(video::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Increment the view counter and return the new value.
    pub async fn increment_views_count(&self, id: &str) -> AppResult<i64> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = Video::update_many()
            .col_expr(
                video::Column::ViewsCount,
                Expr::col(video::Column::ViewsCount).add(1),
            )
            .filter(video::Column::Id.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::VideoNotFound(id.to_string()));
        }

        let video = Video::find_by_id(id)
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::VideoNotFound(id.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(video.views_count)
    }

    /// Delete a video together with its comments, reactions and watch history.
    pub async fn delete_cascade(&self, id: &str) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let comment_ids: Vec<String> = Comment::find()
            .select_only()
            .column(comment::Column::Id)
            .filter(comment::Column::VideoId.eq(id))
            .into_tuple()
            .all(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        delete_for_targets(&txn, TargetType::Comment, comment_ids)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        delete_for_targets(&txn, TargetType::Video, vec![id.to_string()])
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // Replies before their parents so the self-reference never dangles.
        Comment::delete_many()
            .filter(comment::Column::VideoId.eq(id))
            .filter(comment::Column::ParentId.is_not_null())
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Comment::delete_many()
            .filter(comment::Column::VideoId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        WatchHistory::delete_many()
            .filter(watch_history::Column::VideoId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let result = Video::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::VideoNotFound(id.to_string()));
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
