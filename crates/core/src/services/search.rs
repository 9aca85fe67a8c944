//! Video search and discovery feeds.

use serde::Deserialize;
use validator::Validate;
use vidshare_common::{AppError, AppResult};
use vidshare_db::{
    entities::video,
    repositories::{SortOrder, UserRepository, VideoFilter, VideoRepository, VideoSort},
};

use crate::services::page::MAX_LIMIT;

/// Default number of results for search and the discovery feeds.
pub const DEFAULT_SEARCH_LIMIT: u64 = 10;

const fn default_search_limit() -> u64 {
    DEFAULT_SEARCH_LIMIT
}

/// Query parameters of a video search. Every filter is optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SearchQuery {
    /// Matched against title and description
    #[validate(length(max = 200))]
    pub query: Option<String>,

    /// Uploader username
    pub uploader: Option<String>,

    #[validate(range(min = 0))]
    pub min_duration: Option<i32>,

    #[validate(range(min = 0))]
    pub max_duration: Option<i32>,

    #[serde(default)]
    pub sort_by: VideoSort,

    #[serde(default)]
    pub sort_order: SortOrder,

    #[serde(default = "default_search_limit")]
    pub limit: u64,

    #[serde(default)]
    pub offset: u64,
}

/// Search service for business logic.
#[derive(Clone)]
pub struct SearchService {
    video_repo: VideoRepository,
    user_repo: UserRepository,
}

impl SearchService {
    /// Create a new search service.
    #[must_use]
    pub const fn new(video_repo: VideoRepository, user_repo: UserRepository) -> Self {
        Self {
            video_repo,
            user_repo,
        }
    }

    /// Public videos matching every given filter.
    ///
    /// An unknown uploader matches nothing rather than failing.
    pub async fn search_videos(&self, query: SearchQuery) -> AppResult<Vec<video::Model>> {
        query.validate()?;
        if let (Some(min), Some(max)) = (query.min_duration, query.max_duration)
            && min > max
        {
            return Err(AppError::Validation(format!(
                "min_duration {min} is greater than max_duration {max}"
            )));
        }

        let user_id = match query.uploader.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => match self.user_repo.find_by_username(name).await? {
                Some(user) => Some(user.id),
                None => return Ok(vec![]),
            },
            _ => None,
        };

        let filter = VideoFilter {
            text: query.query,
            user_id,
            min_duration: query.min_duration,
            max_duration: query.max_duration,
            sort: query.sort_by,
            order: query.sort_order,
        };

        self.video_repo
            .search(&filter, clamp_limit(query.limit), query.offset)
            .await
    }

    /// Most viewed public videos.
    pub async fn trending(&self, limit: u64) -> AppResult<Vec<video::Model>> {
        let filter = VideoFilter {
            sort: VideoSort::Views,
            order: SortOrder::Desc,
            ..VideoFilter::default()
        };
        self.video_repo.search(&filter, clamp_limit(limit), 0).await
    }

    /// Newest public videos.
    pub async fn latest(&self, limit: u64) -> AppResult<Vec<video::Model>> {
        let filter = VideoFilter {
            sort: VideoSort::CreatedAt,
            order: SortOrder::Desc,
            ..VideoFilter::default()
        };
        self.video_repo.search(&filter, clamp_limit(limit), 0).await
    }
}

fn clamp_limit(limit: u64) -> u64 {
    limit.clamp(1, MAX_LIMIT)
}
