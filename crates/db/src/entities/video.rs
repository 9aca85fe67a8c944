//! Video entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "video")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Uploader user ID
    #[sea_orm(indexed)]
    pub user_id: String,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Storage key of the video file
    pub file_key: String,

    pub file_url: String,

    pub file_md5: String,

    pub content_type: String,

    /// File size in bytes
    pub size: i64,

    #[sea_orm(nullable)]
    pub thumbnail_key: Option<String>,

    #[sea_orm(nullable)]
    pub thumbnail_url: Option<String>,

    /// Length in seconds, as reported by the uploader (0 = unknown)
    #[sea_orm(default_value = 0)]
    pub duration: i32,

    /// Only the uploader can see private videos
    #[sea_orm(default_value = false)]
    pub is_private: bool,

    /// Playback starts (denormalized)
    #[sea_orm(default_value = 0)]
    pub views_count: i64,

    /// Like count (denormalized)
    #[sea_orm(default_value = 0)]
    pub likes_count: i32,

    /// Dislike count (denormalized)
    #[sea_orm(default_value = 0)]
    pub dislikes_count: i32,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,

    #[sea_orm(has_many = "super::watch_history::Entity")]
    WatchHistory,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::watch_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WatchHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
