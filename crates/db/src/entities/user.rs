//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub username: String,

    /// Avatar URL or storage key
    #[sea_orm(nullable)]
    pub profile_picture: Option<String>,

    /// Storage key of an uploaded avatar, so it can be replaced
    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub profile_picture_key: Option<String>,

    /// Bearer credential issued by the external auth provider
    #[sea_orm(unique, nullable)]
    #[serde(skip_serializing)]
    pub token: Option<String>,

    /// NULL = token never expires
    #[sea_orm(nullable)]
    #[serde(skip_serializing)]
    pub token_expires_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::video::Entity")]
    Videos,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::video::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Videos.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
