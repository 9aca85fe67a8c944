//! Create video table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Video::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Video::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Video::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(Video::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Video::Description).text())
                    .col(ColumnDef::new(Video::FileKey).string_len(512).not_null())
                    .col(ColumnDef::new(Video::FileUrl).string_len(1024).not_null())
                    .col(ColumnDef::new(Video::FileMd5).string_len(32).not_null())
                    .col(ColumnDef::new(Video::ContentType).string_len(128).not_null())
                    .col(ColumnDef::new(Video::Size).big_integer().not_null())
                    .col(ColumnDef::new(Video::ThumbnailKey).string_len(512))
                    .col(ColumnDef::new(Video::ThumbnailUrl).string_len(1024))
                    .col(ColumnDef::new(Video::Duration).integer().not_null().default(0))
                    .col(ColumnDef::new(Video::IsPrivate).boolean().not_null().default(false))
                    .col(ColumnDef::new(Video::ViewsCount).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Video::LikesCount).integer().not_null().default(0))
                    .col(ColumnDef::new(Video::DislikesCount).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Video::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Video::UpdatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_video_user")
                            .from(Video::Table, Video::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: user_id (for a user's uploads)
        manager
            .create_index(
                Index::create()
                    .name("idx_video_user_id")
                    .table(Video::Table)
                    .col(Video::UserId)
                    .to_owned(),
            )
            .await?;

        // Index: (is_private, created_at) for the public listing
        manager
            .create_index(
                Index::create()
                    .name("idx_video_is_private_created_at")
                    .table(Video::Table)
                    .col(Video::IsPrivate)
                    .col(Video::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Video::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Video {
    Table,
    Id,
    UserId,
    Title,
    Description,
    FileKey,
    FileUrl,
    FileMd5,
    ContentType,
    Size,
    ThumbnailKey,
    ThumbnailUrl,
    Duration,
    IsPrivate,
    ViewsCount,
    LikesCount,
    DislikesCount,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
