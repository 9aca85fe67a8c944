//! Create watch history table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WatchHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WatchHistory::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WatchHistory::UserId).string_len(32).not_null())
                    .col(ColumnDef::new(WatchHistory::VideoId).string_len(32).not_null())
                    .col(ColumnDef::new(WatchHistory::Position).integer().not_null().default(0))
                    .col(ColumnDef::new(WatchHistory::Duration).integer().not_null().default(0))
                    .col(
                        ColumnDef::new(WatchHistory::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_watch_history_user")
                            .from(WatchHistory::Table, WatchHistory::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_watch_history_video")
                            .from(WatchHistory::Table, WatchHistory::VideoId)
                            .to(Video::Table, Video::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one resume position per user per video (upsert target)
        manager
            .create_index(
                Index::create()
                    .name("idx_watch_history_user_video")
                    .table(WatchHistory::Table)
                    .col(WatchHistory::UserId)
                    .col(WatchHistory::VideoId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: (user_id, updated_at) for "continue watching"
        manager
            .create_index(
                Index::create()
                    .name("idx_watch_history_user_updated_at")
                    .table(WatchHistory::Table)
                    .col(WatchHistory::UserId)
                    .col(WatchHistory::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WatchHistory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum WatchHistory {
    Table,
    Id,
    UserId,
    VideoId,
    Position,
    Duration,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Video {
    Table,
    Id,
}
