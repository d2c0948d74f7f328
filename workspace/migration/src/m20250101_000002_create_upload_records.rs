use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250101_000001_create_accounts::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UploadRecords::Table)
                    .if_not_exists()
                    .col(pk_auto(UploadRecords::Id))
                    .col(integer_null(UploadRecords::UserId))
                    .col(string(UploadRecords::Image))
                    .col(string_len(UploadRecords::PredictedClass, 20))
                    .col(timestamp_with_time_zone(UploadRecords::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_upload_record_user")
                            .from(UploadRecords::Table, UploadRecords::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Admin listing sorts by creation time
        manager
            .create_index(
                Index::create()
                    .name("idx_upload_records_created_at")
                    .table(UploadRecords::Table)
                    .col(UploadRecords::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UploadRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UploadRecords {
    Table,
    Id,
    UserId,
    Image,
    PredictedClass,
    CreatedAt,
}
