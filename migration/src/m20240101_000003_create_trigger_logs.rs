use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_triggers::Triggers;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TriggerLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TriggerLogs::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TriggerLogs::TriggerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TriggerLogs::AssetDid)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TriggerLogs::SnapshotData)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TriggerLogs::LastTriggeredAt)
                            .date_time()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TriggerLogs::CreatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(TriggerLogs::Table, TriggerLogs::TriggerId)
                            .to(Triggers::Table, Triggers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Cooldown/previous-value lookups key on (trigger, asset) and want
        // the most recent row first.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("IX_trigger_logs_trigger_asset_last_triggered")
                    .table(TriggerLogs::Table)
                    .col(TriggerLogs::TriggerId)
                    .col(TriggerLogs::AssetDid)
                    .col(TriggerLogs::LastTriggeredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TriggerLogs::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TriggerLogs {
    Table,
    Id,
    TriggerId,
    AssetDid,
    SnapshotData,
    LastTriggeredAt,
    CreatedAt,
}
