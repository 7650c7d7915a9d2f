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
                    .table(VehicleSubscriptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VehicleSubscriptions::TriggerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VehicleSubscriptions::AssetDid)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VehicleSubscriptions::CreatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(VehicleSubscriptions::TriggerId)
                            .col(VehicleSubscriptions::AssetDid),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(
                                VehicleSubscriptions::Table,
                                VehicleSubscriptions::TriggerId,
                            )
                            .to(Triggers::Table, Triggers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("IX_vehicle_subscriptions_asset")
                    .table(VehicleSubscriptions::Table)
                    .col(VehicleSubscriptions::AssetDid)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop().table(VehicleSubscriptions::Table).to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
pub enum VehicleSubscriptions {
    Table,
    TriggerId,
    AssetDid,
    CreatedAt,
}
