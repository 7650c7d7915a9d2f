use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Triggers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Triggers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Triggers::DisplayName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Triggers::OwnerDevLicense)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Triggers::Service).string().not_null())
                    .col(
                        ColumnDef::new(Triggers::MetricName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Triggers::Condition).text().not_null())
                    .col(ColumnDef::new(Triggers::TargetUri).text().not_null())
                    .col(
                        ColumnDef::new(Triggers::CooldownSeconds)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Triggers::Status).string().not_null())
                    .col(ColumnDef::new(Triggers::Description).text())
                    .col(
                        ColumnDef::new(Triggers::FailureCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Triggers::CreatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Triggers::UpdatedAt)
                            .date_time()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("IX_triggers_owner")
                    .table(Triggers::Table)
                    .col(Triggers::OwnerDevLicense)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("IX_triggers_owner_status")
                    .table(Triggers::Table)
                    .col(Triggers::OwnerDevLicense)
                    .col(Triggers::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("IX_triggers_service_metric")
                    .table(Triggers::Table)
                    .col(Triggers::Service)
                    .col(Triggers::MetricName)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Triggers::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub(crate) enum Triggers {
    Table,
    Id,
    DisplayName,
    OwnerDevLicense,
    Service,
    MetricName,
    Condition,
    TargetUri,
    CooldownSeconds,
    Status,
    Description,
    FailureCount,
    CreatedAt,
    UpdatedAt,
}
