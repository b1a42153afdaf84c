use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QuotaRecords::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(QuotaRecords::UserId).string().not_null())
                    .col(ColumnDef::new(QuotaRecords::FeatureKey).string().not_null())
                    .col(
                        ColumnDef::new(QuotaRecords::CurrentUsage)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(QuotaRecords::LimitValue)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(QuotaRecords::BurstLimit).big_integer())
                    .col(
                        ColumnDef::new(QuotaRecords::WindowStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuotaRecords::WindowDurationSecs)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuotaRecords::ViolationCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(QuotaRecords::LastViolationAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(QuotaRecords::IsBlocked)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(QuotaRecords::BlockedUntil).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(QuotaRecords::Revision)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .col(QuotaRecords::UserId)
                            .col(QuotaRecords::FeatureKey),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QuotaRecords::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum QuotaRecords {
    Table,
    UserId,
    FeatureKey,
    CurrentUsage,
    LimitValue,
    BurstLimit,
    WindowStart,
    WindowDurationSecs,
    ViolationCount,
    LastViolationAt,
    IsBlocked,
    BlockedUntil,
    Revision,
}
