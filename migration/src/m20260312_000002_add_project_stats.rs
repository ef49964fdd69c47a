use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProjectStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProjectStats::WalletAddress)
                            .string_len(42)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProjectStats::ContractAddress)
                            .string_len(42)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectStats::TotalTransactions)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProjectStats::TransactionsLast12h)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProjectStats::UniqueWallets)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProjectStats::UniqueWalletsLast12h)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProjectStats::GrowthRate)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(ProjectStats::TxRank).integer().null())
                    .col(ColumnDef::new(ProjectStats::WalletRank).integer().null())
                    .col(
                        ColumnDef::new(ProjectStats::LastScanned)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProjectStats::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_project_stats_tx_rank")
                    .table(ProjectStats::Table)
                    .col(ProjectStats::TxRank)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_project_stats_wallet_rank")
                    .table(ProjectStats::Table)
                    .col(ProjectStats::WalletRank)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProjectStats::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProjectStats {
    Table,
    WalletAddress,
    ContractAddress,
    TotalTransactions,
    // Explicit idens: the digit segment would otherwise snake-case
    // without the separator the entity fields use.
    #[sea_orm(iden = "transactions_last_12h")]
    TransactionsLast12h,
    UniqueWallets,
    #[sea_orm(iden = "unique_wallets_last_12h")]
    UniqueWalletsLast12h,
    GrowthRate,
    TxRank,
    WalletRank,
    LastScanned,
    CreatedAt,
}
