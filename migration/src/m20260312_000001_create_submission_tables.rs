use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Submissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Submissions::WalletAddress)
                            .string_len(42)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Submissions::TwitterHandle)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Submissions::TelegramHandle)
                            .string_len(64)
                            .null(),
                    )
                    .col(ColumnDef::new(Submissions::Website).string_len(256).null())
                    .col(
                        ColumnDef::new(Submissions::ContractAddress)
                            .string_len(42)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Submissions::SecondaryContractA)
                            .string_len(42)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Submissions::SecondaryContractB)
                            .string_len(42)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Submissions::Description)
                            .string_len(4096)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Submissions::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Submissions::RejectionReason)
                            .string_len(1024)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Submissions::OwnershipSignature)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Submissions::SubmittedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Submissions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_submissions_status")
                    .table(Submissions::Table)
                    .col(Submissions::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_submissions_contract")
                    .table(Submissions::Table)
                    .col(Submissions::ContractAddress)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Submissions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Submissions {
    Table,
    WalletAddress,
    TwitterHandle,
    TelegramHandle,
    Website,
    ContractAddress,
    SecondaryContractA,
    SecondaryContractB,
    Description,
    Status,
    RejectionReason,
    OwnershipSignature,
    SubmittedAt,
    UpdatedAt,
}
