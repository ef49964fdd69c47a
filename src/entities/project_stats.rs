use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "project_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub wallet_address: String,
    pub contract_address: String,
    pub total_transactions: i64,
    pub transactions_last_12h: i64,
    pub unique_wallets: i64,
    pub unique_wallets_last_12h: i64,
    pub growth_rate: f64,
    pub tx_rank: Option<i32>,
    pub wallet_rank: Option<i32>,
    pub last_scanned: DateTimeWithTimeZone,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::submission::Entity",
        from = "Column::WalletAddress",
        to = "super::submission::Column::WalletAddress"
    )]
    Submission,
}

impl Related<super::submission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
