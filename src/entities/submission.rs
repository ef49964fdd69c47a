use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub wallet_address: String,
    pub twitter_handle: String,
    pub telegram_handle: Option<String>,
    pub website: Option<String>,
    pub contract_address: String,
    pub secondary_contract_a: Option<String>,
    pub secondary_contract_b: Option<String>,
    pub description: String,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub ownership_signature: Option<Vec<u8>>,
    pub submitted_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::project_stats::Entity")]
    ProjectStats,
}

impl Related<super::project_stats::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectStats.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
