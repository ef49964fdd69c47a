use serde::Serialize;

use crate::entities::project_stats;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStatsView {
    pub wallet_address: String,
    pub contract_address: String,
    pub total_transactions: i64,
    pub transactions_last_12h: i64,
    pub unique_wallets: i64,
    pub unique_wallets_last_12h: i64,
    pub growth_rate: f64,
    pub tx_rank: Option<i32>,
    pub wallet_rank: Option<i32>,
    pub last_scanned: i64,
}

impl From<&project_stats::Model> for ProjectStatsView {
    fn from(model: &project_stats::Model) -> Self {
        Self {
            wallet_address: model.wallet_address.clone(),
            contract_address: model.contract_address.clone(),
            total_transactions: model.total_transactions,
            transactions_last_12h: model.transactions_last_12h,
            unique_wallets: model.unique_wallets,
            unique_wallets_last_12h: model.unique_wallets_last_12h,
            growth_rate: model.growth_rate,
            tx_rank: model.tx_rank,
            wallet_rank: model.wallet_rank,
            last_scanned: model.last_scanned.timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: i32,
    pub wallet_address: String,
    pub twitter_handle: Option<String>,
    pub contract_address: String,
    pub total_transactions: i64,
    pub unique_wallets: i64,
    pub growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardResponse {
    pub sort: &'static str,
    pub entries: Vec<LeaderboardEntry>,
}
