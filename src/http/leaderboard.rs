use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;
use serde_json::Value;

use crate::entities::prelude::{ProjectStats, Submission};
use crate::entities::{project_stats, submission};
use crate::models::leaderboard::{LeaderboardEntry, LeaderboardResponse};
use crate::state::AppState;

use super::HttpError;

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 100;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_leaderboard))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortKey {
    Transactions,
    UniqueWallets,
}

impl SortKey {
    fn parse(raw: Option<&str>) -> Result<Self, HttpError> {
        match raw.unwrap_or("transactions") {
            "transactions" => Ok(Self::Transactions),
            "wallets" => Ok(Self::UniqueWallets),
            other => Err(HttpError::new(
                StatusCode::BAD_REQUEST,
                format!("unknown sort key {other:?}; expected transactions or wallets"),
            )),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Transactions => "transactions",
            Self::UniqueWallets => "wallets",
        }
    }

    fn rank_column(&self) -> project_stats::Column {
        match self {
            Self::Transactions => project_stats::Column::TxRank,
            Self::UniqueWallets => project_stats::Column::WalletRank,
        }
    }

    fn rank_of(&self, row: &project_stats::Model) -> Option<i32> {
        match self {
            Self::Transactions => row.tx_rank,
            Self::UniqueWallets => row.wallet_rank,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    sort: Option<String>,
    limit: Option<u64>,
}

async fn get_leaderboard(
    Query(query): Query<LeaderboardQuery>,
    State(state): State<AppState>,
) -> Result<Json<Value>, HttpError> {
    let sort = SortKey::parse(query.sort.as_deref())?;
    let requested_limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if requested_limit == 0 {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            "limit must be positive".to_string(),
        ));
    }
    let limit = requested_limit.min(MAX_LIMIT);

    let cache_key = format!("{}:{limit}", sort.label());
    if let Some(cached) = state.cache.leaderboards.get(&cache_key).await {
        return Ok(Json(cached));
    }

    // Ranked rows first (ascending rank, NULLs sort last in Postgres),
    // bounded by the requested page.
    let rows = ProjectStats::find()
        .order_by_asc(sort.rank_column())
        .order_by_asc(project_stats::Column::CreatedAt)
        .limit(limit)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let wallets: Vec<String> = rows.iter().map(|row| row.wallet_address.clone()).collect();
    let handles: HashMap<String, String> = Submission::find()
        .filter(submission::Column::WalletAddress.is_in(wallets))
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .into_iter()
        .map(|model| (model.wallet_address, model.twitter_handle))
        .collect();

    let entries: Vec<LeaderboardEntry> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| LeaderboardEntry {
            // Before the first ranking pass ranks are unassigned; the
            // page position stands in so the response stays total.
            rank: sort.rank_of(row).unwrap_or(index as i32 + 1),
            wallet_address: row.wallet_address.clone(),
            twitter_handle: handles.get(&row.wallet_address).cloned(),
            contract_address: row.contract_address.clone(),
            total_transactions: row.total_transactions,
            unique_wallets: row.unique_wallets,
            growth_rate: row.growth_rate,
        })
        .collect();

    assert!(
        entries.len() <= limit as usize,
        "Returned more leaderboard rows than requested"
    );

    let response = LeaderboardResponse {
        sort: sort.label(),
        entries,
    };
    let value = serde_json::to_value(&response)
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    state
        .cache
        .leaderboards
        .insert(cache_key, value.clone())
        .await;

    Ok(Json(value))
}
