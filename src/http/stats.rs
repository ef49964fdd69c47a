use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use sea_orm::EntityTrait;

use crate::address::Address;
use crate::entities::prelude::ProjectStats;
use crate::models::leaderboard::ProjectStatsView;
use crate::state::AppState;
use crate::stats::PassReport;

use super::HttpError;

const ADMIN_WALLET_HEADER: &str = "x-admin-wallet";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/run", post(run_pass))
        .route("/{wallet}", get(get_project_stats))
}

async fn get_project_stats(
    Path(wallet): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ProjectStatsView>, HttpError> {
    let wallet = Address::parse(&wallet)?;
    let key = wallet.to_string();

    if let Some(cached) = state.cache.project_stats.get(&key).await {
        return Ok(Json((*cached).clone()));
    }

    let row = ProjectStats::find_by_id(key.clone())
        .one(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or_else(|| {
            HttpError::new(StatusCode::NOT_FOUND, format!("No stats for {wallet}"))
        })?;

    let view = ProjectStatsView::from(&row);
    state
        .cache
        .project_stats
        .insert(key, Arc::new(view.clone()))
        .await;

    Ok(Json(view))
}

/// Manual pass trigger for operators; the scheduler covers normal
/// operation. Authorized by the injected admin wallet, compared in
/// constant time.
async fn run_pass(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<PassReport>, HttpError> {
    let caller = headers
        .get(ADMIN_WALLET_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            HttpError::new(
                StatusCode::UNAUTHORIZED,
                format!("{ADMIN_WALLET_HEADER} header required"),
            )
        })?;
    let caller = Address::parse(caller)?;

    if !caller.constant_time_eq(&state.admin_wallet) {
        return Err(HttpError::new(
            StatusCode::FORBIDDEN,
            "caller is not the configured admin wallet".to_string(),
        ));
    }

    let report = state.aggregator.run_pass().await?;
    Ok(Json(report))
}
