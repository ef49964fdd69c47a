use std::sync::atomic::Ordering as AtomicOrdering;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::{GatewayError, RegistryError};
use crate::state::AppState;

mod leaderboard;
mod registry;
mod stats;

pub fn router(state: AppState) -> Router {
    assert!(
        state.start_time.elapsed() < Duration::from_secs(86_400),
        "Application uptime exceeds 24 hours before router creation"
    );

    // Browser clients call this API directly from the project directory UI.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let registry_router = registry::router().with_state(state.clone());
    let stats_router = stats::router().with_state(state.clone());
    let leaderboard_router = leaderboard::router().with_state(state.clone());
    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .nest("/registry", registry_router)
        .nest("/stats", stats_router)
        .nest("/leaderboard", leaderboard_router)
        .layer(cors)
        .with_state(state)
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let uptime = state.start_time.elapsed().as_secs();
    assert!(
        uptime <= 31_536_000,
        "Uptime exceeds one year without restart"
    );
    let response = HealthResponse {
        status: "live",
        uptime_seconds: uptime,
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    state
        .database
        .ping()
        .await
        .map_err(|err| HttpError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string()))?;

    let last_pass_at = state.last_pass_at.load(AtomicOrdering::SeqCst);
    assert!(last_pass_at >= 0, "Pass timestamp predates Unix epoch");

    let response = ReadyResponse {
        status: "ready",
        last_stats_pass_at: (last_pass_at > 0).then_some(last_pass_at),
        cache_entries: CacheSummary {
            leaderboards: state.cache.leaderboards.entry_count(),
            project_stats: state.cache.project_stats.entry_count(),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    last_stats_pass_at: Option<i64>,
    cache_entries: CacheSummary,
}

#[derive(Debug, Serialize)]
struct CacheSummary {
    leaderboards: u64,
    project_stats: u64,
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self { status, message }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        info!("HTTP error: {}", self.message);
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<RegistryError> for HttpError {
    fn from(err: RegistryError) -> Self {
        let status = match &err {
            RegistryError::InvalidAddress(_)
            | RegistryError::InvalidSubmission(_)
            | RegistryError::SignatureInvalid(_) => StatusCode::BAD_REQUEST,
            RegistryError::ContractNotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::OwnershipUnverified { .. }
            | RegistryError::SignatureMismatch { .. } => StatusCode::FORBIDDEN,
            RegistryError::AlreadyApproved | RegistryError::AlreadyPending => StatusCode::CONFLICT,
            RegistryError::Upstream(GatewayError::RateLimited) => StatusCode::SERVICE_UNAVAILABLE,
            RegistryError::Upstream(_) => StatusCode::BAD_GATEWAY,
            RegistryError::Corrupt(_) | RegistryError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Carry the resolved deployer so the UI can tell the user whose
        // contract they tried to claim.
        let message = match &err {
            RegistryError::OwnershipUnverified {
                deployer: Some(deployer),
            } => format!("{err} (deployer is {deployer})"),
            _ => err.to_string(),
        };

        HttpError::new(status, message)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}
