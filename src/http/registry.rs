use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::address::{Address, decode_signature};
use crate::models::registry::{
    OwnershipCheckResponse, RegisterPayload, RegisterResponse, VerifySignaturePayload,
    VerifySignatureResponse,
};
use crate::ownership::VerificationOutcome;
use crate::registration::SubmissionStatus;
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_project))
        .route("/ownership", get(check_ownership))
        .route("/verify-signature", post(verify_signature))
}

async fn register_project(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<Json<RegisterResponse>, HttpError> {
    let receipt = state.gate.register(payload.into_request()).await?;

    Ok(Json(RegisterResponse {
        wallet_address: receipt.wallet.to_string(),
        status: SubmissionStatus::Pending.as_str(),
        resubmission: receipt.resubmission,
    }))
}

#[derive(Debug, Deserialize)]
struct OwnershipQuery {
    contract: String,
    wallet: String,
}

async fn check_ownership(
    Query(query): Query<OwnershipQuery>,
    State(state): State<AppState>,
) -> Result<Json<OwnershipCheckResponse>, HttpError> {
    let contract = Address::parse(&query.contract)?;
    let wallet = Address::parse(&query.wallet)?;

    let outcome = state.resolver.resolve(&contract, &wallet).await?;
    let label = match outcome {
        VerificationOutcome::DeployerMatch { .. } => "deployer_match",
        VerificationOutcome::DeployerMismatch { .. } => "deployer_mismatch",
        VerificationOutcome::DeployerUnknown => "deployer_unknown",
    };

    Ok(Json(OwnershipCheckResponse {
        contract_address: contract.to_string(),
        wallet_address: wallet.to_string(),
        outcome: label,
        deployer: outcome.deployer().map(|address| address.to_string()),
    }))
}

async fn verify_signature(
    State(state): State<AppState>,
    Json(payload): Json<VerifySignaturePayload>,
) -> Result<Json<VerifySignatureResponse>, HttpError> {
    let contract = Address::parse(&payload.contract_address)?;
    let wallet = Address::parse(&payload.wallet_address)?;
    let signature = decode_signature(&payload.signature)?;

    let verified = state
        .resolver
        .verify_signature(&contract, &wallet, &payload.message, &signature)
        .await?;

    Ok(Json(VerifySignatureResponse {
        contract_address: contract.to_string(),
        wallet_address: wallet.to_string(),
        verified,
    }))
}
