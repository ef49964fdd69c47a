use serde::{Deserialize, Serialize};

use crate::registration::RegistrationRequest;

#[derive(Debug, Deserialize)]
pub struct RegisterPayload {
    pub wallet_address: String,
    pub twitter_handle: String,
    pub telegram_handle: Option<String>,
    pub website: Option<String>,
    pub contract_address: String,
    #[serde(default)]
    pub secondary_contracts: Vec<String>,
    pub description: String,
    pub ownership_signature: Option<String>,
}

impl RegisterPayload {
    pub fn into_request(self) -> RegistrationRequest {
        RegistrationRequest {
            wallet_address: self.wallet_address,
            twitter_handle: self.twitter_handle,
            telegram_handle: self.telegram_handle,
            website: self.website,
            contract_address: self.contract_address,
            secondary_contracts: self.secondary_contracts,
            description: self.description,
            ownership_signature: self.ownership_signature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterResponse {
    pub wallet_address: String,
    pub status: &'static str,
    pub resubmission: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipCheckResponse {
    pub contract_address: String,
    pub wallet_address: String,
    pub outcome: &'static str,
    pub deployer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifySignaturePayload {
    pub contract_address: String,
    pub wallet_address: String,
    pub message: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifySignatureResponse {
    pub contract_address: String,
    pub wallet_address: String,
    pub verified: bool,
}
