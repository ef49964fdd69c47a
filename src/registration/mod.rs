use std::sync::Arc;

use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, IntoActiveModel};
use tracing::info;

use crate::address::{
    Address, MAX_SECONDARY_CONTRACTS, decode_signature, sanitize_description, sanitize_handle,
    sanitize_link,
};
use crate::clock::fixed_now;
use crate::entities::prelude::Submission;
use crate::entities::submission;
use crate::error::RegistryError;
use crate::ownership::OwnershipResolver;

/// Review lifecycle of a submission. `pending ⇄ rejected → pending`,
/// `pending → approved` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        match raw {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(RegistryError::Corrupt(format!(
                "unknown submission status {other:?}"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RegistrationRequest {
    pub wallet_address: String,
    pub twitter_handle: String,
    pub telegram_handle: Option<String>,
    pub website: Option<String>,
    pub contract_address: String,
    pub secondary_contracts: Vec<String>,
    pub description: String,
    pub ownership_signature: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistrationReceipt {
    pub wallet: Address,
    pub resubmission: bool,
}

/// Enforces the one-record-per-wallet invariant and the resubmission
/// state machine; ownership is verified before anything is persisted.
pub struct RegistrationGate {
    database: DatabaseConnection,
    resolver: Arc<OwnershipResolver>,
    min_description_len: usize,
}

impl RegistrationGate {
    pub fn new(
        database: DatabaseConnection,
        resolver: Arc<OwnershipResolver>,
        min_description_len: usize,
    ) -> Self {
        assert!(
            min_description_len <= 1024,
            "Description floor exceeds sane bound"
        );
        Self {
            database,
            resolver,
            min_description_len,
        }
    }

    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationReceipt, RegistryError> {
        let wallet = Address::parse(&request.wallet_address)?;
        let contract = Address::parse(&request.contract_address)?;
        let secondary = parse_secondary_contracts(&request.secondary_contracts)?;

        let twitter = sanitize_handle(&request.twitter_handle, "twitter handle")?;
        let telegram = request
            .telegram_handle
            .as_deref()
            .map(|handle| sanitize_handle(handle, "telegram handle"))
            .transpose()?;
        let website = match request.website.as_deref() {
            Some(link) => sanitize_link(link, "website")?,
            None => None,
        };
        let description = sanitize_description(&request.description, self.min_description_len)?;
        let signature = request
            .ownership_signature
            .as_deref()
            .map(decode_signature)
            .transpose()?;

        let existing = Submission::find_by_id(wallet.to_string())
            .one(&self.database)
            .await?;
        let existing_status = existing
            .as_ref()
            .map(|model| SubmissionStatus::parse(&model.status))
            .transpose()?;
        let resubmission = resubmission_decision(existing_status)?;

        // Ownership check runs after the state gate so an approved or
        // pending wallet never costs an upstream round-trip.
        let stored_signature = self
            .resolver
            .authorize_registration(&contract, &wallet, signature.as_deref())
            .await?;

        let now = fixed_now();
        let secondary_a = secondary.first().map(Address::to_string);
        let secondary_b = secondary.get(1).map(Address::to_string);

        match existing {
            Some(model) => {
                assert!(resubmission, "Existing row must be a rejected resubmission");
                let mut active = model.into_active_model();
                active.twitter_handle = Set(twitter);
                active.telegram_handle = Set(telegram);
                active.website = Set(website);
                active.contract_address = Set(contract.to_string());
                active.secondary_contract_a = Set(secondary_a);
                active.secondary_contract_b = Set(secondary_b);
                active.description = Set(description);
                active.status = Set(SubmissionStatus::Pending.as_str().to_string());
                active.rejection_reason = Set(None);
                active.ownership_signature = Set(stored_signature);
                active.updated_at = Set(now);
                active.update(&self.database).await?;
                info!("Resubmission accepted for {wallet}");
            }
            None => {
                let active = submission::ActiveModel {
                    wallet_address: Set(wallet.to_string()),
                    twitter_handle: Set(twitter),
                    telegram_handle: Set(telegram),
                    website: Set(website),
                    contract_address: Set(contract.to_string()),
                    secondary_contract_a: Set(secondary_a),
                    secondary_contract_b: Set(secondary_b),
                    description: Set(description),
                    status: Set(SubmissionStatus::Pending.as_str().to_string()),
                    rejection_reason: Set(None),
                    ownership_signature: Set(stored_signature),
                    submitted_at: Set(now),
                    updated_at: Set(now),
                };
                active.insert(&self.database).await?;
                info!("Registration accepted for {wallet}");
            }
        }

        Ok(RegistrationReceipt {
            wallet,
            resubmission,
        })
    }
}

/// State gate for an incoming registration against the existing row.
/// Approved rows are immutable through this path; only a rejected row
/// may be overwritten as a resubmission.
pub fn resubmission_decision(
    existing: Option<SubmissionStatus>,
) -> Result<bool, RegistryError> {
    match existing {
        None => Ok(false),
        Some(SubmissionStatus::Approved) => Err(RegistryError::AlreadyApproved),
        Some(SubmissionStatus::Pending) => Err(RegistryError::AlreadyPending),
        Some(SubmissionStatus::Rejected) => Ok(true),
    }
}

fn parse_secondary_contracts(raw: &[String]) -> Result<Vec<Address>, RegistryError> {
    if raw.len() > MAX_SECONDARY_CONTRACTS {
        return Err(RegistryError::InvalidSubmission(format!(
            "at most {MAX_SECONDARY_CONTRACTS} secondary contracts allowed"
        )));
    }
    let mut parsed = Vec::with_capacity(raw.len());
    for value in raw {
        parsed.push(Address::parse(value)?);
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in [
            SubmissionStatus::Pending,
            SubmissionStatus::Approved,
            SubmissionStatus::Rejected,
        ] {
            assert_eq!(SubmissionStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(matches!(
            SubmissionStatus::parse("archived"),
            Err(RegistryError::Corrupt(_))
        ));
    }

    #[test]
    fn state_gate_per_wallet() {
        assert_eq!(resubmission_decision(None).unwrap(), false);
        assert_eq!(
            resubmission_decision(Some(SubmissionStatus::Rejected)).unwrap(),
            true
        );
        assert!(matches!(
            resubmission_decision(Some(SubmissionStatus::Approved)),
            Err(RegistryError::AlreadyApproved)
        ));
        assert!(matches!(
            resubmission_decision(Some(SubmissionStatus::Pending)),
            Err(RegistryError::AlreadyPending)
        ));
    }

    #[test]
    fn secondary_contracts_are_bounded() {
        let a = "0x00000000000000000000000000000000000000aa".to_string();
        assert_eq!(parse_secondary_contracts(&[]).unwrap().len(), 0);
        assert_eq!(
            parse_secondary_contracts(&[a.clone(), a.clone()]).unwrap().len(),
            2
        );
        assert!(parse_secondary_contracts(&[a.clone(), a.clone(), a]).is_err());
    }
}
