use thiserror::Error;

use crate::address::Address;

/// Failures crossing the Chain Data Gateway boundary. The aggregator's
/// skip-and-continue policy and the request path's single retry both key
/// off these variants rather than inspecting error strings.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("explorer rate limit reached")]
    RateLimited,
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream transport failure: {0}")]
    Transport(String),
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Transient failures are worth one retry on the request path.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Transport(_))
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("no contract code at {0}")]
    ContractNotFound(Address),
    #[error("malformed ownership signature: {0}")]
    SignatureInvalid(String),
    #[error("recovered signer {recovered} does not match {expected}")]
    SignatureMismatch {
        recovered: Address,
        expected: Address,
    },
    #[error("wallet is not the verified deployer of the contract")]
    OwnershipUnverified { deployer: Option<Address> },
    #[error("a submission for this wallet is already approved")]
    AlreadyApproved,
    #[error("a submission for this wallet is already pending review")]
    AlreadyPending,
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Upstream(#[from] GatewayError),
    #[error("storage failure: {0}")]
    Storage(#[from] sea_orm::DbErr),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(GatewayError::Timeout.is_transient());
        assert!(GatewayError::Transport("reset".to_string()).is_transient());
        assert!(!GatewayError::RateLimited.is_transient());
        assert!(!GatewayError::Malformed("bad json".to_string()).is_transient());
    }
}
