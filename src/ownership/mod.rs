use std::sync::Arc;

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};
use tracing::debug;

use crate::address::{ADDRESS_BYTES, Address};
use crate::error::RegistryError;
use crate::gateway::{ChainSource, ChainTransaction};

/// How many of the earliest transactions the scan strategy inspects.
/// Creation is almost always among the first few; twenty covers factory
/// deployments that batch setup calls in the same span.
const EARLIEST_SCAN_LIMIT: u64 = 20;

const SIGNATURE_LEN: usize = 65;

/// Result of deployer resolution for a (contract, claimant) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    DeployerMatch { deployer: Address },
    DeployerMismatch { deployer: Address },
    DeployerUnknown,
}

impl VerificationOutcome {
    pub fn deployer(&self) -> Option<Address> {
        match self {
            Self::DeployerMatch { deployer } | Self::DeployerMismatch { deployer } => {
                Some(*deployer)
            }
            Self::DeployerUnknown => None,
        }
    }
}

/// Ordered deployer-detection strategies, strongest signal first. Each
/// either resolves a candidate deployer or reports itself inconclusive,
/// and the chain falls through to the next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeployerStrategy {
    TransactionScan,
    CreationLookup,
}

const STRATEGY_CHAIN: [DeployerStrategy; 2] = [
    DeployerStrategy::TransactionScan,
    DeployerStrategy::CreationLookup,
];

enum Probe {
    Resolved(Address),
    Inconclusive,
}

pub struct OwnershipResolver {
    source: Arc<dyn ChainSource>,
}

impl OwnershipResolver {
    pub fn new(source: Arc<dyn ChainSource>) -> Self {
        Self { source }
    }

    /// Resolve whether `claimant` deployed `contract`. Total over valid
    /// inputs: every call ends in a match, a mismatch, an unknown, or a
    /// typed error.
    pub async fn resolve(
        &self,
        contract: &Address,
        claimant: &Address,
    ) -> Result<VerificationOutcome, RegistryError> {
        for strategy in STRATEGY_CHAIN {
            match self.probe(strategy, contract).await? {
                Probe::Resolved(deployer) => {
                    debug!("Deployer of {contract} resolved to {deployer} via {strategy:?}");
                    return Ok(classify(deployer, claimant));
                }
                Probe::Inconclusive => continue,
            }
        }

        // No strategy produced a deployer. The contract is still real if
        // bytecode is present; provenance is merely unproven.
        if self.source.code_exists_at(contract).await? {
            Ok(VerificationOutcome::DeployerUnknown)
        } else {
            Err(RegistryError::ContractNotFound(*contract))
        }
    }

    /// Signature-based proof: recover the signer of the fixed ownership
    /// message and compare it against the resolved deployer when one is
    /// known, or against the claimant wallet when provenance is unknown.
    /// A malformed signature is a hard error, distinct from a mismatch.
    pub async fn verify_signature(
        &self,
        contract: &Address,
        claimant: &Address,
        message: &str,
        signature: &[u8],
    ) -> Result<bool, RegistryError> {
        let expected = ownership_message(contract);
        if message != expected {
            return Err(RegistryError::SignatureInvalid(
                "message does not match the ownership template".to_string(),
            ));
        }

        let outcome = self.resolve(contract, claimant).await?;
        let recovered = recover_signer(message, signature)?;

        match outcome {
            VerificationOutcome::DeployerMatch { deployer }
            | VerificationOutcome::DeployerMismatch { deployer } => Ok(recovered == deployer),
            VerificationOutcome::DeployerUnknown => Ok(recovered == *claimant),
        }
    }

    /// Registration-path gate. A confirmed deployer decides the request
    /// outright; only an unknown deployer may be bridged by a signature
    /// from the claimant. A positively identified foreign deployer is
    /// never overridable, so a stray signing key cannot claim someone
    /// else's contract.
    pub async fn authorize_registration(
        &self,
        contract: &Address,
        claimant: &Address,
        signature: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>, RegistryError> {
        match self.resolve(contract, claimant).await? {
            VerificationOutcome::DeployerMatch { .. } => Ok(None),
            VerificationOutcome::DeployerMismatch { deployer } => {
                Err(RegistryError::OwnershipUnverified {
                    deployer: Some(deployer),
                })
            }
            VerificationOutcome::DeployerUnknown => {
                let Some(signature) = signature else {
                    return Err(RegistryError::OwnershipUnverified { deployer: None });
                };
                let recovered = recover_signer(&ownership_message(contract), signature)?;
                if recovered == *claimant {
                    Ok(Some(signature.to_vec()))
                } else {
                    Err(RegistryError::SignatureMismatch {
                        recovered,
                        expected: *claimant,
                    })
                }
            }
        }
    }

    async fn probe(
        &self,
        strategy: DeployerStrategy,
        contract: &Address,
    ) -> Result<Probe, RegistryError> {
        match strategy {
            DeployerStrategy::TransactionScan => {
                let transactions = self
                    .source
                    .earliest_transactions(contract, EARLIEST_SCAN_LIMIT)
                    .await?;
                Ok(match scan_for_deployer(contract, &transactions) {
                    Some(deployer) => Probe::Resolved(deployer),
                    None => Probe::Inconclusive,
                })
            }
            DeployerStrategy::CreationLookup => {
                Ok(match self.source.creator_of(contract).await? {
                    Some(deployer) => Probe::Resolved(deployer),
                    None => Probe::Inconclusive,
                })
            }
        }
    }
}

fn classify(deployer: Address, claimant: &Address) -> VerificationOutcome {
    if deployer == *claimant {
        VerificationOutcome::DeployerMatch { deployer }
    } else {
        VerificationOutcome::DeployerMismatch { deployer }
    }
}

/// Scan the earliest transactions for the creation transaction. A
/// transaction qualifies when its destination is empty, the explorer
/// reports it created the target, or its sender is a third party. When
/// nothing qualifies the very first sender is a lower-confidence
/// fallback. Explorer creation endpoints are frequently missing for
/// factory-deployed contracts; the raw list is almost always available.
fn scan_for_deployer(contract: &Address, transactions: &[ChainTransaction]) -> Option<Address> {
    let creation = transactions.iter().find(|tx| {
        tx.recipient.is_none()
            || tx.contract_created.as_ref() == Some(contract)
            || tx.sender != *contract
    });
    match creation {
        Some(tx) => Some(tx.sender),
        None => transactions.first().map(|tx| tx.sender),
    }
}

/// The fixed template the claimant must sign.
pub fn ownership_message(contract: &Address) -> String {
    format!("I am the owner of contract {contract}. Signing to verify ownership.")
}

/// EIP-191 personal-sign digest of an arbitrary message.
pub fn personal_sign_digest(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()));
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Recover the signing address from a 65-byte r||s||v signature over the
/// personal-sign digest of `message`. Fails closed on anything malformed.
pub fn recover_signer(message: &str, signature: &[u8]) -> Result<Address, RegistryError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(RegistryError::SignatureInvalid(format!(
            "signature must be {SIGNATURE_LEN} bytes, got {}",
            signature.len()
        )));
    }

    let recovery = normalize_recovery_byte(signature[64])?;
    let recovery_id = RecoveryId::try_from(recovery)
        .map_err(|err| RegistryError::SignatureInvalid(format!("recovery id: {err}")))?;
    let parsed = Signature::from_slice(&signature[..64])
        .map_err(|err| RegistryError::SignatureInvalid(format!("r/s component: {err}")))?;

    let digest = personal_sign_digest(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &parsed, recovery_id)
        .map_err(|err| RegistryError::SignatureInvalid(format!("recovery failed: {err}")))?;

    Ok(address_of_key(&key))
}

fn normalize_recovery_byte(v: u8) -> Result<u8, RegistryError> {
    match v {
        0 | 1 => Ok(v),
        27 | 28 => Ok(v - 27),
        other => Err(RegistryError::SignatureInvalid(format!(
            "recovery byte {other} out of range"
        ))),
    }
}

fn address_of_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let raw = point.as_bytes();
    assert_eq!(raw.len(), 65, "Uncompressed SEC1 point must be 65 bytes");

    let mut hasher = Keccak256::new();
    hasher.update(&raw[1..]);
    let digest = hasher.finalize();

    let mut bytes = [0u8; ADDRESS_BYTES];
    bytes.copy_from_slice(&digest[12..]);
    Address::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use k256::ecdsa::SigningKey;

    use super::*;
    use crate::error::GatewayError;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; ADDRESS_BYTES];
        bytes[ADDRESS_BYTES - 1] = last;
        Address::from_bytes(bytes)
    }

    fn tx(sender: Address, recipient: Option<Address>, created: Option<Address>) -> ChainTransaction {
        ChainTransaction {
            sender,
            recipient,
            contract_created: created,
            block_number: 1,
            timestamp: Utc.timestamp_opt(100, 0).unwrap(),
        }
    }

    #[derive(Default)]
    struct MockChain {
        transactions: HashMap<Address, Vec<ChainTransaction>>,
        creators: HashMap<Address, Address>,
        code: HashMap<Address, bool>,
    }

    #[async_trait]
    impl ChainSource for MockChain {
        async fn code_exists_at(&self, address: &Address) -> Result<bool, GatewayError> {
            Ok(*self.code.get(address).unwrap_or(&false))
        }

        async fn creator_of(&self, address: &Address) -> Result<Option<Address>, GatewayError> {
            Ok(self.creators.get(address).copied())
        }

        async fn transactions_of(
            &self,
            address: &Address,
            _since_block: u64,
        ) -> Result<Vec<ChainTransaction>, GatewayError> {
            Ok(self.transactions.get(address).cloned().unwrap_or_default())
        }

        async fn earliest_transactions(
            &self,
            address: &Address,
            limit: u64,
        ) -> Result<Vec<ChainTransaction>, GatewayError> {
            let mut list = self.transactions.get(address).cloned().unwrap_or_default();
            list.truncate(limit as usize);
            Ok(list)
        }
    }

    fn resolver(chain: MockChain) -> OwnershipResolver {
        OwnershipResolver::new(Arc::new(chain))
    }

    fn signing_wallet(seed: u8) -> (SigningKey, Address) {
        let mut secret = [0u8; 32];
        secret[31] = seed;
        let key = SigningKey::from_slice(&secret).expect("valid secret scalar");
        let address = address_of_key(key.verifying_key());
        (key, address)
    }

    fn sign_ownership(key: &SigningKey, contract: &Address) -> Vec<u8> {
        let digest = personal_sign_digest(&ownership_message(contract));
        let (signature, recovery_id) = key
            .sign_prehash_recoverable(&digest)
            .expect("signing succeeds");
        let mut raw = signature.to_bytes().to_vec();
        raw.push(recovery_id.to_byte() + 27);
        raw
    }

    #[tokio::test]
    async fn single_creation_transaction_resolves_deployer() {
        let contract = addr(0xC0);
        let deployer = addr(0xA0);
        let other = addr(0xB0);

        let mut chain = MockChain::default();
        chain
            .transactions
            .insert(contract, vec![tx(deployer, None, None)]);
        let resolver = resolver(chain);

        assert_eq!(
            resolver.resolve(&contract, &deployer).await.unwrap(),
            VerificationOutcome::DeployerMatch { deployer }
        );
        assert_eq!(
            resolver.resolve(&contract, &other).await.unwrap(),
            VerificationOutcome::DeployerMismatch { deployer }
        );
    }

    #[tokio::test]
    async fn explorer_created_field_marks_creation() {
        let contract = addr(0xC0);
        let deployer = addr(0xA0);

        let mut chain = MockChain::default();
        chain.transactions.insert(
            contract,
            vec![tx(deployer, Some(addr(0xF0)), Some(contract))],
        );
        let resolver = resolver(chain);

        assert_eq!(
            resolver.resolve(&contract, &deployer).await.unwrap(),
            VerificationOutcome::DeployerMatch { deployer }
        );
    }

    #[tokio::test]
    async fn creation_lookup_is_consulted_when_scan_is_empty() {
        let contract = addr(0xC0);
        let deployer = addr(0xA0);

        let mut chain = MockChain::default();
        chain.creators.insert(contract, deployer);
        let resolver = resolver(chain);

        assert_eq!(
            resolver.resolve(&contract, &deployer).await.unwrap(),
            VerificationOutcome::DeployerMatch { deployer }
        );
    }

    #[tokio::test]
    async fn bytecode_without_provenance_is_unknown_not_an_error() {
        let contract = addr(0xC0);

        let mut chain = MockChain::default();
        chain.code.insert(contract, true);
        let resolver = resolver(chain);

        assert_eq!(
            resolver.resolve(&contract, &addr(0xA0)).await.unwrap(),
            VerificationOutcome::DeployerUnknown
        );
    }

    #[tokio::test]
    async fn missing_bytecode_is_contract_not_found() {
        let contract = addr(0xC0);
        let resolver = resolver(MockChain::default());

        match resolver.resolve(&contract, &addr(0xA0)).await {
            Err(RegistryError::ContractNotFound(found)) => assert_eq!(found, contract),
            other => panic!("expected ContractNotFound, got {other:?}"),
        }
    }

    #[test]
    fn scan_falls_back_to_first_sender() {
        let contract = addr(0xC0);
        let only_self = vec![tx(contract, Some(contract), None)];
        // Every transaction is the contract talking to itself; the first
        // sender is still reported, at lower confidence.
        assert_eq!(scan_for_deployer(&contract, &only_self), Some(contract));
        assert_eq!(scan_for_deployer(&contract, &[]), None);
    }

    #[test]
    fn signature_roundtrip_recovers_signer() {
        let contract = addr(0xC0);
        let (key, wallet) = signing_wallet(7);
        let raw = sign_ownership(&key, &contract);

        let recovered = recover_signer(&ownership_message(&contract), &raw).unwrap();
        assert_eq!(recovered, wallet);
    }

    #[test]
    fn malformed_signature_is_a_hard_error() {
        let contract = addr(0xC0);
        let message = ownership_message(&contract);

        assert!(matches!(
            recover_signer(&message, &[0u8; 10]),
            Err(RegistryError::SignatureInvalid(_))
        ));

        let mut bad_recovery = vec![1u8; SIGNATURE_LEN];
        bad_recovery[64] = 9;
        assert!(matches!(
            recover_signer(&message, &bad_recovery),
            Err(RegistryError::SignatureInvalid(_))
        ));
    }

    #[tokio::test]
    async fn signature_bridges_unknown_deployer_only_for_the_signer() {
        let contract = addr(0xC0);
        let (key, wallet) = signing_wallet(9);
        let raw = sign_ownership(&key, &contract);

        let mut chain = MockChain::default();
        chain.code.insert(contract, true);
        let resolver = resolver(chain);

        let stored = resolver
            .authorize_registration(&contract, &wallet, Some(&raw))
            .await
            .unwrap();
        assert_eq!(stored, Some(raw.clone()));

        // A different claimant presenting the same signature fails.
        match resolver
            .authorize_registration(&contract, &addr(0xEE), Some(&raw))
            .await
        {
            Err(RegistryError::SignatureMismatch { recovered, .. }) => {
                assert_eq!(recovered, wallet);
            }
            other => panic!("expected SignatureMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn confirmed_foreign_deployer_is_never_bridged_by_signature() {
        let contract = addr(0xC0);
        let deployer = addr(0xA0);
        let (key, attacker) = signing_wallet(11);
        let raw = sign_ownership(&key, &contract);

        let mut chain = MockChain::default();
        chain
            .transactions
            .insert(contract, vec![tx(deployer, None, None)]);
        let resolver = resolver(chain);

        match resolver
            .authorize_registration(&contract, &attacker, Some(&raw))
            .await
        {
            Err(RegistryError::OwnershipUnverified {
                deployer: Some(found),
            }) => assert_eq!(found, deployer),
            other => panic!("expected OwnershipUnverified, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn verify_signature_compares_against_resolved_deployer() {
        let contract = addr(0xC0);
        let (deployer_key, deployer) = signing_wallet(13);
        let (attacker_key, attacker) = signing_wallet(17);

        let mut chain = MockChain::default();
        chain
            .transactions
            .insert(contract, vec![tx(deployer, None, None)]);
        let resolver = resolver(chain);
        let message = ownership_message(&contract);

        let deployer_sig = sign_ownership(&deployer_key, &contract);
        assert!(
            resolver
                .verify_signature(&contract, &deployer, &message, &deployer_sig)
                .await
                .unwrap()
        );

        // The attacker's own valid signature proves nothing about a
        // contract whose deployer is positively known.
        let attacker_sig = sign_ownership(&attacker_key, &contract);
        assert!(
            !resolver
                .verify_signature(&contract, &attacker, &message, &attacker_sig)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn verify_signature_rejects_foreign_message() {
        let contract = addr(0xC0);
        let (key, wallet) = signing_wallet(19);
        let raw = sign_ownership(&key, &contract);

        let mut chain = MockChain::default();
        chain.code.insert(contract, true);
        let resolver = resolver(chain);

        assert!(matches!(
            resolver
                .verify_signature(&contract, &wallet, "unrelated text", &raw)
                .await,
            Err(RegistryError::SignatureInvalid(_))
        ));
    }
}
