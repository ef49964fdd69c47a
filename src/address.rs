use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RegistryError;

pub const ADDRESS_BYTES: usize = 20;
pub const MAX_HANDLE_LEN: usize = 64;
pub const MAX_LINK_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const MAX_SECONDARY_CONTRACTS: usize = 2;
pub const MAX_SIGNATURE_LEN: usize = 4096;

const _: [(); 16_384 - MAX_SIGNATURE_LEN] = [(); 16_384 - MAX_SIGNATURE_LEN];

/// 20-byte account or contract address, canonical form lowercase 0x-hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    pub fn parse(value: &str) -> Result<Self, RegistryError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(RegistryError::InvalidAddress("address is empty".to_string()));
        }
        let normalized = strip_hex_prefix(trimmed);
        if normalized.len() != ADDRESS_BYTES * 2 {
            return Err(RegistryError::InvalidAddress(format!(
                "address must be {} hex characters, got {}",
                ADDRESS_BYTES * 2,
                normalized.len()
            )));
        }
        let bytes = hex::decode(normalized.to_ascii_lowercase())
            .map_err(|err| RegistryError::InvalidAddress(format!("invalid hex: {err}")))?;
        assert_eq!(bytes.len(), ADDRESS_BYTES, "Decoded address length invariant");
        let mut fixed = [0u8; ADDRESS_BYTES];
        fixed.copy_from_slice(&bytes);
        Ok(Self(fixed))
    }

    pub fn from_bytes(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    /// Equality that does not short-circuit on the first differing byte.
    /// Used for the injected admin wallet comparison at the HTTP boundary.
    pub fn constant_time_eq(&self, other: &Address) -> bool {
        let mut diff = 0u8;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = RegistryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(D::Error::custom)
    }
}

/// Accepts hex (with or without 0x) or base64, the formats wallets emit.
pub fn decode_signature(value: &str) -> Result<Vec<u8>, RegistryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::SignatureInvalid(
            "signature is empty".to_string(),
        ));
    }

    match hex::decode(strip_hex_prefix(trimmed)) {
        Ok(bytes) if !bytes.is_empty() => {
            if bytes.len() > MAX_SIGNATURE_LEN {
                return Err(RegistryError::SignatureInvalid(format!(
                    "signature exceeds {MAX_SIGNATURE_LEN} byte limit"
                )));
            }
            return Ok(bytes);
        }
        Ok(_) => {}
        Err(_) => {}
    }

    let decoded = BASE64_STANDARD.decode(trimmed).map_err(|err| {
        RegistryError::SignatureInvalid(format!("not valid hex or base64: {err}"))
    })?;
    if decoded.len() > MAX_SIGNATURE_LEN {
        return Err(RegistryError::SignatureInvalid(format!(
            "signature exceeds {MAX_SIGNATURE_LEN} byte limit"
        )));
    }
    Ok(decoded)
}

pub fn sanitize_handle(value: &str, label: &str) -> Result<String, RegistryError> {
    let trimmed = value.trim().trim_start_matches('@');
    if trimmed.is_empty() {
        return Err(RegistryError::InvalidSubmission(format!(
            "{label} cannot be empty"
        )));
    }
    if trimmed.chars().count() > MAX_HANDLE_LEN {
        return Err(RegistryError::InvalidSubmission(format!(
            "{label} exceeds {MAX_HANDLE_LEN} character limit"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn sanitize_link(value: &str, label: &str) -> Result<Option<String>, RegistryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_LINK_LEN {
        return Err(RegistryError::InvalidSubmission(format!(
            "{label} exceeds {MAX_LINK_LEN} character limit"
        )));
    }
    Ok(Some(trimmed.to_string()))
}

pub fn sanitize_description(value: &str, min_len: usize) -> Result<String, RegistryError> {
    assert!(min_len <= MAX_DESCRIPTION_LEN, "Description floor exceeds cap");
    let trimmed = value.trim();
    if trimmed.chars().count() < min_len {
        return Err(RegistryError::InvalidSubmission(format!(
            "description must be at least {min_len} characters"
        )));
    }
    if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(RegistryError::InvalidSubmission(format!(
            "description exceeds {MAX_DESCRIPTION_LEN} character limit"
        )));
    }
    Ok(trimmed.to_string())
}

fn strip_hex_prefix(value: &str) -> &str {
    if value.starts_with("0x") || value.starts_with("0X") {
        &value[2..]
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_canonicalizes_case_and_prefix() {
        let mixed = "0xAbCdEf0123456789aBcDeF0123456789abcdef01";
        let bare = "ABCDEF0123456789ABCDEF0123456789ABCDEF01";
        let a = Address::parse(mixed).expect("mixed case parses");
        let b = Address::parse(bare).expect("bare hex parses");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn address_rejects_malformed_input() {
        assert!(Address::parse("").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xzzcdef0123456789abcdef0123456789abcdef01").is_err());
        let too_long = format!("0x{}", "ab".repeat(21));
        assert!(Address::parse(&too_long).is_err());
    }

    #[test]
    fn constant_time_eq_matches_canonical_equality() {
        let a = Address::parse("0xabcdef0123456789abcdef0123456789abcdef01").unwrap();
        let b = Address::parse("0xABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
        let c = Address::parse("0x0000000000000000000000000000000000000001").unwrap();
        assert!(a.constant_time_eq(&b));
        assert!(!a.constant_time_eq(&c));
    }

    #[test]
    fn signature_decodes_hex_and_base64() {
        let hex_bytes = decode_signature("0xdeadbeef").expect("hex signature");
        assert_eq!(hex_bytes, vec![0xde, 0xad, 0xbe, 0xef]);

        let base64_encoded = BASE64_STANDARD.encode([0xde, 0xad, 0xbe, 0xef]);
        let base64_bytes = decode_signature(&base64_encoded).expect("base64 signature");
        assert_eq!(base64_bytes, vec![0xde, 0xad, 0xbe, 0xef]);

        assert!(decode_signature("").is_err());
        assert!(decode_signature("!!not-encoded!!").is_err());
    }

    #[test]
    fn handle_validation() {
        assert_eq!(sanitize_handle("@project", "twitter handle").unwrap(), "project");
        assert!(sanitize_handle("  ", "twitter handle").is_err());
        let long = "a".repeat(MAX_HANDLE_LEN + 1);
        assert!(sanitize_handle(&long, "twitter handle").is_err());
    }

    #[test]
    fn description_floor_enforced() {
        assert!(sanitize_description("short", 32).is_err());
        let ok = "x".repeat(32);
        assert_eq!(sanitize_description(&ok, 32).unwrap(), ok);
    }
}
