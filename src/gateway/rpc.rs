use std::time::Duration;

use anyhow::{Context, Result};
use jsonrpsee::core::ClientError;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use tokio::time::sleep;

use crate::address::Address;
use crate::error::GatewayError;

const MAX_ATTEMPTS: u32 = 2;
const RETRY_BACKOFF_MS: u64 = 250;

/// Thin JSON-RPC client against the chain node, used for direct state
/// reads the explorer cannot answer authoritatively.
#[derive(Clone)]
pub struct NodeClient {
    inner: HttpClient,
}

impl NodeClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        assert!(!endpoint.is_empty(), "RPC endpoint must be provided");
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .with_context(|| format!("Failed to build RPC client for {endpoint}"))?;

        Ok(Self { inner: client })
    }

    /// Deployed bytecode at the address; empty means no contract.
    pub async fn get_code(&self, address: &Address) -> Result<Vec<u8>, GatewayError> {
        let mut last_err = GatewayError::Transport("no attempt made".to_string());

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                sleep(Duration::from_millis(RETRY_BACKOFF_MS)).await;
            }
            let call: Result<String, ClientError> = self
                .inner
                .request("eth_getCode", rpc_params![address.to_string(), "latest"])
                .await;
            match call {
                Ok(code) => return decode_bytecode(&code),
                Err(err) => {
                    last_err = map_client_error(err);
                    if !last_err.is_transient() {
                        break;
                    }
                }
            }
        }

        Err(last_err)
    }
}

fn map_client_error(err: ClientError) -> GatewayError {
    match err {
        ClientError::RequestTimeout => GatewayError::Timeout,
        other => GatewayError::Transport(other.to_string()),
    }
}

fn decode_bytecode(raw: &str) -> Result<Vec<u8>, GatewayError> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if stripped.is_empty() {
        return Ok(Vec::new());
    }
    hex::decode(stripped).map_err(|err| GatewayError::Malformed(format!("bytecode: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytecode_decodes_and_empty_means_absent() {
        assert!(decode_bytecode("0x").expect("empty code").is_empty());
        assert_eq!(decode_bytecode("0x6001").expect("code"), vec![0x60, 0x01]);
        assert!(decode_bytecode("0xzz").is_err());
    }
}
