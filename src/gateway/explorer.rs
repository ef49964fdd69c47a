use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::warn;

use crate::address::Address;
use crate::config::ExplorerConfig;
use crate::error::GatewayError;
use crate::gateway::ChainTransaction;

const MAX_ATTEMPTS: u32 = 2;
const RETRY_BACKOFF_MS: u64 = 500;
const END_BLOCK: u64 = 999_999_999;

/// Etherscan-compatible explorer client. Transient transport failures are
/// retried once with a short backoff; rate-limit responses surface as
/// `GatewayError::RateLimited` so callers can apply their own policy.
pub struct ExplorerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    page_size: u64,
    max_pages: u64,
}

impl ExplorerClient {
    pub fn new(config: &ExplorerConfig) -> Result<Self> {
        assert!(!config.base_url.is_empty(), "Explorer base URL must be provided");
        assert!(config.page_size() > 0, "Explorer page size must be positive");

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build explorer HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            page_size: config.page_size(),
            max_pages: config.max_pages(),
        })
    }

    /// Earliest `limit` transactions touching `address`, ascending.
    pub async fn earliest_transactions(
        &self,
        address: &Address,
        limit: u64,
    ) -> Result<Vec<ChainTransaction>, GatewayError> {
        assert!(limit > 0, "Transaction scan limit must be positive");
        assert!(limit <= 10_000, "Transaction scan limit exceeds explorer bound");
        self.transaction_page(address, 0, 1, limit).await
    }

    /// Full ascending history from `since_block`, fetched page by page.
    /// Coverage is bounded by `max_pages`; a truncated fetch is logged and
    /// returns what was collected rather than failing the caller.
    pub async fn transaction_history(
        &self,
        address: &Address,
        since_block: u64,
    ) -> Result<Vec<ChainTransaction>, GatewayError> {
        let mut collected = Vec::new();
        let mut page = 1u64;

        loop {
            let batch = self
                .transaction_page(address, since_block, page, self.page_size)
                .await?;
            let short_page = (batch.len() as u64) < self.page_size;
            collected.extend(batch);

            if short_page {
                break;
            }
            if page >= self.max_pages {
                warn!(
                    "Transaction history for {address} truncated at {} pages ({} transactions)",
                    self.max_pages,
                    collected.len()
                );
                break;
            }
            page += 1;
        }

        Ok(collected)
    }

    /// The explorer's dedicated creation-lookup endpoint. Frequently has
    /// no answer for factory-deployed contracts; absence is not an error.
    pub async fn contract_creation(
        &self,
        address: &Address,
    ) -> Result<Option<Address>, GatewayError> {
        let url = format!(
            "{}?module=contract&action=getcontractcreation&contractaddresses={address}{}",
            self.base_url,
            self.key_param()
        );
        let envelope: ExplorerEnvelope = self.get_json(&url).await?;

        if envelope.status != "1" {
            if envelope.is_rate_limited() {
                return Err(GatewayError::RateLimited);
            }
            return Ok(None);
        }

        let records: Vec<CreationRecord> = serde_json::from_value(envelope.result)
            .map_err(|err| GatewayError::Malformed(format!("creation record: {err}")))?;
        let Some(record) = records.first() else {
            return Ok(None);
        };
        let creator = Address::parse(&record.contract_creator)
            .map_err(|err| GatewayError::Malformed(format!("creator address: {err}")))?;
        Ok(Some(creator))
    }

    async fn transaction_page(
        &self,
        address: &Address,
        since_block: u64,
        page: u64,
        offset: u64,
    ) -> Result<Vec<ChainTransaction>, GatewayError> {
        assert!(page > 0, "Explorer pages are 1-based");
        let url = format!(
            "{}?module=account&action=txlist&address={address}&startblock={since_block}\
             &endblock={END_BLOCK}&page={page}&offset={offset}&sort=asc{}",
            self.base_url,
            self.key_param()
        );

        let envelope: ExplorerEnvelope = self.get_json(&url).await?;
        let records = envelope.into_tx_records()?;

        let mut transactions = Vec::with_capacity(records.len());
        for record in &records {
            transactions.push(record.normalize()?);
        }
        Ok(transactions)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, GatewayError> {
        let mut last_err = GatewayError::Transport("no attempt made".to_string());

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                sleep(Duration::from_millis(RETRY_BACKOFF_MS)).await;
            }
            match self.http.get(url).send().await {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    return Err(GatewayError::RateLimited);
                }
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .json::<T>()
                        .await
                        .map_err(|err| GatewayError::Malformed(err.to_string()));
                }
                Ok(resp) => {
                    last_err = GatewayError::Transport(format!("HTTP {}", resp.status()));
                }
                Err(err) if err.is_timeout() => last_err = GatewayError::Timeout,
                Err(err) => last_err = GatewayError::Transport(err.to_string()),
            }
            if !last_err.is_transient() {
                break;
            }
        }

        Err(last_err)
    }

    fn key_param(&self) -> String {
        match &self.api_key {
            Some(key) => format!("&apikey={key}"),
            None => String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExplorerEnvelope {
    status: String,
    message: String,
    result: Value,
}

impl ExplorerEnvelope {
    fn is_rate_limited(&self) -> bool {
        let probe = |text: &str| text.to_ascii_lowercase().contains("rate limit");
        probe(&self.message) || self.result.as_str().map(probe).unwrap_or(false)
    }

    fn into_tx_records(self) -> Result<Vec<TxRecord>, GatewayError> {
        if self.status == "1" {
            return serde_json::from_value(self.result)
                .map_err(|err| GatewayError::Malformed(format!("transaction list: {err}")));
        }
        if self.is_rate_limited() {
            return Err(GatewayError::RateLimited);
        }
        // "No transactions found" arrives as status 0 with an empty result.
        if self.message.to_ascii_lowercase().contains("no transactions found") {
            return Ok(Vec::new());
        }
        Err(GatewayError::Malformed(format!(
            "explorer status {}: {}",
            self.status, self.message
        )))
    }
}

#[derive(Debug, Deserialize)]
struct CreationRecord {
    #[serde(rename = "contractCreator")]
    contract_creator: String,
}

#[derive(Debug, Deserialize)]
struct TxRecord {
    from: String,
    #[serde(default)]
    to: String,
    #[serde(rename = "contractAddress", default)]
    contract_address: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
    #[serde(rename = "timeStamp")]
    time_stamp: String,
}

impl TxRecord {
    fn normalize(&self) -> Result<ChainTransaction, GatewayError> {
        let sender = Address::parse(&self.from)
            .map_err(|err| GatewayError::Malformed(format!("sender: {err}")))?;
        let recipient = parse_optional_address(&self.to, "recipient")?;
        let contract_created = parse_optional_address(&self.contract_address, "created address")?;

        let block_number: u64 = self
            .block_number
            .parse()
            .map_err(|err| GatewayError::Malformed(format!("block number: {err}")))?;
        let unix: i64 = self
            .time_stamp
            .parse()
            .map_err(|err| GatewayError::Malformed(format!("timestamp: {err}")))?;
        let timestamp = chrono::DateTime::from_timestamp(unix, 0)
            .ok_or_else(|| GatewayError::Malformed(format!("timestamp {unix} out of range")))?;

        Ok(ChainTransaction {
            sender,
            recipient,
            contract_created,
            block_number,
            timestamp,
        })
    }
}

fn parse_optional_address(raw: &str, label: &str) -> Result<Option<Address>, GatewayError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "0x" {
        return Ok(None);
    }
    Address::parse(trimmed)
        .map(Some)
        .map_err(|err| GatewayError::Malformed(format!("{label}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> ExplorerEnvelope {
        serde_json::from_str(json).expect("envelope parses")
    }

    #[test]
    fn tx_page_parses_creation_transaction() {
        let body = r#"{
            "status": "1",
            "message": "OK",
            "result": [{
                "from": "0x00000000000000000000000000000000000000aa",
                "to": "",
                "contractAddress": "0x00000000000000000000000000000000000000cc",
                "blockNumber": "17",
                "timeStamp": "1700000000"
            }]
        }"#;
        let records = envelope(body).into_tx_records().expect("records decode");
        assert_eq!(records.len(), 1);
        let tx = records[0].normalize().expect("record normalizes");
        assert_eq!(
            tx.sender.to_string(),
            "0x00000000000000000000000000000000000000aa"
        );
        assert!(tx.recipient.is_none());
        assert_eq!(
            tx.contract_created.map(|a| a.to_string()),
            Some("0x00000000000000000000000000000000000000cc".to_string())
        );
        assert_eq!(tx.block_number, 17);
        assert_eq!(tx.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn empty_result_is_not_an_error() {
        let body = r#"{"status":"0","message":"No transactions found","result":[]}"#;
        let records = envelope(body).into_tx_records().expect("empty page ok");
        assert!(records.is_empty());
    }

    #[test]
    fn rate_limit_is_typed() {
        let body = r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#;
        match envelope(body).into_tx_records() {
            Err(GatewayError::RateLimited) => {}
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn malformed_status_is_rejected() {
        let body = r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#;
        assert!(matches!(
            envelope(body).into_tx_records(),
            Err(GatewayError::Malformed(_))
        ));
    }
}
