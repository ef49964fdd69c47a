use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::address::Address;
use crate::error::GatewayError;

mod explorer;
mod rpc;

pub use explorer::ExplorerClient;
pub use rpc::NodeClient;

/// One transaction touching a contract, normalized from whatever the
/// explorer returns. `recipient` is absent for creation transactions;
/// `contract_created` is the explorer-reported created address when the
/// transaction deployed a contract.
#[derive(Clone, Debug)]
pub struct ChainTransaction {
    pub sender: Address,
    pub recipient: Option<Address>,
    pub contract_created: Option<Address>,
    pub block_number: u64,
    pub timestamp: DateTime<Utc>,
}

/// Single abstraction over the explorer API and the full-node JSON-RPC.
/// Retry and timeout policy lives behind this trait; callers only see
/// typed results.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// True when bytecode is present at the address.
    async fn code_exists_at(&self, address: &Address) -> Result<bool, GatewayError>;

    /// Deployer address from the explorer's dedicated creation endpoint,
    /// when the explorer knows it.
    async fn creator_of(&self, address: &Address) -> Result<Option<Address>, GatewayError>;

    /// Full transaction history for the address from `since_block`
    /// onwards, ascending by block.
    async fn transactions_of(
        &self,
        address: &Address,
        since_block: u64,
    ) -> Result<Vec<ChainTransaction>, GatewayError>;

    /// The earliest `limit` transactions touching the address, ascending.
    async fn earliest_transactions(
        &self,
        address: &Address,
        limit: u64,
    ) -> Result<Vec<ChainTransaction>, GatewayError>;
}

/// Production gateway: explorer REST for history and provenance, node
/// JSON-RPC for bytecode reads.
pub struct HttpGateway {
    explorer: ExplorerClient,
    node: NodeClient,
}

impl HttpGateway {
    pub fn new(explorer: ExplorerClient, node: NodeClient) -> Self {
        Self { explorer, node }
    }
}

#[async_trait]
impl ChainSource for HttpGateway {
    async fn code_exists_at(&self, address: &Address) -> Result<bool, GatewayError> {
        let code = self.node.get_code(address).await?;
        Ok(!code.is_empty())
    }

    async fn creator_of(&self, address: &Address) -> Result<Option<Address>, GatewayError> {
        self.explorer.contract_creation(address).await
    }

    async fn transactions_of(
        &self,
        address: &Address,
        since_block: u64,
    ) -> Result<Vec<ChainTransaction>, GatewayError> {
        self.explorer.transaction_history(address, since_block).await
    }

    async fn earliest_transactions(
        &self,
        address: &Address,
        limit: u64,
    ) -> Result<Vec<ChainTransaction>, GatewayError> {
        self.explorer.earliest_transactions(address, limit).await
    }
}
