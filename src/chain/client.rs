use std::{future::IntoFuture, time::Duration};

use alloy::{
    primitives::{Address, Bytes, B256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{Filter, Log},
    transports::{RpcError, TransportErrorKind, TransportResult},
};
use url::Url;

use crate::{errors::IndexerError, utils::hex_encode};

/// A raw, undecoded log as returned by the node.
///
/// Decoupled from the transport's log type so fakes can construct them
/// directly in tests.
#[derive(Debug, Clone)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub tx_hash: String,
    pub log_index: u32,
}

impl From<Log> for RawLog {
    fn from(log: Log) -> Self {
        Self {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            block_number: log.block_number.unwrap_or(0),
            tx_hash: log
                .transaction_hash
                .map(|h| hex_encode(h.as_slice()))
                .unwrap_or_default(),
            log_index: log.log_index.unwrap_or(0) as u32,
        }
    }
}

/// Read-only chain access used by the indexer loop.
///
/// Failure contract: unreachable node or request timeout surfaces as
/// [`IndexerError::RpcUnavailable`] (transient, retryable); a node-imposed
/// log-range rejection surfaces as [`IndexerError::RangeTooLarge`] and
/// triggers batch halving in the caller.
#[allow(async_fn_in_trait)]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, IndexerError>;

    async fn latest_block_number(&self) -> Result<u64, IndexerError>;

    async fn get_logs(
        &self,
        addresses: &[Address],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, IndexerError>;

    async fn block_timestamp(&self, block_number: u64) -> Result<u64, IndexerError>;
}

/// Production [`ChainClient`] over a JSON-RPC HTTP endpoint.
pub struct RpcChainClient {
    provider: DynProvider,
    request_timeout: Duration,
}

impl RpcChainClient {
    pub fn connect(rpc_url: &str, request_timeout: Duration) -> Result<Self, IndexerError> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| IndexerError::InvalidInput(format!("invalid rpc url {rpc_url:?}: {e}")))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self {
            provider,
            request_timeout,
        })
    }

    async fn with_timeout<T>(
        &self,
        fut: impl IntoFuture<Output = TransportResult<T>>,
    ) -> Result<T, IndexerError> {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(result) => result.map_err(|e| IndexerError::RpcUnavailable(e.to_string())),
            Err(_) => Err(IndexerError::RpcUnavailable(format!(
                "request timed out after {:?}",
                self.request_timeout
            ))),
        }
    }
}

/// Nodes phrase "too wide a getLogs query" inconsistently; match the common
/// wordings and treat everything else as transient.
fn is_range_rejection(err: &RpcError<TransportErrorKind>) -> bool {
    if let RpcError::ErrorResp(payload) = err {
        let message = payload.message.to_lowercase();
        return message.contains("range")
            || message.contains("too large")
            || message.contains("too many")
            || message.contains("limit");
    }
    false
}

impl ChainClient for RpcChainClient {
    async fn chain_id(&self) -> Result<u64, IndexerError> {
        self.with_timeout(self.provider.get_chain_id()).await
    }

    async fn latest_block_number(&self) -> Result<u64, IndexerError> {
        self.with_timeout(self.provider.get_block_number()).await
    }

    async fn get_logs(
        &self,
        addresses: &[Address],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, IndexerError> {
        let filter = Filter::new()
            .address(addresses.to_vec())
            .from_block(from_block)
            .to_block(to_block);

        let result = match tokio::time::timeout(
            self.request_timeout,
            self.provider.get_logs(&filter),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                return Err(IndexerError::RpcUnavailable(format!(
                    "get_logs timed out after {:?}",
                    self.request_timeout
                )))
            },
        };

        match result {
            Ok(logs) => Ok(logs.into_iter().map(RawLog::from).collect()),
            Err(e) if is_range_rejection(&e) => Err(IndexerError::RangeTooLarge {
                from: from_block,
                to: to_block,
            }),
            Err(e) => Err(IndexerError::RpcUnavailable(e.to_string())),
        }
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<u64, IndexerError> {
        let block = self
            .with_timeout(self.provider.get_block_by_number(block_number.into()))
            .await?
            .ok_or_else(|| {
                IndexerError::RpcUnavailable(format!("block {block_number} not available"))
            })?;
        Ok(block.header.timestamp)
    }
}
