use std::{sync::Arc, time::Duration};

use alloy::primitives::Address;
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    chain::ChainClient,
    db::EventStore,
    errors::IndexerError,
    worker::decoder::ContractRegistry,
};

/// Outcome of one poll cycle, driving the scheduling decision for the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Chain tip has not advanced past the checkpoint; sleep until next poll.
    NoNewBlocks,
    /// A batch was fetched, decoded and persisted, and the checkpoint
    /// advanced to `to`. More blocks may remain; continue immediately.
    Indexed { from: u64, to: u64, stored: usize },
    /// The node rejected the range; the batch size was halved and the same
    /// starting block is retried immediately, checkpoint untouched.
    Shrunk { batch_size: u64 },
}

/// Health status exposed to the external query layer.
#[derive(Debug, Clone, Serialize)]
pub struct IndexerStatus {
    pub chain_id: u64,
    pub latest_block: u64,
    pub indexed_to_block: Option<u64>,
}

pub async fn indexer_status<C: ChainClient>(
    client: &C,
    store: &EventStore,
) -> Result<IndexerStatus, IndexerError> {
    Ok(IndexerStatus {
        chain_id: client.chain_id().await?,
        latest_block: client.latest_block_number().await?,
        indexed_to_block: store.checkpoint()?,
    })
}

/// The polling indexer loop: IDLE → FETCHING → DECODING → PERSISTING, one
/// cycle in flight at a time.
///
/// Each cycle reads the checkpoint `C`, targets `T = min(latest, C + batch)`,
/// fetches logs for `(C+1, T)` across the static contract address set,
/// decodes them (unknown signatures skipped), persists the decoded events in
/// one durable write and only then advances the checkpoint to `T`.
///
/// Failure policy: `RpcUnavailable` leaves all state untouched and the same
/// range is retried on the next poll tick; `RangeTooLarge` halves the batch
/// (floor 1 block) and retries immediately. After a successful batch the
/// size grows back toward the configured maximum.
pub struct IndexerWorker<C: ChainClient> {
    client: C,
    store: Arc<EventStore>,
    registry: ContractRegistry,
    addresses: Vec<Address>,
    poll_interval: Duration,
    max_batch_size: u64,
    current_batch_size: u64,
    initial_lookback: u64,
    timestamps: FxHashMap<u64, u64>,
}

impl<C: ChainClient> IndexerWorker<C> {
    pub fn new(
        client: C,
        store: Arc<EventStore>,
        registry: ContractRegistry,
        poll_interval: Duration,
        batch_size: u64,
        initial_lookback: u64,
    ) -> Self {
        let addresses = registry.addresses();
        Self {
            client,
            store,
            registry,
            addresses,
            poll_interval,
            max_batch_size: batch_size.max(1),
            current_batch_size: batch_size.max(1),
            initial_lookback,
            timestamps: FxHashMap::default(),
        }
    }

    pub fn current_batch_size(&self) -> u64 {
        self.current_batch_size
    }

    /// Block timestamps are immutable per block; cache them across cycles so
    /// a batch with many logs in one block costs a single RPC call.
    async fn block_timestamp(&mut self, block_number: u64) -> Result<u64, IndexerError> {
        if let Some(timestamp) = self.timestamps.get(&block_number) {
            return Ok(*timestamp);
        }
        let timestamp = self.client.block_timestamp(block_number).await?;
        self.timestamps.insert(block_number, timestamp);
        Ok(timestamp)
    }

    /// Run one poll cycle. Errors other than the ones encoded in
    /// [`TickOutcome`] leave the store untouched: either the whole range's
    /// events are persisted and the checkpoint advanced, or neither.
    pub async fn tick(&mut self) -> Result<TickOutcome, IndexerError> {
        // FETCHING: establish the target range
        let latest = self.client.latest_block_number().await?;
        let checkpoint = match self.store.checkpoint()? {
            Some(checkpoint) => checkpoint,
            None => {
                // First run: bound startup cost to a recent window
                let start = latest.saturating_sub(self.initial_lookback);
                info!(
                    "no checkpoint found, starting {} blocks behind tip at block {}",
                    self.initial_lookback, start
                );
                self.store.set_checkpoint(start)?;
                start
            },
        };

        if latest <= checkpoint {
            return Ok(TickOutcome::NoNewBlocks);
        }

        let from = checkpoint + 1;
        let to = latest.min(checkpoint.saturating_add(self.current_batch_size));

        let logs = match self.client.get_logs(&self.addresses, from, to).await {
            Ok(logs) => logs,
            Err(IndexerError::RangeTooLarge { .. }) => {
                self.current_batch_size = (self.current_batch_size / 2).max(1);
                warn!(
                    "node rejected range {}..={}, shrinking batch to {} blocks",
                    from, to, self.current_batch_size
                );
                return Ok(TickOutcome::Shrunk {
                    batch_size: self.current_batch_size,
                });
            },
            Err(e) => return Err(e),
        };

        // DECODING: unknown signatures are skipped, not errors
        let mut events = Vec::with_capacity(logs.len());
        for raw in &logs {
            let timestamp = self.block_timestamp(raw.block_number).await?;
            if let Some(event) = self.registry.decode(raw, timestamp) {
                events.push(event);
            }
        }

        // PERSISTING: durable write, then advance the checkpoint
        let stored = self.store.insert(&events)?;
        self.store.set_checkpoint(to)?;

        if self.current_batch_size < self.max_batch_size {
            self.current_batch_size = (self.current_batch_size * 2).min(self.max_batch_size);
        }

        debug!(
            "indexed blocks {}..={}: {} logs, {} decoded, {} new",
            from,
            to,
            logs.len(),
            events.len(),
            stored
        );
        Ok(TickOutcome::Indexed { from, to, stored })
    }

    /// Drive the loop until cancelled. Transient RPC failures back off to
    /// the next poll tick; anything else is fatal for the task.
    pub async fn run(mut self, cancellation_token: CancellationToken) -> Result<(), IndexerError> {
        info!(
            "indexer started: {} contracts, batch size {}, poll interval {:?}",
            self.addresses.len(),
            self.max_batch_size,
            self.poll_interval
        );

        loop {
            if cancellation_token.is_cancelled() {
                info!("indexer received cancellation signal");
                return Ok(());
            }

            let sleep = match self.tick().await {
                Ok(TickOutcome::Indexed { from, to, stored }) => {
                    if stored > 0 {
                        info!("indexed blocks {}..={} ({} new events)", from, to, stored);
                    }
                    // Keep catching up without sleeping while behind
                    false
                },
                Ok(TickOutcome::Shrunk { .. }) => false,
                Ok(TickOutcome::NoNewBlocks) => true,
                Err(IndexerError::RpcUnavailable(reason)) => {
                    warn!("chain node unavailable, retrying next tick: {}", reason);
                    true
                },
                Err(e) => return Err(e),
            };

            if sleep {
                tokio::select! {
                    _ = cancellation_token.cancelled() => {},
                    _ = tokio::time::sleep(self.poll_interval) => {},
                }
            }
        }
    }
}
