//! Thin RPC façade over the chain node.
//!
//! Pure translation layer: block numbers, log fetches and block timestamps,
//! no side effects beyond network I/O. The [`ChainClient`] trait seam lets
//! the indexer loop be driven by a scripted fake in tests.

mod client;

pub use client::{ChainClient, RawLog, RpcChainClient};
