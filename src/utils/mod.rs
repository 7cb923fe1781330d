//! Utility functions for the lendex indexer.
//!
//! - [`conversion`] - Type conversions (U256, f64, hex encoding, mantissas)

mod conversion;

// ============================================
// Common Constants
// ============================================

/// The Ethereum zero address (0x0000000000000000000000000000000000000000)
/// Used as the counterparty of mint/burn transfer legs.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

// ============================================
// Re-exports
// ============================================

pub use conversion::{hex_encode, mantissa_to_f64, u256_to_f64, u256_to_f64_safe};
