//! Type conversion and formatting utilities.
//!
//! Functions for converting between protocol numeric types (U256 raw amounts,
//! 1e18 fixed-point mantissas) and f64 with proper decimal handling.

use alloy::primitives::{hex, U256};
use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;

/// Number of decimals used by protocol fixed-point mantissas
/// (collateral factors, prices, reward rates).
pub const MANTISSA_DECIMALS: u8 = 18;

static POW10: Lazy<Vec<BigDecimal>> = Lazy::new(|| {
    (0..=77u32)
        .map(|exp| BigDecimal::from(BigInt::from(10u8).pow(exp)))
        .collect()
});

fn big_pow10(decimals: u8) -> &'static BigDecimal {
    &POW10[decimals as usize]
}

// ============================================
// Hex Encoding
// ============================================

/// Encode bytes as a lowercase hex string with 0x prefix.
pub fn hex_encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ============================================
// U256 Conversions
// ============================================

/// Convert U256 to f64 with decimal adjustment using BigDecimal for precision.
///
/// Avoids the precision loss of a direct f64 cast for values above 2^53.
/// Returns 0.0 if the conversion fails.
pub fn u256_to_f64(value: U256, decimals: u8) -> f64 {
    u256_to_f64_safe(value, decimals).unwrap_or(0.0)
}

/// Convert U256 to f64 with decimal adjustment, returning `None` when the
/// result is not a finite f64.
pub fn u256_to_f64_safe(value: U256, decimals: u8) -> Option<f64> {
    // Convert U256 to BigDecimal via bytes (faster than string parsing)
    let bytes: [u8; 32] = value.to_le_bytes();
    let big_int = BigInt::from_bytes_le(num_bigint::Sign::Plus, &bytes);
    let big_value = BigDecimal::from(big_int);

    let adjusted = big_value / big_pow10(decimals);

    let result = adjusted.to_f64()?;

    if result.is_finite() {
        Some(result)
    } else {
        None
    }
}

/// Convert a 1e18 fixed-point mantissa (collateral factor, USD price,
/// reward rate) to its f64 value.
pub fn mantissa_to_f64(value: U256) -> f64 {
    u256_to_f64(value, MANTISSA_DECIMALS)
}
