//! 256-bit unsigned token amounts.
//!
//! All monetary quantities in the protocol are 256-bit unsigned integers.
//! Arithmetic on balances must go through the checked operations; overflow
//! and underflow are surfaced as errors, never wrapped.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer for token amounts and prices.
    pub struct U256(4);
}

/// Price precision: prices are expressed in quote-token base units per
/// `10^18` base-token units.
pub fn price_precision() -> U256 {
    U256::exp10(18)
}

impl U256 {
    /// Parse from an unsigned decimal string, the wire encoding for all
    /// 256-bit integers.
    pub fn from_decimal(s: &str) -> Result<Self, uint::FromDecStrErr> {
        U256::from_dec_str(s)
    }
}

// Wire integers are unsigned decimal strings; Display on U256 is already
// decimal, so serde goes through strings in both directions.
impl Serialize for U256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for U256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute the quote-token cost of `quantity` base units at `price`,
/// where `price` is quote units per `10^18` base units.
///
/// Returns `None` on multiplication overflow.
pub fn quote_cost(quantity: U256, price: U256) -> Option<U256> {
    quantity.checked_mul(price)?.checked_div(price_precision())
}
