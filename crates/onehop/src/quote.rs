//! Quote retrieval and the slippage-bounded minimum-output floor. All
//! arithmetic stays in integer smallest-unit space.

use num_bigint::BigUint;

use crate::contracts::Router;
use crate::error::{CodecError, Error};
use crate::ledger::LedgerClient;
use crate::token::Address;
use crate::units;

/// Fractions are expressed in parts per million.
pub const PPM: u32 = 1_000_000;

/// The exchange's swap fee: 0.25% on PancakeSwap v2.
pub const ROUTER_FEE_PPM: u32 = 2_500;

/// A slippage tolerance, validated to `[0, 1 − fee)` at construction so
/// the minimum-output floor can never go negative or meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slippage {
    ppm: u32,
}

impl Slippage {
    pub fn from_ppm(ppm: u32) -> Result<Self, Error> {
        if ppm + ROUTER_FEE_PPM >= PPM {
            return Err(Error::InvalidSlippage(format!(
                "tolerance {ppm}ppm plus the {ROUTER_FEE_PPM}ppm swap fee reaches 100%"
            )));
        }
        Ok(Self { ppm })
    }

    pub fn from_bps(bps: u32) -> Result<Self, Error> {
        let ppm = bps
            .checked_mul(100)
            .ok_or_else(|| Error::InvalidSlippage(format!("tolerance {bps}bps out of range")))?;
        Self::from_ppm(ppm)
    }

    /// Parse a percentage string like `"0.5"` (meaning 0.5%) exactly.
    pub fn from_percent(text: &str) -> Result<Self, Error> {
        let scaled = units::parse_units(text, 4)
            .map_err(|_| Error::InvalidSlippage(format!("not a percentage: {text}")))?;
        let ppm = u32::try_from(&scaled)
            .map_err(|_| Error::InvalidSlippage(format!("tolerance {text}% out of range")))?;
        Self::from_ppm(ppm)
    }

    pub fn ppm(&self) -> u32 {
        self.ppm
    }

    /// Render as a percentage, e.g. `"0.5"` for 5 000 ppm.
    pub fn percent_string(&self) -> String {
        units::format_units(&BigUint::from(self.ppm), 4)
    }
}

impl Default for Slippage {
    /// The customary default tolerance: 0.5%.
    fn default() -> Self {
        Self { ppm: 5_000 }
    }
}

/// A computed quote for one swap invocation. Derived, never persisted.
#[derive(Debug, Clone)]
pub struct SwapQuote {
    pub expected_out: BigUint,
    pub minimum_out: BigUint,
    pub path: Vec<Address>,
}

/// `floor(expected × (1 − slippage − fee))` in integer space.
pub fn minimum_out(expected: &BigUint, slippage: Slippage) -> BigUint {
    // The keep fraction is positive: construction bounds ppm below PPM − fee.
    let keep = PPM - slippage.ppm - ROUTER_FEE_PPM;
    expected * keep / PPM
}

/// Ask the router for the expected output along `path` and derive the
/// slippage-protected floor.
pub async fn fetch_quote<L: LedgerClient + ?Sized>(
    ledger: &L,
    router: &Router,
    amount_in: &BigUint,
    path: Vec<Address>,
    slippage: Slippage,
) -> Result<SwapQuote, Error> {
    let amounts = router.get_amounts_out(ledger, amount_in, &path).await?;
    let expected_out = amounts
        .last()
        .cloned()
        .ok_or_else(|| CodecError::InvalidEncoding("empty getAmountsOut reply".to_string()))?;
    let minimum_out = minimum_out(&expected_out, slippage);

    Ok(SwapQuote {
        expected_out,
        minimum_out,
        path,
    })
}
