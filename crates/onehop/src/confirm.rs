//! Trade confirmation boundary. The pipeline never builds or signs a
//! swap transaction without an affirmative answer from this capability.

use std::fmt;

use async_trait::async_trait;
use num_bigint::BigUint;

use crate::token::Token;
use crate::units::format_units;

/// The parameters presented to the caller before submission.
#[derive(Debug, Clone)]
pub struct TradeSummary {
    pub base: Token,
    pub desired: Token,
    pub amount_in: BigUint,
    pub expected_out: BigUint,
    pub minimum_out: BigUint,
    pub deadline: u64,
}

impl fmt::Display for TradeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "swap {} {} for ~{} {} (minimum {})",
            format_units(&self.amount_in, self.base.decimals),
            self.base.symbol,
            format_units(&self.expected_out, self.desired.decimals),
            self.desired.symbol,
            format_units(&self.minimum_out, self.desired.decimals),
        )
    }
}

/// Asked once per swap, after quoting and before transaction build.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, summary: &TradeSummary) -> bool;
}

/// Approves every trade. For headless use where the caller has already
/// decided.
pub struct AlwaysConfirm;

#[async_trait]
impl Confirm for AlwaysConfirm {
    async fn confirm(&self, _summary: &TradeSummary) -> bool {
        true
    }
}

/// Rejects every trade.
pub struct NeverConfirm;

#[async_trait]
impl Confirm for NeverConfirm {
    async fn confirm(&self, _summary: &TradeSummary) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display() {
        let base = Token::new("BUSD", "0xe9e7cea3dedca5984780bafc599bd69add087d56", 18).unwrap();
        let desired = Token::new("CAKE", "0x0e09fabb73bd3ade0a17ecc321fd13a19e81ce82", 18).unwrap();
        let summary = TradeSummary {
            base,
            desired,
            amount_in: "10000000000000000000".parse().unwrap(),
            expected_out: "500000000000000000".parse().unwrap(),
            minimum_out: "496250000000000000".parse().unwrap(),
            deadline: 1_700_000_300,
        };
        assert_eq!(
            summary.to_string(),
            "swap 10 BUSD for ~0.5 CAKE (minimum 0.49625)"
        );
    }
}
