//! One-time router approval. The design approves the maximum amount
//! once, then treats any allowance at or above a sufficiency floor as
//! "already approved" so repeated trades never churn approvals.

use std::collections::HashSet;

use num_bigint::BigUint;
use tokio::sync::Mutex;
use tracing::debug;

use crate::contracts::Erc20;
use crate::error::Error;
use crate::events::{ProgressSink, TradeEvent};
use crate::ledger::{submit_transaction, LedgerClient, Receipt, SubmitOptions};
use crate::signer::Signer;
use crate::token::Address;

/// `2^256 − 1`, the amount passed to `approve`.
pub fn max_uint256() -> BigUint {
    (BigUint::from(1u8) << 256u32) - 1u8
}

/// Default sufficiency floor: half of the maximum approval. Anything at
/// or above it is considered practically unlimited.
pub fn default_sufficiency_floor() -> BigUint {
    max_uint256() >> 1
}

/// Ensures a spender holds a practically unlimited allowance before a
/// swap. Idempotent: at most one on-chain write per `(token, spender)`
/// pair, and none when the existing allowance already clears the floor.
pub struct ApprovalManager {
    floor: BigUint,
    granted: Mutex<HashSet<(Address, Address)>>,
}

impl ApprovalManager {
    pub fn new() -> Self {
        Self::with_floor(default_sufficiency_floor())
    }

    /// Override the sufficiency floor.
    pub fn with_floor(floor: BigUint) -> Self {
        Self {
            floor,
            granted: Mutex::new(HashSet::new()),
        }
    }

    /// Check the current allowance and approve the maximum amount if it
    /// falls short. Returns the approval receipt, or `None` when no
    /// write was needed.
    pub async fn ensure_allowance<L: LedgerClient + ?Sized>(
        &self,
        ledger: &L,
        signer: &dyn Signer,
        erc20: &Erc20,
        symbol: &str,
        spender: &Address,
        options: &SubmitOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Option<Receipt>, Error> {
        let key = (erc20.address, *spender);
        if self.granted.lock().await.contains(&key) {
            debug!(token = symbol, "approval already confirmed this session");
            return Ok(None);
        }

        sink.emit(&TradeEvent::CheckingApproval {
            symbol: symbol.to_string(),
            spender: *spender,
        });

        let owner = signer.address();
        let current = erc20.allowance(ledger, &owner, spender).await?;
        if current >= self.floor {
            sink.emit(&TradeEvent::AllowanceSufficient {
                symbol: symbol.to_string(),
            });
            self.granted.lock().await.insert(key);
            return Ok(None);
        }

        let calldata = erc20.approve_calldata(spender, &max_uint256())?;
        let receipt =
            submit_transaction(ledger, signer, &erc20.address, calldata, options, sink).await?;
        sink.emit(&TradeEvent::ApprovalConfirmed {
            symbol: symbol.to_string(),
            block_number: receipt.block_number,
        });

        self.granted.lock().await.insert(key);
        Ok(Some(receipt))
    }
}

impl Default for ApprovalManager {
    fn default() -> Self {
        Self::new()
    }
}
