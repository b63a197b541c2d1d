//! Progress reporting. Stage notifications stream through a caller-
//! supplied sink instead of being printed; rendering to human-readable
//! decimal form happens here, at the reporting boundary, and nowhere
//! else.

use std::fmt;

use num_bigint::BigUint;

use crate::ledger::TxHash;
use crate::token::Address;
use crate::units::format_units;

/// Stage notifications emitted while a trade executes.
#[derive(Debug, Clone)]
pub enum TradeEvent {
    SwapStarted {
        base_symbol: String,
        desired_symbol: String,
        slippage_percent: String,
    },
    CheckingApproval {
        symbol: String,
        spender: Address,
    },
    AllowanceSufficient {
        symbol: String,
    },
    ApprovalConfirmed {
        symbol: String,
        block_number: u64,
    },
    QuoteReceived {
        symbol: String,
        decimals: u8,
        expected_out: BigUint,
        minimum_out: BigUint,
    },
    DeadlineSet {
        unix: u64,
    },
    GasPrice {
        wei: BigUint,
    },
    EstimatedGasCost {
        wei: BigUint,
    },
    TransactionSent {
        hash: TxHash,
    },
    TransactionConfirmed {
        hash: TxHash,
        block_number: u64,
    },
    ReceiptPending {
        hash: TxHash,
    },
    SwapCancelled,
    BalancesUpdated {
        base_symbol: String,
        base_decimals: u8,
        base_amount: BigUint,
        desired_symbol: String,
        desired_decimals: u8,
        desired_amount: BigUint,
    },
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeEvent::SwapStarted {
                base_symbol,
                desired_symbol,
                slippage_percent,
            } => write!(
                f,
                "starting swap {base_symbol} -> {desired_symbol} (slippage {slippage_percent}%)"
            ),
            TradeEvent::CheckingApproval { symbol, spender } => {
                write!(f, "checking {symbol} approval for {spender}")
            }
            TradeEvent::AllowanceSufficient { symbol } => {
                write!(f, "{symbol} already approved")
            }
            TradeEvent::ApprovalConfirmed {
                symbol,
                block_number,
            } => write!(f, "{symbol} approval confirmed in block #{block_number}"),
            TradeEvent::QuoteReceived {
                symbol,
                decimals,
                expected_out,
                minimum_out,
            } => write!(
                f,
                "expected output {} {symbol}, minimum after slippage {} {symbol}",
                format_units(expected_out, *decimals),
                format_units(minimum_out, *decimals),
            ),
            TradeEvent::DeadlineSet { unix } => {
                write!(f, "transaction deadline: {}", format_deadline(*unix))
            }
            TradeEvent::GasPrice { wei } => {
                write!(f, "current gas price: {} Gwei", format_units(wei, 9))
            }
            TradeEvent::EstimatedGasCost { wei } => {
                write!(f, "estimated gas cost: {}", format_units(wei, 18))
            }
            TradeEvent::TransactionSent { hash } => write!(f, "transaction sent: {hash}"),
            TradeEvent::TransactionConfirmed { hash, block_number } => {
                write!(f, "transaction {hash} confirmed in block #{block_number}")
            }
            TradeEvent::ReceiptPending { hash } => {
                write!(f, "no receipt yet for {hash}; the swap may still confirm")
            }
            TradeEvent::SwapCancelled => write!(f, "swap cancelled"),
            TradeEvent::BalancesUpdated {
                base_symbol,
                base_decimals,
                base_amount,
                desired_symbol,
                desired_decimals,
                desired_amount,
            } => write!(
                f,
                "balances: {} {base_symbol}, {} {desired_symbol}",
                format_units(base_amount, *base_decimals),
                format_units(desired_amount, *desired_decimals),
            ),
        }
    }
}

fn format_deadline(unix: u64) -> String {
    let Ok(timestamp) = i64::try_from(unix) else {
        return unix.to_string();
    };
    let Ok(dt) = time::OffsetDateTime::from_unix_timestamp(timestamp) else {
        return unix.to_string();
    };
    let format = time::macros::format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second] UTC"
    );
    dt.format(format).unwrap_or_else(|_| unix.to_string())
}

/// Receives stage notifications as the trade progresses.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &TradeEvent);
}

/// Discards all events.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: &TradeEvent) {}
}

/// Collects events in memory; useful in tests and for deferred display.
#[derive(Default)]
pub struct MemorySink {
    events: std::sync::Mutex<Vec<TradeEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TradeEvent> {
        self.events.lock().expect("sink lock").clone()
    }
}

impl ProgressSink for MemorySink {
    fn emit(&self, event: &TradeEvent) {
        self.events.lock().expect("sink lock").push(event.clone());
    }
}
