use thiserror::Error;

use crate::ledger::TxHash;

/// Unified error type for the swap library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid slippage: {0}")]
    InvalidSlippage(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient balance: need {required} {symbol}, have {available}")]
    InsufficientBalance {
        symbol: String,
        required: String,
        available: String,
    },

    #[error("abi error: {0}")]
    Abi(#[from] AbiError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors resolving a contract's callable interface.
#[derive(Debug, Error)]
pub enum AbiError {
    #[error("contract {address} is not verified with the explorer: {message}")]
    NotVerified { address: String, message: String },

    #[error("explorer lookup failed: {0}")]
    Transport(String),

    #[error("malformed ABI payload: {0}")]
    Malformed(String),

    #[error("function {name} not present in ABI for {address}")]
    MissingFunction { name: String, address: String },
}

/// Errors from chain reads, writes, and confirmation waits.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("contract reverted{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Reverted { reason: Option<String> },

    #[error("unexpected ledger response: {0}")]
    InvalidResponse(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("no receipt for {tx_hash} within {timeout_secs}s; the transaction may still confirm")]
    ConfirmationTimeout { tx_hash: TxHash, timeout_secs: u64 },
}

/// Errors during ABI encoding and decoding of call data.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid function signature: {0}")]
    InvalidSignature(String),

    #[error("return data too short: expected at least {expected} bytes, got {actual}")]
    DataTooShort { expected: usize, actual: usize },

    #[error("invalid ABI encoding: {0}")]
    InvalidEncoding(String),

    #[error("argument {index} does not match {expected}")]
    ArgumentMismatch { index: usize, expected: String },

    #[error("wrong argument count: expected {expected}, got {actual}")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("unsupported type: {0}")]
    UnsupportedType(String),
}
