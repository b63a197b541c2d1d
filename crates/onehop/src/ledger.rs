//! Chain access boundary: the capability trait the swap pipeline
//! depends on, plus transaction assembly (EIP-155 legacy RLP), signing,
//! broadcast, and the bounded receipt wait.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use num_bigint::BigUint;
use tiny_keccak::{Hasher, Keccak};
use tracing::{debug, warn};

use crate::error::LedgerError;
use crate::events::{ProgressSink, TradeEvent};
use crate::signer::Signer;
use crate::token::Address;

/// A 32-byte transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|_| LedgerError::InvalidResponse(format!("bad tx hash: {s}")))?;
        if bytes.len() != 32 {
            return Err(LedgerError::InvalidResponse(format!("bad tx hash length: {s}")));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(TxHash(hash))
    }
}

/// Fields of an unsigned legacy transaction.
#[derive(Debug, Clone)]
pub struct TxRequest {
    pub nonce: u64,
    pub gas_price: BigUint,
    pub gas_limit: u64,
    pub chain_id: u64,
    pub to: Address,
    pub value: BigUint,
    pub data: Vec<u8>,
}

/// The mined-transaction summary the pipeline reports on.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub status: bool,
    pub block_number: u64,
    pub transaction_hash: TxHash,
}

/// Chain read/write capabilities. Implementations own transport details;
/// the core sequences calls against this surface only.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, LedgerError>;

    async fn gas_price(&self) -> Result<BigUint, LedgerError>;

    async fn transaction_count(&self, address: &Address) -> Result<u64, LedgerError>;

    /// Read-only contract call; returns the raw return data.
    async fn call(&self, to: &Address, data: Vec<u8>) -> Result<Vec<u8>, LedgerError>;

    /// Best-effort gas ceiling. Callers fall back to a constant when this
    /// fails.
    async fn estimate_gas(
        &self,
        from: &Address,
        to: &Address,
        data: Vec<u8>,
    ) -> Result<u64, LedgerError>;

    async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<TxHash, LedgerError>;

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, LedgerError>;
}

/// Knobs for the submission pipeline.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    /// Gas ceiling used when `estimate_gas` is unavailable.
    pub gas_fallback: u64,
    pub receipt_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            gas_fallback: 500_000,
            receipt_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(3),
        }
    }
}

/// The full write path: assemble nonce/gas/chain-id, sign, broadcast,
/// and wait for the receipt. Gas price, estimated cost, the hash, and
/// the confirmation block stream through the sink. A mined receipt with
/// failed status surfaces as a revert.
pub async fn submit_transaction<L: LedgerClient + ?Sized>(
    client: &L,
    signer: &dyn Signer,
    to: &Address,
    data: Vec<u8>,
    options: &SubmitOptions,
    sink: &dyn ProgressSink,
) -> Result<Receipt, LedgerError> {
    let from = signer.address();

    let gas_price = client.gas_price().await?;
    sink.emit(&TradeEvent::GasPrice {
        wei: gas_price.clone(),
    });

    let gas_limit = match client.estimate_gas(&from, to, data.clone()).await {
        Ok(estimate) => estimate,
        Err(e) => {
            warn!(error = %e, fallback = options.gas_fallback, "gas estimation unavailable");
            options.gas_fallback
        }
    };
    sink.emit(&TradeEvent::EstimatedGasCost {
        wei: &gas_price * gas_limit,
    });

    let request = TxRequest {
        nonce: client.transaction_count(&from).await?,
        gas_price,
        gas_limit,
        chain_id: client.chain_id().await?,
        to: *to,
        value: BigUint::from(0u8),
        data,
    };

    let hash = sign_and_send(client, signer, &request).await?;
    sink.emit(&TradeEvent::TransactionSent { hash });

    let receipt = await_receipt(client, &hash, options.receipt_timeout, options.poll_interval).await?;
    if !receipt.status {
        return Err(LedgerError::Reverted { reason: None });
    }
    sink.emit(&TradeEvent::TransactionConfirmed {
        hash,
        block_number: receipt.block_number,
    });
    Ok(receipt)
}

/// Sign a transaction with the given credential and broadcast it.
pub async fn sign_and_send<L: LedgerClient + ?Sized>(
    client: &L,
    signer: &dyn Signer,
    request: &TxRequest,
) -> Result<TxHash, LedgerError> {
    let digest = signing_digest(request);
    let signature = signer
        .sign_digest(&digest)
        .map_err(|e| LedgerError::Signing(e.to_string()))?;

    let v = u64::from(signature.recovery_id) + request.chain_id * 2 + 35;
    let raw = encode_signed(request, v, &signature.r, &signature.s);

    debug!(to = %request.to, nonce = request.nonce, "broadcasting transaction");
    client.send_raw_transaction(raw).await
}

/// Poll for a receipt until mined or the timeout elapses. A timeout is a
/// distinct outcome: the transaction may still confirm later.
pub async fn await_receipt<L: LedgerClient + ?Sized>(
    client: &L,
    hash: &TxHash,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Receipt, LedgerError> {
    let started = Instant::now();
    loop {
        if let Some(receipt) = client.transaction_receipt(hash).await? {
            return Ok(receipt);
        }
        if started.elapsed() >= timeout {
            return Err(LedgerError::ConfirmationTimeout {
                tx_hash: *hash,
                timeout_secs: timeout.as_secs(),
            });
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Keccak digest of the EIP-155 signing payload:
/// `rlp([nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0])`.
pub fn signing_digest(request: &TxRequest) -> [u8; 32] {
    let payload = rlp_list(&[
        rlp_u64(request.nonce),
        rlp_uint(&request.gas_price),
        rlp_u64(request.gas_limit),
        rlp_bytes(request.to.as_bytes()),
        rlp_uint(&request.value),
        rlp_bytes(&request.data),
        rlp_u64(request.chain_id),
        rlp_u64(0),
        rlp_u64(0),
    ]);
    keccak256(&payload)
}

fn encode_signed(request: &TxRequest, v: u64, r: &[u8; 32], s: &[u8; 32]) -> Vec<u8> {
    rlp_list(&[
        rlp_u64(request.nonce),
        rlp_uint(&request.gas_price),
        rlp_u64(request.gas_limit),
        rlp_bytes(request.to.as_bytes()),
        rlp_uint(&request.value),
        rlp_bytes(&request.data),
        rlp_u64(v),
        rlp_bytes(trim_leading_zeros(r)),
        rlp_bytes(trim_leading_zeros(s)),
    ])
}

pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

// Minimal RLP encoder covering only the byte-string and list forms
// transaction assembly needs.

fn rlp_bytes(payload: &[u8]) -> Vec<u8> {
    if payload.len() == 1 && payload[0] < 0x80 {
        return payload.to_vec();
    }
    let mut out = rlp_length(payload.len(), 0x80);
    out.extend_from_slice(payload);
    out
}

fn rlp_uint(n: &BigUint) -> Vec<u8> {
    if n.bits() == 0 {
        // Zero is the empty byte string in RLP
        vec![0x80]
    } else {
        rlp_bytes(&n.to_bytes_be())
    }
}

fn rlp_u64(n: u64) -> Vec<u8> {
    rlp_uint(&BigUint::from(n))
}

fn rlp_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.concat();
    let mut out = rlp_length(payload.len(), 0xc0);
    out.extend_from_slice(&payload);
    out
}

fn rlp_length(len: usize, offset: u8) -> Vec<u8> {
    if len <= 55 {
        vec![offset + len as u8]
    } else {
        let len_bytes = (len as u64).to_be_bytes();
        let trimmed = trim_leading_zeros(&len_bytes);
        let mut out = vec![offset + 55 + trimmed.len() as u8];
        out.extend_from_slice(trimmed);
        out
    }
}
