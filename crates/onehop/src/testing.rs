//! Shared test fixtures: ABI documents for the two contracts and a
//! scripted in-memory ledger.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use num_bigint::BigUint;

use crate::codec::{self, AbiValue, ParamType};
use crate::error::LedgerError;
use crate::ledger::{keccak256, LedgerClient, Receipt, TxHash};
use crate::token::Address;

pub(crate) fn erc20_abi_json() -> &'static str {
    r#"[
        {"type":"function","name":"balanceOf","inputs":[{"name":"account","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
        {"type":"function","name":"allowance","inputs":[{"name":"owner","type":"address"},{"name":"spender","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
        {"type":"function","name":"approve","inputs":[{"name":"spender","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]}
    ]"#
}

pub(crate) fn router_abi_json() -> &'static str {
    r#"[
        {"type":"function","name":"getAmountsOut","inputs":[{"name":"amountIn","type":"uint256"},{"name":"path","type":"address[]"}],"outputs":[{"name":"amounts","type":"uint256[]"}]},
        {"type":"function","name":"swapExactTokensForTokens","inputs":[{"name":"amountIn","type":"uint256"},{"name":"amountOutMin","type":"uint256"},{"name":"path","type":"address[]"},{"name":"to","type":"address"},{"name":"deadline","type":"uint256"}],"outputs":[{"name":"amounts","type":"uint256[]"}]}
    ]"#
}

const SELECTOR_BALANCE_OF: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
const SELECTOR_ALLOWANCE: [u8; 4] = [0xdd, 0x62, 0xed, 0x3e];
const SELECTOR_APPROVE: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];
const SELECTOR_GET_AMOUNTS_OUT: [u8; 4] = [0xd0, 0x6c, 0xa6, 0x1f];

/// Scripted ledger. Reads answer from configured state; broadcasts are
/// recorded, and an `approve` broadcast raises the scripted allowance to
/// the approved amount.
pub(crate) struct MockLedger {
    chain_id: u64,
    gas_price: BigUint,
    nonce: u64,
    balances: Mutex<HashMap<(Address, Address), BigUint>>,
    allowance: Mutex<BigUint>,
    amounts_out: Mutex<Vec<BigUint>>,
    sent: Mutex<Vec<Vec<u8>>>,
    mine_receipts: Mutex<bool>,
    receipt_status: Mutex<bool>,
    fail_reads: Mutex<bool>,
    fail_gas_estimate: Mutex<bool>,
}

impl MockLedger {
    pub(crate) fn new() -> Self {
        Self {
            chain_id: 56,
            gas_price: BigUint::from(5_000_000_000u64),
            nonce: 7,
            balances: Mutex::new(HashMap::new()),
            allowance: Mutex::new(BigUint::from(0u8)),
            amounts_out: Mutex::new(vec![]),
            sent: Mutex::new(vec![]),
            mine_receipts: Mutex::new(true),
            receipt_status: Mutex::new(true),
            fail_reads: Mutex::new(false),
            fail_gas_estimate: Mutex::new(false),
        }
    }

    pub(crate) fn set_balance(&self, token: Address, owner: Address, amount: BigUint) {
        self.balances.lock().unwrap().insert((token, owner), amount);
    }

    pub(crate) fn set_allowance(&self, amount: BigUint) {
        *self.allowance.lock().unwrap() = amount;
    }

    pub(crate) fn set_amounts_out(&self, amounts: Vec<BigUint>) {
        *self.amounts_out.lock().unwrap() = amounts;
    }

    /// Receipts never appear; `await_receipt` will time out.
    pub(crate) fn never_mine(&self) {
        *self.mine_receipts.lock().unwrap() = false;
    }

    pub(crate) fn set_receipt_status(&self, status: bool) {
        *self.receipt_status.lock().unwrap() = status;
    }

    pub(crate) fn fail_reads(&self) {
        *self.fail_reads.lock().unwrap() = true;
    }

    pub(crate) fn fail_gas_estimate(&self) {
        *self.fail_gas_estimate.lock().unwrap() = true;
    }

    pub(crate) fn sent_transactions(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// Whether any broadcast transaction carries the given calldata
    /// selector.
    pub(crate) fn sent_with_selector(&self, selector: &[u8; 4]) -> bool {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .any(|raw| raw.windows(4).any(|w| w == selector))
    }

    fn encode_uint(n: &BigUint) -> Vec<u8> {
        codec::encode_arguments(&[ParamType::Uint(256)], &[AbiValue::Uint(n.clone())])
            .expect("uint encodes")
    }
}

pub(crate) const APPROVE_SELECTOR: [u8; 4] = SELECTOR_APPROVE;
pub(crate) const SWAP_SELECTOR: [u8; 4] = [0x38, 0xed, 0x17, 0x39];

#[async_trait]
impl LedgerClient for MockLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        Ok(self.chain_id)
    }

    async fn gas_price(&self) -> Result<BigUint, LedgerError> {
        Ok(self.gas_price.clone())
    }

    async fn transaction_count(&self, _address: &Address) -> Result<u64, LedgerError> {
        Ok(self.nonce)
    }

    async fn call(&self, to: &Address, data: Vec<u8>) -> Result<Vec<u8>, LedgerError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(LedgerError::Unavailable("scripted read failure".to_string()));
        }
        if data.len() < 4 {
            return Err(LedgerError::InvalidResponse("short calldata".to_string()));
        }

        let selector: [u8; 4] = data[..4].try_into().expect("four bytes");
        match selector {
            SELECTOR_BALANCE_OF => {
                let mut owner = [0u8; 20];
                owner.copy_from_slice(&data[16..36]);
                let balance = self
                    .balances
                    .lock()
                    .unwrap()
                    .get(&(*to, Address(owner)))
                    .cloned()
                    .unwrap_or_default();
                Ok(Self::encode_uint(&balance))
            }
            SELECTOR_ALLOWANCE => Ok(Self::encode_uint(&self.allowance.lock().unwrap())),
            SELECTOR_GET_AMOUNTS_OUT => {
                let amounts = self.amounts_out.lock().unwrap().clone();
                let values: Vec<AbiValue> = amounts.into_iter().map(AbiValue::Uint).collect();
                codec::encode_arguments(
                    &[ParamType::Array(Box::new(ParamType::Uint(256)))],
                    &[AbiValue::Array(values)],
                )
                .map_err(|e| LedgerError::InvalidResponse(e.to_string()))
            }
            _ => Err(LedgerError::InvalidResponse(format!(
                "unscripted selector 0x{}",
                hex::encode(selector)
            ))),
        }
    }

    async fn estimate_gas(
        &self,
        _from: &Address,
        _to: &Address,
        _data: Vec<u8>,
    ) -> Result<u64, LedgerError> {
        if *self.fail_gas_estimate.lock().unwrap() {
            return Err(LedgerError::Unavailable("estimation unsupported".to_string()));
        }
        Ok(180_000)
    }

    async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<TxHash, LedgerError> {
        // An approve broadcast takes effect on the scripted allowance, so
        // a subsequent sufficiency check passes the way it would on chain.
        if raw.windows(4).any(|w| w == SELECTOR_APPROVE) {
            *self.allowance.lock().unwrap() = crate::approval::max_uint256();
        }
        let hash = TxHash(keccak256(&raw));
        self.sent.lock().unwrap().push(raw);
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, LedgerError> {
        if !*self.mine_receipts.lock().unwrap() {
            return Ok(None);
        }
        Ok(Some(Receipt {
            status: *self.receipt_status.lock().unwrap(),
            block_number: 34_567_890,
            transaction_hash: *hash,
        }))
    }
}
