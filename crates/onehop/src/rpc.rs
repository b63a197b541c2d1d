//! JSON-RPC 2.0 implementation of [`LedgerClient`] over HTTP.

use async_trait::async_trait;
use num_bigint::BigUint;
use serde_json::{json, Value};
use tracing::debug;

use crate::codec::{self, AbiValue, ParamType};
use crate::error::LedgerError;
use crate::ledger::{LedgerClient, Receipt, TxHash};
use crate::token::Address;

/// Selector of the standard `Error(string)` revert payload.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// HTTP JSON-RPC ledger client.
pub struct HttpLedger {
    http: reqwest::Client,
    url: String,
}

impl HttpLedger {
    pub fn new(url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.to_string(),
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        debug!(method, "rpc request");
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        let reply: Value = response
            .json()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        if let Some(error) = reply.get("error") {
            return Err(rpc_error(method, error));
        }

        reply
            .get("result")
            .cloned()
            .ok_or_else(|| LedgerError::InvalidResponse(format!("{method}: no result field")))
    }

    async fn quantity_u64(&self, method: &str, params: Value) -> Result<u64, LedgerError> {
        let result = self.request(method, params).await?;
        parse_quantity_u64(&result)
    }
}

/// Map a JSON-RPC error object to the ledger taxonomy. Reverted calls
/// carry their reason when the node returns `Error(string)` data.
fn rpc_error(method: &str, error: &Value) -> LedgerError {
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown rpc error")
        .to_string();

    if let Some(data) = error.get("data").and_then(Value::as_str) {
        if let Ok(bytes) = decode_hex_payload(data) {
            if let Some(reason) = decode_revert_reason(&bytes) {
                return LedgerError::Reverted { reason: Some(reason) };
            }
        }
    }
    if message.to_lowercase().contains("revert") {
        return LedgerError::Reverted { reason: Some(message) };
    }

    LedgerError::Unavailable(format!("{method}: {message}"))
}

/// Extract the reason string from `Error(string)` revert data.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING_SELECTOR {
        return None;
    }
    let values = codec::decode_returns(&[ParamType::String], &data[4..]).ok()?;
    match values.into_iter().next() {
        Some(AbiValue::String(reason)) => Some(reason),
        _ => None,
    }
}

#[async_trait]
impl LedgerClient for HttpLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.quantity_u64("eth_chainId", json!([])).await
    }

    async fn gas_price(&self) -> Result<BigUint, LedgerError> {
        let result = self.request("eth_gasPrice", json!([])).await?;
        parse_quantity(&result)
    }

    async fn transaction_count(&self, address: &Address) -> Result<u64, LedgerError> {
        self.quantity_u64(
            "eth_getTransactionCount",
            json!([address.to_string(), "latest"]),
        )
        .await
    }

    async fn call(&self, to: &Address, data: Vec<u8>) -> Result<Vec<u8>, LedgerError> {
        let result = self
            .request(
                "eth_call",
                json!([
                    { "to": to.to_string(), "data": hex_payload(&data) },
                    "latest",
                ]),
            )
            .await?;

        let text = result
            .as_str()
            .ok_or_else(|| LedgerError::InvalidResponse("eth_call: non-string result".to_string()))?;
        decode_hex_payload(text)
    }

    async fn estimate_gas(
        &self,
        from: &Address,
        to: &Address,
        data: Vec<u8>,
    ) -> Result<u64, LedgerError> {
        self.quantity_u64(
            "eth_estimateGas",
            json!([{
                "from": from.to_string(),
                "to": to.to_string(),
                "data": hex_payload(&data),
            }]),
        )
        .await
    }

    async fn send_raw_transaction(&self, raw: Vec<u8>) -> Result<TxHash, LedgerError> {
        let result = self
            .request("eth_sendRawTransaction", json!([hex_payload(&raw)]))
            .await?;
        result
            .as_str()
            .ok_or_else(|| {
                LedgerError::InvalidResponse("eth_sendRawTransaction: non-string result".to_string())
            })?
            .parse()
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, LedgerError> {
        let result = self
            .request("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;

        if result.is_null() {
            return Ok(None);
        }

        let status = result
            .get("status")
            .map(parse_quantity_u64)
            .transpose()?
            .unwrap_or(0);
        let block_number = result
            .get("blockNumber")
            .map(parse_quantity_u64)
            .transpose()?
            .ok_or_else(|| {
                LedgerError::InvalidResponse("receipt missing blockNumber".to_string())
            })?;
        let transaction_hash = result
            .get("transactionHash")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                LedgerError::InvalidResponse("receipt missing transactionHash".to_string())
            })?
            .parse()?;

        Ok(Some(Receipt {
            status: status == 1,
            block_number,
            transaction_hash,
        }))
    }
}

/// Render bytes as a `0x`-prefixed hex payload.
fn hex_payload(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Decode a `0x`-prefixed hex payload.
fn decode_hex_payload(text: &str) -> Result<Vec<u8>, LedgerError> {
    let stripped = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(stripped).map_err(|e| LedgerError::InvalidResponse(format!("bad hex: {e}")))
}

/// Parse a JSON-RPC quantity (`"0x5208"`) into a `BigUint`.
fn parse_quantity(value: &Value) -> Result<BigUint, LedgerError> {
    let text = value
        .as_str()
        .ok_or_else(|| LedgerError::InvalidResponse(format!("non-string quantity: {value}")))?;
    let stripped = text
        .strip_prefix("0x")
        .ok_or_else(|| LedgerError::InvalidResponse(format!("quantity missing 0x: {text}")))?;
    BigUint::parse_bytes(stripped.as_bytes(), 16)
        .ok_or_else(|| LedgerError::InvalidResponse(format!("bad quantity: {text}")))
}

fn parse_quantity_u64(value: &Value) -> Result<u64, LedgerError> {
    let n = parse_quantity(value)?;
    u64::try_from(&n)
        .map_err(|_| LedgerError::InvalidResponse(format!("quantity exceeds u64: {n}")))
}
