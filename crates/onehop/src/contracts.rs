//! Typed views over the two contracts the pipeline touches: the ERC-20
//! token being spent and the v2-style router. Each operation is looked
//! up in the contract's resolved ABI and encoded through the codec, so
//! encode/decode happens once, here, at the ledger boundary.

use std::sync::Arc;

use num_bigint::BigUint;

use crate::abi::{AbiDocument, AbiResolver};
use crate::codec::{self, AbiValue};
use crate::error::{AbiError, CodecError, Error};
use crate::ledger::LedgerClient;
use crate::token::Address;

/// ERC-20 operations: `balanceOf`, `allowance`, `approve`.
pub struct Erc20 {
    pub address: Address,
    abi: Arc<AbiDocument>,
}

impl Erc20 {
    /// Resolve the token's ABI and bind the typed surface to it.
    pub async fn bind(address: &Address, resolver: &AbiResolver) -> Result<Self, AbiError> {
        Ok(Self {
            address: *address,
            abi: resolver.resolve(address).await?,
        })
    }

    pub async fn balance_of<L: LedgerClient + ?Sized>(
        &self,
        ledger: &L,
        owner: &Address,
    ) -> Result<BigUint, Error> {
        let values = view_call(
            ledger,
            &self.abi,
            "balanceOf",
            &[AbiValue::Address(*owner)],
        )
        .await?;
        single_uint(values)
    }

    pub async fn allowance<L: LedgerClient + ?Sized>(
        &self,
        ledger: &L,
        owner: &Address,
        spender: &Address,
    ) -> Result<BigUint, Error> {
        let values = view_call(
            ledger,
            &self.abi,
            "allowance",
            &[AbiValue::Address(*owner), AbiValue::Address(*spender)],
        )
        .await?;
        single_uint(values)
    }

    /// Calldata for `approve(spender, amount)`.
    pub fn approve_calldata(&self, spender: &Address, amount: &BigUint) -> Result<Vec<u8>, Error> {
        let function = self.abi.function("approve")?;
        let calldata = codec::encode_call(
            &function.signature,
            &[AbiValue::Address(*spender), AbiValue::Uint(amount.clone())],
        )?;
        Ok(calldata)
    }
}

/// Router operations: `getAmountsOut`, `swapExactTokensForTokens`.
pub struct Router {
    pub address: Address,
    abi: Arc<AbiDocument>,
}

impl Router {
    pub async fn bind(address: &Address, resolver: &AbiResolver) -> Result<Self, AbiError> {
        Ok(Self {
            address: *address,
            abi: resolver.resolve(address).await?,
        })
    }

    /// Quote the output amounts along `path` for a given input amount.
    pub async fn get_amounts_out<L: LedgerClient + ?Sized>(
        &self,
        ledger: &L,
        amount_in: &BigUint,
        path: &[Address],
    ) -> Result<Vec<BigUint>, Error> {
        let values = view_call(
            ledger,
            &self.abi,
            "getAmountsOut",
            &[AbiValue::Uint(amount_in.clone()), address_array(path)],
        )
        .await?;

        let Some(AbiValue::Array(amounts)) = values.into_iter().next() else {
            return Err(CodecError::InvalidEncoding(
                "getAmountsOut did not return an array".to_string(),
            )
            .into());
        };
        amounts
            .into_iter()
            .map(|v| match v {
                AbiValue::Uint(n) => Ok(n),
                other => Err(CodecError::InvalidEncoding(format!(
                    "non-uint amount in getAmountsOut reply: {other:?}"
                ))
                .into()),
            })
            .collect()
    }

    /// Calldata for `swapExactTokensForTokens`.
    pub fn swap_calldata(
        &self,
        amount_in: &BigUint,
        minimum_out: &BigUint,
        path: &[Address],
        recipient: &Address,
        deadline: u64,
    ) -> Result<Vec<u8>, Error> {
        let function = self.abi.function("swapExactTokensForTokens")?;
        let calldata = codec::encode_call(
            &function.signature,
            &[
                AbiValue::Uint(amount_in.clone()),
                AbiValue::Uint(minimum_out.clone()),
                address_array(path),
                AbiValue::Address(*recipient),
                AbiValue::Uint(BigUint::from(deadline)),
            ],
        )?;
        Ok(calldata)
    }
}

async fn view_call<L: LedgerClient + ?Sized>(
    ledger: &L,
    abi: &AbiDocument,
    name: &str,
    args: &[AbiValue],
) -> Result<Vec<AbiValue>, Error> {
    let function = abi.function(name)?;
    let calldata = codec::encode_call(&function.signature, args)?;
    let returned = ledger.call(&abi.address, calldata).await?;
    Ok(codec::decode_returns(&function.outputs, &returned)?)
}

fn address_array(path: &[Address]) -> AbiValue {
    AbiValue::Array(path.iter().map(|a| AbiValue::Address(*a)).collect())
}

fn single_uint(values: Vec<AbiValue>) -> Result<BigUint, Error> {
    match values.into_iter().next() {
        Some(AbiValue::Uint(n)) => Ok(n),
        other => Err(CodecError::InvalidEncoding(format!(
            "expected a single uint return, got {other:?}"
        ))
        .into()),
    }
}
