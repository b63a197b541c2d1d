//! ABI call codec: function signatures, selectors, and the head/tail
//! encoding of call arguments and return data.
//!
//! The library speaks to exactly five contract functions (`balanceOf`,
//! `allowance`, `approve`, `getAmountsOut`, `swapExactTokensForTokens`),
//! so the codec covers the value types those need rather than the full
//! ABI grammar.

use num_bigint::BigUint;
use tiny_keccak::{Hasher, Keccak};

use crate::error::CodecError;
use crate::token::Address;

/// Parsed function signature.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<ParamType>,
    pub canonical: String,
    pub selector: [u8; 4],
}

/// ABI parameter types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Address,
    Uint(usize),
    Int(usize),
    Bool,
    Bytes,
    FixedBytes(usize),
    String,
    Array(Box<ParamType>),
}

impl ParamType {
    /// Whether this type is dynamically-sized in ABI encoding.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, ParamType::Bytes | ParamType::String | ParamType::Array(_))
    }
}

/// A decoded or to-be-encoded ABI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint(BigUint),
    Bool(bool),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
}

impl AbiValue {
    /// The contained uint, if this value is one.
    pub fn as_uint(&self) -> Option<&BigUint> {
        match self {
            AbiValue::Uint(n) => Some(n),
            _ => None,
        }
    }
}

/// Parse a signature string like `"getAmountsOut(uint256,address[])"`.
pub fn parse_signature(sig: &str) -> Result<FunctionSignature, CodecError> {
    let sig = sig.trim();
    let open = sig
        .find('(')
        .ok_or_else(|| CodecError::InvalidSignature(format!("missing '(' in: {sig}")))?;

    if !sig.ends_with(')') {
        return Err(CodecError::InvalidSignature(format!("missing ')' in: {sig}")));
    }

    let name = sig[..open].to_string();
    if name.is_empty() {
        return Err(CodecError::InvalidSignature("empty function name".to_string()));
    }

    let params_str = &sig[open + 1..sig.len() - 1];
    let params = if params_str.is_empty() {
        vec![]
    } else {
        params_str
            .split(',')
            .map(|p| parse_param_type(p.trim()))
            .collect::<Result<Vec<_>, _>>()?
    };

    let canonical = format!(
        "{}({})",
        name,
        params.iter().map(canonical_param).collect::<Vec<_>>().join(",")
    );
    let selector = selector_from_signature(&canonical);

    Ok(FunctionSignature {
        name,
        params,
        canonical,
        selector,
    })
}

/// Parse a single param type string.
pub fn parse_param_type(s: &str) -> Result<ParamType, CodecError> {
    let s = s.trim();

    if let Some(inner_str) = s.strip_suffix("[]") {
        let inner = parse_param_type(inner_str)?;
        return Ok(ParamType::Array(Box::new(inner)));
    }
    if s.rfind('[').is_some() {
        // Fixed-size arrays and tuples never appear in the router/ERC-20
        // surface this library drives.
        return Err(CodecError::UnsupportedType(s.to_string()));
    }

    match s {
        "address" => Ok(ParamType::Address),
        "bool" => Ok(ParamType::Bool),
        "string" => Ok(ParamType::String),
        "bytes" => Ok(ParamType::Bytes),
        _ if s.starts_with("uint") => {
            let bits = if s == "uint" {
                256
            } else {
                s[4..]
                    .parse::<usize>()
                    .map_err(|_| CodecError::InvalidSignature(format!("invalid uint width: {s}")))?
            };
            if bits == 0 || bits > 256 || bits % 8 != 0 {
                return Err(CodecError::InvalidSignature(format!("invalid uint width: {s}")));
            }
            Ok(ParamType::Uint(bits))
        }
        _ if s.starts_with("int") => {
            let bits = if s == "int" {
                256
            } else {
                s[3..]
                    .parse::<usize>()
                    .map_err(|_| CodecError::InvalidSignature(format!("invalid int width: {s}")))?
            };
            if bits == 0 || bits > 256 || bits % 8 != 0 {
                return Err(CodecError::InvalidSignature(format!("invalid int width: {s}")));
            }
            Ok(ParamType::Int(bits))
        }
        _ if s.starts_with("bytes") => {
            let size: usize = s[5..]
                .parse()
                .map_err(|_| CodecError::InvalidSignature(format!("invalid bytes width: {s}")))?;
            if size == 0 || size > 32 {
                return Err(CodecError::InvalidSignature(format!("invalid bytes width: {s}")));
            }
            Ok(ParamType::FixedBytes(size))
        }
        _ => Err(CodecError::UnsupportedType(s.to_string())),
    }
}

fn canonical_param(p: &ParamType) -> String {
    match p {
        ParamType::Address => "address".to_string(),
        ParamType::Uint(bits) => format!("uint{bits}"),
        ParamType::Int(bits) => format!("int{bits}"),
        ParamType::Bool => "bool".to_string(),
        ParamType::Bytes => "bytes".to_string(),
        ParamType::FixedBytes(size) => format!("bytes{size}"),
        ParamType::String => "string".to_string(),
        ParamType::Array(inner) => format!("{}[]", canonical_param(inner)),
    }
}

/// Compute the 4-byte selector from a canonical function signature.
pub fn selector_from_signature(canonical: &str) -> [u8; 4] {
    let mut hasher = Keccak::v256();
    hasher.update(canonical.as_bytes());
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encode a call: selector followed by ABI-encoded arguments.
pub fn encode_call(sig: &FunctionSignature, args: &[AbiValue]) -> Result<Vec<u8>, CodecError> {
    let mut out = sig.selector.to_vec();
    out.extend_from_slice(&encode_arguments(&sig.params, args)?);
    Ok(out)
}

/// Standard head/tail argument encoding. Static values occupy one word
/// in the head; dynamic values put an offset in the head and their
/// payload in the tail.
pub fn encode_arguments(params: &[ParamType], args: &[AbiValue]) -> Result<Vec<u8>, CodecError> {
    if params.len() != args.len() {
        return Err(CodecError::ArityMismatch {
            expected: params.len(),
            actual: args.len(),
        });
    }

    let head_len = params.len() * 32;
    let mut head: Vec<u8> = Vec::with_capacity(head_len);
    let mut tail: Vec<u8> = Vec::new();

    for (index, (param, arg)) in params.iter().zip(args).enumerate() {
        if param.is_dynamic() {
            let offset = head_len + tail.len();
            head.extend_from_slice(&uint_word(&BigUint::from(offset)));
            tail.extend_from_slice(&encode_dynamic(param, arg, index)?);
        } else {
            head.extend_from_slice(&encode_static(param, arg, index)?);
        }
    }

    head.extend_from_slice(&tail);
    Ok(head)
}

fn encode_static(param: &ParamType, arg: &AbiValue, index: usize) -> Result<[u8; 32], CodecError> {
    match (param, arg) {
        (ParamType::Address, AbiValue::Address(addr)) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(addr.as_bytes());
            Ok(word)
        }
        (ParamType::Uint(bits), AbiValue::Uint(n)) => {
            if n.bits() as usize > *bits {
                return Err(CodecError::ArgumentMismatch {
                    index,
                    expected: format!("uint{bits}"),
                });
            }
            Ok(uint_word(n))
        }
        (ParamType::Bool, AbiValue::Bool(b)) => {
            let mut word = [0u8; 32];
            word[31] = *b as u8;
            Ok(word)
        }
        (ParamType::FixedBytes(size), AbiValue::Bytes(b)) if b.len() == *size => {
            let mut word = [0u8; 32];
            word[..b.len()].copy_from_slice(b);
            Ok(word)
        }
        _ => Err(CodecError::ArgumentMismatch {
            index,
            expected: canonical_param(param),
        }),
    }
}

fn encode_dynamic(param: &ParamType, arg: &AbiValue, index: usize) -> Result<Vec<u8>, CodecError> {
    match (param, arg) {
        (ParamType::Bytes, AbiValue::Bytes(b)) => Ok(encode_byte_payload(b)),
        (ParamType::String, AbiValue::String(s)) => Ok(encode_byte_payload(s.as_bytes())),
        (ParamType::Array(inner), AbiValue::Array(items)) => {
            if inner.is_dynamic() {
                return Err(CodecError::UnsupportedType(format!(
                    "{}[]",
                    canonical_param(inner)
                )));
            }
            let mut out = uint_word(&BigUint::from(items.len())).to_vec();
            for item in items {
                out.extend_from_slice(&encode_static(inner, item, index)?);
            }
            Ok(out)
        }
        _ => Err(CodecError::ArgumentMismatch {
            index,
            expected: canonical_param(param),
        }),
    }
}

fn encode_byte_payload(bytes: &[u8]) -> Vec<u8> {
    let mut out = uint_word(&BigUint::from(bytes.len())).to_vec();
    out.extend_from_slice(bytes);
    let rem = bytes.len() % 32;
    if rem != 0 {
        out.extend(std::iter::repeat_n(0u8, 32 - rem));
    }
    out
}

fn uint_word(n: &BigUint) -> [u8; 32] {
    let bytes = n.to_bytes_be();
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    word
}

/// Decode ABI-encoded return data against the expected output types.
pub fn decode_returns(params: &[ParamType], data: &[u8]) -> Result<Vec<AbiValue>, CodecError> {
    let mut values = Vec::with_capacity(params.len());
    let mut offset = 0;
    for param in params {
        values.push(decode_value(param, data, offset)?);
        offset += 32;
    }
    Ok(values)
}

fn decode_value(param: &ParamType, data: &[u8], head_offset: usize) -> Result<AbiValue, CodecError> {
    if param.is_dynamic() {
        let offset = read_offset(data, head_offset)?;
        decode_value_at(param, data, offset)
    } else {
        decode_value_at(param, data, head_offset)
    }
}

fn decode_value_at(param: &ParamType, data: &[u8], offset: usize) -> Result<AbiValue, CodecError> {
    ensure_bytes(data, offset, 32)?;
    let word = &data[offset..offset + 32];

    match param {
        ParamType::Address => {
            let mut addr = [0u8; 20];
            addr.copy_from_slice(&word[12..32]);
            Ok(AbiValue::Address(Address(addr)))
        }
        ParamType::Uint(_) | ParamType::Int(_) => {
            Ok(AbiValue::Uint(BigUint::from_bytes_be(word)))
        }
        ParamType::Bool => Ok(AbiValue::Bool(word[31] != 0)),
        ParamType::FixedBytes(size) => Ok(AbiValue::Bytes(word[..*size].to_vec())),
        ParamType::Bytes => {
            let len = read_offset(data, offset)?;
            let start = offset + 32;
            ensure_bytes(data, start, len)?;
            Ok(AbiValue::Bytes(data[start..start + len].to_vec()))
        }
        ParamType::String => {
            let len = read_offset(data, offset)?;
            let start = offset + 32;
            ensure_bytes(data, start, len)?;
            let s = std::str::from_utf8(&data[start..start + len])
                .map_err(|e| CodecError::InvalidEncoding(format!("invalid UTF-8: {e}")))?;
            Ok(AbiValue::String(s.to_string()))
        }
        ParamType::Array(inner) => {
            let len = read_offset(data, offset)?;
            let mut values = Vec::with_capacity(len);
            let mut elem_offset = offset + 32;
            for _ in 0..len {
                values.push(decode_value(inner, data, elem_offset)?);
                elem_offset += 32;
            }
            Ok(AbiValue::Array(values))
        }
    }
}

fn read_offset(data: &[u8], offset: usize) -> Result<usize, CodecError> {
    ensure_bytes(data, offset, 32)?;
    let word = &data[offset..offset + 32];
    for &b in &word[..24] {
        if b != 0 {
            return Err(CodecError::InvalidEncoding(
                "offset too large for usize".to_string(),
            ));
        }
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..32]);
    Ok(u64::from_be_bytes(bytes) as usize)
}

fn ensure_bytes(data: &[u8], offset: usize, len: usize) -> Result<(), CodecError> {
    if offset + len > data.len() {
        Err(CodecError::DataTooShort {
            expected: offset + len,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}
