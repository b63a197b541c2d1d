use std::fmt;
use std::str::FromStr;

use tiny_keccak::{Hasher, Keccak};

use crate::error::Error;

/// A 20-byte EVM account or contract address.
///
/// Displays in EIP-55 mixed-case checksummed form. Parsing accepts any
/// casing of a syntactically valid `0x`-prefixed 40-hex-digit string and
/// re-checksums it, so normalization is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The EIP-55 mixed-case checksum encoding.
    pub fn checksummed(&self) -> String {
        let hex_addr = hex::encode(self.0);
        let mut hasher = Keccak::v256();
        hasher.update(hex_addr.as_bytes());
        let mut hash = [0u8; 32];
        hasher.finalize(&mut hash);

        let mut result = String::with_capacity(42);
        result.push_str("0x");
        for (i, c) in hex_addr.chars().enumerate() {
            let hash_nibble = if i % 2 == 0 {
                (hash[i / 2] >> 4) & 0x0f
            } else {
                hash[i / 2] & 0x0f
            };
            if hash_nibble >= 8 {
                result.push(c.to_ascii_uppercase());
            } else {
                result.push(c);
            }
        }
        result
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| Error::InvalidAddress(format!("missing 0x prefix: {s}")))?;

        if stripped.len() != 40 {
            return Err(Error::InvalidAddress(format!(
                "expected 40 hex digits, got {}: {s}",
                stripped.len()
            )));
        }

        let bytes = hex::decode(stripped)
            .map_err(|_| Error::InvalidAddress(format!("not valid hex: {s}")))?;

        let mut addr = [0u8; 20];
        addr.copy_from_slice(&bytes);
        Ok(Address(addr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.checksummed())
    }
}

/// An ERC-20 token descriptor. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
}

impl Token {
    /// Build a descriptor, normalizing the raw address to checksummed form.
    pub fn new(symbol: &str, address: &str, decimals: u8) -> Result<Self, Error> {
        Ok(Self {
            symbol: symbol.to_string(),
            address: address.parse()?,
            decimals,
        })
    }
}
