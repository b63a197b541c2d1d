//! Signing credential boundary. Key management lives outside the
//! library; the swap pipeline consumes anything that can produce a
//! recoverable secp256k1 signature over a 32-byte digest.

use thiserror::Error;

use crate::token::Address;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct SigningError(pub String);

/// A recoverable ECDSA signature. `recovery_id` is the raw parity bit
/// (0 or 1); EIP-155 `v` derivation happens in the transaction builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub recovery_id: u8,
}

/// A ready-to-use signing credential.
pub trait Signer: Send + Sync {
    /// The account address this credential controls.
    fn address(&self) -> Address;

    /// Sign a 32-byte transaction digest.
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature, SigningError>;
}

/// Deterministic fake credential for tests: echoes the digest into `r`
/// and a fixed pattern into `s`. Never use outside tests.
pub struct StaticSigner {
    address: Address,
    refuse: bool,
}

impl StaticSigner {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            refuse: false,
        }
    }

    /// A credential that fails every signing request.
    pub fn refusing(address: Address) -> Self {
        Self {
            address,
            refuse: true,
        }
    }
}

impl Signer for StaticSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature, SigningError> {
        if self.refuse {
            return Err(SigningError("credential refused to sign".to_string()));
        }
        Ok(Signature {
            r: *digest,
            s: [0x11; 32],
            recovery_id: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_signer_deterministic() {
        let address: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        let signer = StaticSigner::new(address);
        let digest = [0xabu8; 32];
        let one = signer.sign_digest(&digest).unwrap();
        let two = signer.sign_digest(&digest).unwrap();
        assert_eq!(one, two);
        assert_eq!(one.r, digest);
        assert_eq!(signer.address(), address);
    }

    #[test]
    fn test_refusing_signer() {
        let address: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        assert!(StaticSigner::refusing(address).sign_digest(&[0u8; 32]).is_err());
    }
}
