//! Wallet signatures: hex parsing and recovery-byte normalization.
//!
//! Wallets disagree on the recovery byte. Some return 0/1, most return 27/28,
//! a few add chain-specific offsets. [`normalize`] collapses all of them onto a
//! fixed parity:
//!
//! ```text
//! out[0..64] = sig[0..64]
//! out[64]    = 1 - (sig[64] % 2)
//! ```
//!
//! This is a parity rule, not a recovery id derived by recovering the public
//! key. Even recovery bytes (0, 28) map to 1 and odd ones (1, 27) map to 0.

use crate::error::{Error, Result};
use sha3::{Digest, Keccak256};

/// Compact signature (r‖s) plus recovery byte.
pub const SIGNATURE_LEN: usize = 65;

const PERSONAL_SIGN_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// A normalized 65-byte compact-recoverable ECDSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletSignature {
    compact: [u8; 64],
    recovery: u8,
}

impl WalletSignature {
    /// Normalize raw wallet bytes into a signature.
    pub fn from_wallet_bytes(raw: &[u8; SIGNATURE_LEN]) -> Self {
        let normalized = normalize(raw);
        let mut compact = [0u8; 64];
        compact.copy_from_slice(&normalized[..64]);
        Self { compact, recovery: normalized[64] }
    }

    /// Parse a wallet hex response (optionally `0x`-prefixed) and normalize it.
    pub fn from_wallet_hex(hex_sig: &str) -> Result<Self> {
        Ok(Self::from_wallet_bytes(&parse_signature_hex(hex_sig)?))
    }

    /// r‖s
    pub fn compact(&self) -> &[u8; 64] {
        &self.compact
    }

    /// Always 0 or 1.
    pub fn recovery(&self) -> u8 {
        self.recovery
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(&self.compact);
        out[64] = self.recovery;
        out
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

/// Replace the recovery byte with `1 - (b % 2)`, leaving r‖s untouched.
pub fn normalize(sig: &[u8; SIGNATURE_LEN]) -> [u8; SIGNATURE_LEN] {
    let mut out = *sig;
    out[64] = 1 - (sig[64] % 2);
    out
}

/// Decode a wallet's hex signature into exactly 65 bytes.
pub fn parse_signature_hex(hex_sig: &str) -> Result<[u8; SIGNATURE_LEN]> {
    let trimmed = hex_sig.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return Err(Error::NoSignature);
    }
    let bytes = hex::decode(digits).map_err(|_| Error::InvalidSignatureLength {
        expected: SIGNATURE_LEN,
        got: digits.len() / 2,
    })?;
    let got = bytes.len();
    bytes
        .try_into()
        .map_err(|_| Error::InvalidSignatureLength { expected: SIGNATURE_LEN, got })
}

/// The byte string a wallet signs for personal-sign.
pub fn personal_sign_payload(message: &[u8]) -> Vec<u8> {
    let mut payload = format!("{}{}", PERSONAL_SIGN_PREFIX, message.len()).into_bytes();
    payload.extend_from_slice(message);
    payload
}

/// keccak256 of [`personal_sign_payload`].
pub fn personal_sign_digest(message: &[u8]) -> [u8; 32] {
    Keccak256::digest(personal_sign_payload(message)).into()
}
