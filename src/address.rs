//! EIP-55 checksummed Ethereum addresses.

use crate::error::{Error, Result};
use k256::ecdsa::VerifyingKey;
use sha3::{Digest, Keccak256};

/// Checksum a 20-byte hex address (with or without `0x`, any case).
pub fn checksum_address(address: &str) -> Result<String> {
    let digits = address.trim().trim_start_matches("0x").trim_start_matches("0X");
    if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::Encoding(format!("invalid address: {address}")));
    }
    let lower = digits.to_ascii_lowercase();
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> if i % 2 == 0 { 4 } else { 0 }) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Address of a secp256k1 public key: last 20 bytes of keccak256(x‖y).
pub fn address_from_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    let lower = hex::encode(&hash[12..]);
    // 40 lowercase hex digits always checksum
    checksum_address(&lower).unwrap_or_else(|_| format!("0x{lower}"))
}
