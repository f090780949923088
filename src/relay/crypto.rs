//! Relay payload encryption.
//!
//! AES-256-CBC with PKCS#7 padding and a random 16-byte IV. The MAC is
//! HMAC-SHA256 over `ciphertext ‖ iv` under the same session key, and is
//! checked before anything is decrypted.

use crate::error::{Error, Result};
use crate::session::{fill_secure, SessionKey};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded ciphertext as carried in a socket message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub data: String,
    pub hmac: String,
    pub iv: String,
}

fn mac(key: &SessionKey, data: &[u8], iv: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Encoding(format!("hmac key: {e}")))?;
    mac.update(data);
    mac.update(iv);
    Ok(mac)
}

pub fn encrypt_payload(key: &SessionKey, plaintext: &[u8]) -> Result<EncryptedPayload> {
    let mut iv = [0u8; 16];
    fill_secure(&mut iv)?;
    let data = Aes256CbcEnc::new(key.as_bytes().into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    let tag = mac(key, &data, &iv)?.finalize().into_bytes();
    Ok(EncryptedPayload { data: hex::encode(&data), hmac: hex::encode(tag), iv: hex::encode(iv) })
}

pub fn decrypt_payload(key: &SessionKey, payload: &EncryptedPayload) -> Result<Vec<u8>> {
    let data =
        hex::decode(&payload.data).map_err(|e| Error::Encoding(format!("payload data: {e}")))?;
    let iv = hex::decode(&payload.iv).map_err(|e| Error::Encoding(format!("payload iv: {e}")))?;
    let tag =
        hex::decode(&payload.hmac).map_err(|e| Error::Encoding(format!("payload hmac: {e}")))?;

    mac(key, &data, &iv)?
        .verify_slice(&tag)
        .map_err(|_| Error::Encoding("payload hmac mismatch".into()))?;

    let iv: [u8; 16] = iv
        .try_into()
        .map_err(|_| Error::Encoding("payload iv must be 16 bytes".into()))?;
    Aes256CbcDec::new(key.as_bytes().into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&data)
        .map_err(|_| Error::Encoding("payload padding invalid".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypts_what_it_encrypts() {
        let key = SessionKey::from_bytes([0x42; 32]);
        let body = br#"{"id":1,"jsonrpc":"2.0"}"#;
        let payload = encrypt_payload(&key, body).unwrap();
        assert_eq!(payload.iv.len(), 32);
        assert_eq!(decrypt_payload(&key, &payload).unwrap(), body.to_vec());
    }

    #[test]
    fn tampered_payload_rejected() {
        let key = SessionKey::from_bytes([0x42; 32]);
        let mut payload = encrypt_payload(&key, b"hello").unwrap();
        let mut data = hex::decode(&payload.data).unwrap();
        data[0] ^= 0x01;
        payload.data = hex::encode(data);
        assert!(matches!(decrypt_payload(&key, &payload), Err(Error::Encoding(_))));
    }

    #[test]
    fn wrong_key_rejected() {
        let payload = encrypt_payload(&SessionKey::from_bytes([1; 32]), b"hello").unwrap();
        assert!(decrypt_payload(&SessionKey::from_bytes([2; 32]), &payload).is_err());
    }
}
