use super::WalletConnection;
use crate::address::address_from_key;
use crate::error::{Error, Result};
use crate::method::{manual_connection_method, ConnectionMethod};
use crate::session::fill_secure;
use crate::signature::{personal_sign_digest, WalletSignature};
use async_trait::async_trait;
use k256::ecdsa::SigningKey;
use std::sync::atomic::{AtomicBool, Ordering};
use zeroize::Zeroize;

/// In-process secp256k1 key that behaves like a wallet: it signs the
/// personal-sign digest and answers with `0x` hex and a 27/28 recovery byte.
pub struct LocalWalletConnection {
    key: SigningKey,
    address: String,
    connected: AtomicBool,
}

impl LocalWalletConnection {
    pub fn new(key: SigningKey) -> Self {
        let address = address_from_key(key.verifying_key());
        Self { key, address, connected: AtomicBool::new(false) }
    }

    /// Fresh key from the OS random source.
    pub fn random() -> Result<Self> {
        let mut secret = [0u8; 32];
        loop {
            fill_secure(&mut secret)?;
            if let Ok(key) = SigningKey::from_slice(&secret) {
                secret.zeroize();
                return Ok(Self::new(key));
            }
        }
    }

    pub fn from_hex(secret: &str) -> Result<Self> {
        let mut bytes = hex::decode(secret.trim_start_matches("0x"))
            .map_err(|e| Error::Encoding(format!("secret hex: {e}")))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| Error::Encoding(format!("secret key: {e}")));
        bytes.zeroize();
        Ok(Self::new(key?))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    /// What an external wallet would return for personal-sign of `message`.
    pub fn personal_sign_hex(&self, message: &str) -> Result<String> {
        let digest = personal_sign_digest(message.as_bytes());
        let (sig, recid) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| Error::Wallet(e.to_string()))?;
        let mut raw = sig.to_bytes().to_vec();
        raw.push(27 + recid.to_byte());
        Ok(format!("0x{}", hex::encode(raw)))
    }
}

#[async_trait]
impl WalletConnection for LocalWalletConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn wallet_address(&self) -> Option<String> {
        self.is_connected().then(|| self.address.clone())
    }

    fn preferred_connection_method(&self) -> Result<ConnectionMethod> {
        manual_connection_method(&format!("local:{}", self.address))
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::Release);
        tracing::debug!(address = %self.address, "local wallet connected");
        Ok(())
    }

    async fn sign(&self, message: &[u8]) -> Result<WalletSignature> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let text = std::str::from_utf8(message).map_err(|_| Error::InvalidMessage)?;
        WalletSignature::from_wallet_hex(&self.personal_sign_hex(text)?)
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    const SECRET: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn address_is_checksummed() {
        let wallet = LocalWalletConnection::from_hex(SECRET).unwrap();
        assert_eq!(wallet.address(), "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23");
    }

    #[tokio::test]
    async fn normalized_recovery_matches_key() {
        let wallet = LocalWalletConnection::from_hex(SECRET).unwrap();
        wallet.connect().await.unwrap();
        let sig = wallet.sign(b"XMTP : Create Identity").await.unwrap();
        assert!(sig.recovery() <= 1);

        // 27/28 wallets: parity normalization yields the true recovery id
        let digest = personal_sign_digest(b"XMTP : Create Identity");
        let recovered = VerifyingKey::recover_from_prehash(
            &digest,
            &Signature::from_slice(sig.compact()).unwrap(),
            RecoveryId::from_byte(sig.recovery()).unwrap(),
        )
        .unwrap();
        assert_eq!(&recovered, wallet.signing_key().verifying_key());
    }

    #[tokio::test]
    async fn requires_connect_and_text() {
        let wallet = LocalWalletConnection::random().unwrap();
        assert_eq!(wallet.sign(b"hi").await, Err(Error::NotConnected));
        wallet.connect().await.unwrap();
        assert_eq!(wallet.sign(&[0xff, 0xfe]).await, Err(Error::InvalidMessage));
        wallet.disconnect().await;
        assert!(wallet.wallet_address().is_none());
    }
}
