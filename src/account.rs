//! Account - the surface identity and message-authentication flows consume.

use crate::connection::WalletConnection;
use crate::error::Result;
use crate::method::ConnectionMethod;
use crate::signature::WalletSignature;
use async_trait::async_trait;
use std::sync::Arc;

/// Anything that can prove control of an address by signing text.
#[async_trait]
pub trait SigningKey: Send + Sync {
    fn address(&self) -> String;
    async fn sign(&self, message: &[u8]) -> Result<WalletSignature>;
}

/// Wallet-backed account.
#[derive(Clone)]
pub struct Account {
    connection: Arc<dyn WalletConnection>,
}

impl Account {
    pub fn new(connection: Arc<dyn WalletConnection>) -> Self {
        Self { connection }
    }

    /// Checksummed wallet address, or an empty string before connecting.
    pub fn address(&self) -> String {
        self.connection.wallet_address().unwrap_or_default()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn preferred_connection_method(&self) -> Result<ConnectionMethod> {
        self.connection.preferred_connection_method()
    }

    pub async fn connect(&self) -> Result<()> {
        self.connection.connect().await
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await
    }

    pub async fn sign(&self, message: &[u8]) -> Result<WalletSignature> {
        self.connection.sign(message).await
    }

    pub async fn sign_text(&self, message: &str) -> Result<WalletSignature> {
        self.sign(message.as_bytes()).await
    }

    pub fn connection(&self) -> &Arc<dyn WalletConnection> {
        &self.connection
    }
}

#[async_trait]
impl SigningKey for Account {
    fn address(&self) -> String {
        Account::address(self)
    }

    async fn sign(&self, message: &[u8]) -> Result<WalletSignature> {
        Account::sign(self, message).await
    }
}
