//! Wallet connection backends.
//!
//! Each backend implements [`WalletConnection`] on its own:
//! - [`RelayWalletConnection`]: external wallet reached through a relay
//! - [`LocalWalletConnection`]: in-process key, for tests and development

mod local;
mod relay;

pub use local::LocalWalletConnection;
pub use relay::RelayWalletConnection;

use crate::error::Result;
use crate::method::ConnectionMethod;
use crate::signature::WalletSignature;
use async_trait::async_trait;

#[async_trait]
pub trait WalletConnection: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Checksummed address of the connected wallet.
    fn wallet_address(&self) -> Option<String>;

    fn preferred_connection_method(&self) -> Result<ConnectionMethod>;

    async fn connect(&self) -> Result<()>;

    /// Personal-sign `message` (UTF-8 text only).
    async fn sign(&self, message: &[u8]) -> Result<WalletSignature>;

    async fn disconnect(&self);
}
