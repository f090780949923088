//! Relay - encrypted transport between this client and the wallet
//!
//! Provides the transport seam used by [`crate::session::ConnectionSession`]:
//! - [`RelayTransport`] trait (open / personal-sign / close)
//! - WalletConnect v1 bridge client over tokio-tungstenite (`relay` feature)
//! - Payload encryption (AES-256-CBC + HMAC-SHA256)
//! - Bridge socket messages and JSON-RPC envelopes
//!
//! Transports report back through [`crate::session::SessionEvents`]; they
//! never touch session state directly.

#[cfg(feature = "relay")]
pub mod client;
pub mod crypto;
pub mod protocol;

#[cfg(feature = "relay")]
pub use client::BridgeRelay;
pub use crypto::{decrypt_payload, encrypt_payload, EncryptedPayload};
pub use protocol::{JsonRpcRequest, JsonRpcResponse, SocketMessage};

use crate::error::Result;
use crate::session::{SessionEvents, SessionUrl};
use async_trait::async_trait;

/// One personal-sign request, tagged with its correlation id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalSignRequest {
    pub id: u64,
    /// Session topic the request belongs to.
    pub topic: String,
    pub message: String,
    /// Checksummed signer address.
    pub account: String,
}

/// Relay connection owned by a single session.
#[async_trait]
pub trait RelayTransport: Send + Sync + 'static {
    /// Start the handshake for `session`. Returns once the request is on the
    /// wire; approval or rejection arrives later through `events`.
    async fn open(&self, session: &SessionUrl, events: SessionEvents) -> Result<()>;

    /// Send a personal-sign request. The answer arrives through
    /// [`SessionEvents::response`] with the same id.
    async fn send_personal_sign(&self, request: &PersonalSignRequest) -> Result<()>;

    async fn close(&self);
}
