use super::WalletConnection;
use crate::bridge::SigningBridge;
use crate::error::Result;
use crate::method::{
    manual_connection_method, preferred_connection_method, ConnectionMethod, Platform,
};
use crate::relay::RelayTransport;
use crate::session::{ConnectionSession, ConnectionState, SessionUrl};
use crate::signature::WalletSignature;
use async_trait::async_trait;
use std::sync::Arc;

/// External wallet reached through a relay transport.
pub struct RelayWalletConnection<T: RelayTransport> {
    session: ConnectionSession<T>,
    bridge: SigningBridge,
    platform: Arc<dyn Platform>,
}

impl<T: RelayTransport> RelayWalletConnection<T> {
    pub fn new(
        session: ConnectionSession<T>,
        bridge: SigningBridge,
        platform: Arc<dyn Platform>,
    ) -> Self {
        Self { session, bridge, platform }
    }

    pub fn session(&self) -> &ConnectionSession<T> {
        &self.session
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn session_url(&self) -> Result<SessionUrl> {
        self.session.session_url()
    }

    /// Raw deep link for explicit textual display.
    pub fn manual_connection_method(&self) -> Result<ConnectionMethod> {
        manual_connection_method(&self.session.session_url()?.deeplink())
    }
}

#[async_trait]
impl<T: RelayTransport> WalletConnection for RelayWalletConnection<T> {
    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    fn wallet_address(&self) -> Option<String> {
        self.session.wallet_address()
    }

    fn preferred_connection_method(&self) -> Result<ConnectionMethod> {
        let url = self.session.session_url()?;
        preferred_connection_method(&url.deeplink(), self.platform.as_ref())
    }

    async fn connect(&self) -> Result<()> {
        self.session.connect().await
    }

    async fn sign(&self, message: &[u8]) -> Result<WalletSignature> {
        self.bridge.sign(&self.session, message).await
    }

    async fn disconnect(&self) {
        self.session.disconnect().await
    }
}
