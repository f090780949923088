//! Wallet configuration - passed from higher layers

use crate::error::{Error, Result};
use crate::relay::protocol::PeerMeta;
use std::time::Duration;

pub const DEFAULT_BRIDGE: &str = "https://bridge.walletconnect.org";
pub const DEFAULT_CHAIN_ID: u64 = 1;

pub const ENV_BRIDGE_URL: &str = "WALLETLINK_BRIDGE_URL";
pub const ENV_CHAIN_ID: &str = "WALLETLINK_CHAIN_ID";
pub const ENV_SIGN_TIMEOUT_SECS: &str = "WALLETLINK_SIGN_TIMEOUT_SECS";

/// Wallet configuration. Higher layers construct this.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub bridge_url: String,
    pub client_meta: PeerMeta,
    pub chain_id: u64,
    /// `None` waits for the wallet indefinitely.
    pub sign_timeout: Option<Duration>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            bridge_url: DEFAULT_BRIDGE.into(),
            client_meta: PeerMeta::default(),
            chain_id: DEFAULT_CHAIN_ID,
            sign_timeout: None,
        }
    }
}

impl WalletConfig {
    pub fn new(app: impl Into<String>) -> Self {
        let client_meta = PeerMeta { name: app.into(), ..PeerMeta::default() };
        Self { client_meta, ..Default::default() }
    }
    pub fn with_bridge(mut self, url: impl Into<String>) -> Self {
        self.bridge_url = url.into();
        self
    }
    pub fn with_client_meta(mut self, meta: PeerMeta) -> Self {
        self.client_meta = meta;
        self
    }
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }
    pub fn with_sign_timeout(mut self, timeout: Duration) -> Self {
        self.sign_timeout = Some(timeout);
        self
    }
    /// Wait for the wallet indefinitely.
    pub fn without_sign_timeout(mut self) -> Self {
        self.sign_timeout = None;
        self
    }

    /// Defaults overridden by `WALLETLINK_*` environment variables.
    pub fn from_env(app: impl Into<String>) -> Result<Self> {
        let mut config = Self::new(app);
        if let Ok(url) = std::env::var(ENV_BRIDGE_URL) {
            config.bridge_url = url;
        }
        if let Ok(raw) = std::env::var(ENV_CHAIN_ID) {
            config.chain_id = raw
                .trim()
                .parse()
                .map_err(|e| Error::Encoding(format!("{ENV_CHAIN_ID}: {e}")))?;
        }
        if let Ok(raw) = std::env::var(ENV_SIGN_TIMEOUT_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|e| Error::Encoding(format!("{ENV_SIGN_TIMEOUT_SECS}: {e}")))?;
            config.sign_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        Ok(config)
    }
}
