//! WalletContext - explicitly constructed owner of wallet accounts
//!
//! ```text
//! WalletContext
//!   ├── WalletConfig (bridge, client meta, chain, sign timeout)
//!   ├── Platform (can the environment open wc:// links?)
//!   ├── Shutdown
//!   └── accounts it built
//!         └── Account → RelayWalletConnection
//!                        ├── ConnectionSession → RelayTransport
//!                        └── SigningBridge
//! ```
//!
//! Collaborators receive the context (or the accounts it builds); nothing is
//! reached through globals. [`WalletContext::shutdown`] tears every account down.

pub mod config;

pub use config::WalletConfig;

use crate::account::Account;
use crate::bridge::SigningBridge;
use crate::connection::{LocalWalletConnection, RelayWalletConnection, WalletConnection};
use crate::method::{Headless, Platform};
use crate::relay::RelayTransport;
use crate::runtime::Shutdown;
use crate::session::ConnectionSession;
use std::sync::{Arc, Mutex, Weak};

pub struct WalletContext {
    config: WalletConfig,
    platform: Arc<dyn Platform>,
    shutdown: Shutdown,
    accounts: Mutex<Vec<Weak<dyn WalletConnection>>>,
}

impl WalletContext {
    pub fn new(config: WalletConfig) -> Self {
        Self {
            config,
            platform: Arc::new(Headless),
            shutdown: Shutdown::new(),
            accounts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_platform(mut self, platform: impl Platform + 'static) -> Self {
        self.platform = Arc::new(platform);
        self
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    fn register(&self, connection: Arc<dyn WalletConnection>) -> Account {
        let mut accounts = self.accounts.lock().unwrap_or_else(|p| p.into_inner());
        accounts.retain(|weak| weak.strong_count() > 0);
        accounts.push(Arc::downgrade(&connection));
        Account::new(connection)
    }

    /// Account backed by an external wallet over `transport`.
    pub fn account_with_transport<T: RelayTransport>(&self, transport: T) -> Account {
        let session = ConnectionSession::new(transport, self.config.bridge_url.clone());
        let bridge = SigningBridge::new(self.config.sign_timeout);
        let connection = RelayWalletConnection::new(session, bridge, self.platform.clone());
        tracing::debug!(bridge = %self.config.bridge_url, "relay account created");
        self.register(Arc::new(connection))
    }

    /// Account backed by an external wallet over the configured bridge.
    #[cfg(feature = "relay")]
    pub fn relay_account(&self) -> Account {
        let meta = self.config.client_meta.clone();
        let transport = crate::relay::BridgeRelay::new(meta, self.config.chain_id);
        self.account_with_transport(transport)
    }

    /// Account backed by an in-process key.
    pub fn local_account(&self, wallet: LocalWalletConnection) -> Account {
        self.register(Arc::new(wallet))
    }

    pub fn live_accounts(&self) -> usize {
        self.accounts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Disconnect every account this context built and signal shutdown.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();
        let accounts: Vec<_> = {
            let mut accounts = self.accounts.lock().unwrap_or_else(|p| p.into_inner());
            accounts.drain(..).filter_map(|weak| weak.upgrade()).collect()
        };
        tracing::info!("shutting down {} wallet accounts", accounts.len());
        for connection in accounts {
            connection.disconnect().await;
        }
    }
}
