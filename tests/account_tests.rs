//! Account Tests: context, facade and connection methods
//!
//! These tests verify:
//! 1. WalletContext builds accounts from config and tears them down
//! 2. Preferred connection method follows platform capability
//! 3. Environment configuration
//! 4. QR output written to disk

use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use walletlink::context::config::{ENV_BRIDGE_URL, ENV_CHAIN_ID, ENV_SIGN_TIMEOUT_SECS};
use walletlink::signature::personal_sign_digest;
use walletlink::{
    qr_connection_method, ConnectionMethod, Error, Headless, LocalWalletConnection,
    PersonalSignRequest, RelayTransport, SchemeAllowList, SessionEvents, SessionUrl, SigningKey,
    WalletConfig, WalletContext,
};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner())
}

const SECRET: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
const WALLET: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";

/// Relay that approves every session and answers every request.
#[derive(Clone, Default)]
struct AutoWallet {
    events: Arc<Mutex<Option<SessionEvents>>>,
    opened: Arc<Mutex<Vec<SessionUrl>>>,
}

#[async_trait]
impl RelayTransport for AutoWallet {
    async fn open(&self, session: &SessionUrl, events: SessionEvents) -> walletlink::Result<()> {
        self.opened.lock().unwrap().push(session.clone());
        *self.events.lock().unwrap() = Some(events.clone());
        tokio::spawn(async move { events.connected(&[WALLET.to_string()]) });
        Ok(())
    }

    async fn send_personal_sign(&self, request: &PersonalSignRequest) -> walletlink::Result<()> {
        let events = self.events.lock().unwrap().clone();
        let id = request.id;
        tokio::spawn(async move {
            if let Some(events) = events {
                events.response(id, Ok(format!("0x{}1b", "22".repeat(64))));
            }
        });
        Ok(())
    }

    async fn close(&self) {
        self.events.lock().unwrap().take();
    }
}

/// Test: redirect when the platform can open wc://, QR otherwise
#[test]
fn preferred_method_follows_platform() {
    let capable =
        WalletContext::new(WalletConfig::new("test")).with_platform(SchemeAllowList::new(["wc"]));
    let account = capable.account_with_transport(AutoWallet::default());
    match account.preferred_connection_method().unwrap() {
        ConnectionMethod::Redirect(url) => {
            assert_eq!(url.scheme(), "wc");
            assert!(url.as_str().starts_with("wc://wc?uri=wc%3A"));
        }
        other => panic!("expected redirect, got {}", other.kind()),
    }

    let headless = WalletContext::new(WalletConfig::new("test")).with_platform(Headless);
    let account = headless.account_with_transport(AutoWallet::default());
    match account.preferred_connection_method().unwrap() {
        ConnectionMethod::QrCode(image) => {
            assert!(image.png.starts_with(b"\x89PNG"));
            assert_eq!(image.width, image.height);
        }
        other => panic!("expected qr code, got {}", other.kind()),
    }
}

/// Test: the method shown is for the session connect opens
#[tokio::test]
async fn shown_session_is_opened() {
    let relay = AutoWallet::default();
    let config = WalletConfig::new("test").with_bridge("https://bridge.example");
    let context = WalletContext::new(config).with_platform(SchemeAllowList::new(["wc"]));
    let account = context.account_with_transport(relay.clone());

    let ConnectionMethod::Redirect(shown) = account.preferred_connection_method().unwrap() else {
        panic!("expected redirect");
    };
    account.connect().await.unwrap();
    let opened = relay.opened.lock().unwrap()[0].clone();
    assert_eq!(shown.as_str(), opened.deeplink());
    assert_eq!(opened.bridge(), "https://bridge.example");
}

/// Test: full facade flow over a relay account
#[tokio::test]
async fn relay_account_signs() {
    let config = WalletConfig::new("test").with_sign_timeout(Duration::from_secs(5));
    let context = WalletContext::new(config);
    let account = context.account_with_transport(AutoWallet::default());

    assert_eq!(account.address(), "");
    assert_eq!(account.sign_text("hi").await, Err(Error::NotConnected));

    account.connect().await.unwrap();
    assert_eq!(account.address(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");

    let signature = account.sign_text("XMTP : Create Identity").await.unwrap();
    assert_eq!(signature.compact(), &[0x22; 64]);
    assert_eq!(signature.recovery(), 0);

    // Through the signing seam used by identity bootstrap
    let key: &dyn SigningKey = &account;
    assert_eq!(key.address(), account.address());
    assert!(key.sign(b"again").await.is_ok());

    context.shutdown().await;
    assert!(!account.is_connected());
    assert_eq!(account.address(), "");
}

/// Test: local account produces recoverable signatures
#[tokio::test]
async fn local_account_signature_recovers() {
    let context = WalletContext::new(WalletConfig::default());
    let account = context.local_account(LocalWalletConnection::from_hex(SECRET).unwrap());
    account.connect().await.unwrap();
    assert_eq!(account.address(), "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23");

    let message = "gm from walletlink";
    let signature = account.sign_text(message).await.unwrap();
    let recovered = VerifyingKey::recover_from_prehash(
        &personal_sign_digest(message.as_bytes()),
        &Signature::from_slice(signature.compact()).unwrap(),
        RecoveryId::from_byte(signature.recovery()).unwrap(),
    )
    .unwrap();
    assert_eq!(walletlink::address_from_key(&recovered), account.address());

    match account.preferred_connection_method().unwrap() {
        ConnectionMethod::Manual(text) => assert!(text.ends_with(&account.address())),
        other => panic!("expected manual, got {}", other.kind()),
    }
}

/// Test: shutdown reaches every account the context built
#[tokio::test]
async fn context_shutdown_disconnects_all() {
    let context = WalletContext::new(WalletConfig::new("test"));
    let relay = context.account_with_transport(AutoWallet::default());
    let local = context.local_account(LocalWalletConnection::random().unwrap());
    relay.connect().await.unwrap();
    local.connect().await.unwrap();
    assert_eq!(context.live_accounts(), 2);

    let waiter = context.shutdown_handle();
    context.shutdown().await;
    waiter.wait().await;
    assert!(!relay.is_connected());
    assert!(!local.is_connected());
}

/// Test: WALLETLINK_* variables override defaults
#[test]
fn config_from_env() {
    let _guard = lock_env();
    std::env::set_var(ENV_BRIDGE_URL, "https://bridge.internal");
    std::env::set_var(ENV_CHAIN_ID, "137");
    std::env::set_var(ENV_SIGN_TIMEOUT_SECS, "45");

    let config = WalletConfig::from_env("inbox").unwrap();
    assert_eq!(config.bridge_url, "https://bridge.internal");
    assert_eq!(config.chain_id, 137);
    assert_eq!(config.sign_timeout, Some(Duration::from_secs(45)));
    assert_eq!(config.client_meta.name, "inbox");

    std::env::set_var(ENV_SIGN_TIMEOUT_SECS, "0");
    assert_eq!(WalletConfig::from_env("inbox").unwrap().sign_timeout, None);

    std::env::set_var(ENV_CHAIN_ID, "mainnet");
    assert!(matches!(WalletConfig::from_env("inbox"), Err(Error::Encoding(_))));

    std::env::remove_var(ENV_BRIDGE_URL);
    std::env::remove_var(ENV_CHAIN_ID);
    std::env::remove_var(ENV_SIGN_TIMEOUT_SECS);
    let config = WalletConfig::from_env("inbox").unwrap();
    assert_eq!(config.bridge_url, walletlink::context::config::DEFAULT_BRIDGE);
    assert_eq!(config.chain_id, 1);
}

/// Test: QR PNG written to disk decodes to the expected dimensions
#[test]
fn qr_written_to_disk() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("session.png");

    let url = walletlink::generate_session_url("https://bridge.example").unwrap();
    let ConnectionMethod::QrCode(image) = qr_connection_method(&url.deeplink()).unwrap() else {
        panic!("expected qr code");
    };
    std::fs::write(&path, &image.png).unwrap();

    let decoded = image::open(&path).expect("png").to_luma8();
    assert_eq!(decoded.width(), image.width);
    assert_eq!(decoded.height(), image.height);
    assert_eq!(image.width % walletlink::method::QR_SCALE, 0);
}
