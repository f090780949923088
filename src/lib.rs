//! Walletlink: wallet-connect authentication for messaging clients.
//!
//! # Architecture
//!
//! ```text
//! WalletContext (config, platform, shutdown)
//!   │
//!   └── Account (SigningKey seam)
//!         └── WalletConnection
//!               ├── RelayWalletConnection
//!               │     ├── ConnectionSession ── SessionUrl (wc: URI, deep link)
//!               │     │     └── RelayTransport (BridgeRelay over websocket)
//!               │     └── SigningBridge (pending requests, exactly-once)
//!               └── LocalWalletConnection (in-process key)
//! ```
//!
//! # Flow
//!
//! | Step | Call | Result |
//! |------|------|--------|
//! | present | `account.preferred_connection_method()` | Redirect / QR code / manual |
//! | connect | `account.connect().await` | wallet approves, address known |
//! | sign | `account.sign_text(msg).await` | normalized 65-byte signature |
//! | close | `context.shutdown().await` | every account disconnected |
//!
//! # Features
//!
//! - `relay` - WalletConnect v1 bridge client (tokio-tungstenite, rustls)
//!
//! # Usage
//!
//! ```ignore
//! use walletlink::{WalletConfig, WalletContext, SchemeAllowList, ConnectionMethod};
//!
//! let context = WalletContext::new(WalletConfig::new("inbox"))
//!     .with_platform(SchemeAllowList::new(["wc"]));
//! let account = context.relay_account();
//!
//! match account.preferred_connection_method()? {
//!     ConnectionMethod::Redirect(url) => open(url),
//!     ConnectionMethod::QrCode(image) => show(image.png),
//!     ConnectionMethod::Manual(text) => println!("{text}"),
//! }
//! account.connect().await?;
//! let signature = account.sign_text("XMTP : Create Identity").await?;
//! ```

pub mod account;
pub mod address;
pub mod bridge;
pub mod connection;
pub mod context;
pub mod error;
pub mod logging;
pub mod method;
pub mod relay;
pub mod runtime;
pub mod session;
pub mod signature;

pub use account::{Account, SigningKey};
pub use address::{address_from_key, checksum_address};
pub use bridge::{PendingRequests, Resolution, SigningBridge};
pub use connection::{LocalWalletConnection, RelayWalletConnection, WalletConnection};
pub use context::{WalletConfig, WalletContext};
pub use error::{Error, Result};
pub use method::{
    manual_connection_method, preferred_connection_method, qr_connection_method,
    redirect_connection_method, ConnectionMethod, Headless, Platform, QrCodeImage,
    SchemeAllowList,
};
pub use relay::{PersonalSignRequest, RelayTransport};
pub use runtime::{install_signal_handlers, Shutdown};
pub use session::{
    generate_session_url, ConnectionSession, ConnectionState, SessionEvents, SessionKey, SessionUrl,
};
pub use signature::{normalize, parse_signature_hex, WalletSignature, SIGNATURE_LEN};

#[cfg(feature = "relay")]
pub use relay::BridgeRelay;
