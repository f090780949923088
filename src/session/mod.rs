//! ConnectionSession - session URL ownership and connection lifecycle
//!
//! ```text
//! Disconnected ──connect()──→ Connecting ──connected──→ Connected
//!      ↑                          │                        │
//!      └──── connect_failed ──────┘                        │
//!      └────────────── disconnect() / disconnected ────────┘
//! ```
//!
//! All mutable state (lifecycle, wallet address, handshake slot, pending sign
//! requests) sits behind one mutex. Relay callbacks reach it through
//! [`SessionEvents`], which only act on the topic they were created for, so a
//! late callback from a torn-down session never touches the live one.

mod uri;

pub use uri::{
    fill_secure, generate_session_url, random_topic, secure_u64, SessionKey, SessionUrl,
    DEEPLINK_PREFIX, PROTOCOL_VERSION,
};

use crate::address::checksum_address;
use crate::bridge::{PendingRequests, Resolution};
use crate::error::{Error, Result};
use crate::relay::RelayTransport;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

type Handshake = oneshot::Sender<std::result::Result<(), String>>;

pub(crate) struct SessionState {
    pub(crate) url: Option<SessionUrl>,
    pub(crate) state: ConnectionState,
    pub(crate) wallet_address: Option<String>,
    pub(crate) pending: PendingRequests,
    handshake: Option<Handshake>,
}

impl SessionState {
    fn is_current(&self, topic: &str) -> bool {
        self.url.as_ref().map(|u| u.topic()) == Some(topic)
    }

    /// Back to Disconnected. The URL is dropped so the next connect starts a
    /// brand-new session.
    fn reset(&mut self, reason: &str) -> bool {
        let was_active = self.state != ConnectionState::Disconnected;
        self.state = ConnectionState::Disconnected;
        self.wallet_address = None;
        self.url = None;
        if let Some(tx) = self.handshake.take() {
            let _ = tx.send(Err(reason.to_string()));
        }
        let rejected = self.pending.reject_all(Error::NotConnected);
        if rejected > 0 {
            debug!("rejected {} pending sign requests", rejected);
        }
        was_active
    }
}

struct Shared {
    state: Mutex<SessionState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Callback handle given to a relay transport for one session topic.
#[derive(Clone)]
pub struct SessionEvents {
    shared: Weak<Shared>,
    topic: String,
}

impl SessionEvents {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn with_current<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let shared = self.shared.upgrade()?;
        let mut state = shared.lock();
        if !state.is_current(&self.topic) {
            debug!(topic = %self.topic, "ignoring callback for stale session");
            return None;
        }
        Some(f(&mut state))
    }

    /// Wallet approved the session. The first account becomes the wallet address.
    pub fn connected(&self, accounts: &[String]) {
        self.with_current(|state| {
            state.wallet_address = accounts.first().and_then(|a| match checksum_address(a) {
                Ok(addr) => Some(addr),
                Err(e) => {
                    warn!("wallet reported unusable address: {}", e);
                    None
                }
            });
            state.state = ConnectionState::Connected;
            info!(topic = %self.topic, address = ?state.wallet_address, "session connected");
            if let Some(tx) = state.handshake.take() {
                let _ = tx.send(Ok(()));
            }
        });
    }

    /// Handshake failed or the wallet rejected the session.
    pub fn connect_failed(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.with_current(|state| {
            if state.state == ConnectionState::Connecting {
                warn!(topic = %self.topic, "session rejected: {}", reason);
                state.reset(&reason);
            }
        });
    }

    /// Relay or wallet ended the session.
    pub fn disconnected(&self) {
        self.with_current(|state| {
            info!(topic = %self.topic, "session invalidated");
            state.reset("session disconnected");
        });
    }

    /// JSON-RPC response addressed to a pending sign request.
    pub fn response(&self, id: u64, outcome: std::result::Result<String, String>) -> Resolution {
        self.with_current(|state| state.pending.resolve(id, outcome.map_err(Error::Wallet)))
            .unwrap_or(Resolution::Ignored)
    }
}

/// Resets a handshake whose `connect()` future was dropped before the wallet
/// answered, so the next attempt starts from Disconnected.
struct AbandonGuard<'a> {
    shared: &'a Shared,
    topic: &'a str,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        let abandoned = state.state == ConnectionState::Connecting
            && state.handshake.is_some()
            && state.is_current(self.topic);
        if abandoned {
            debug!(topic = %self.topic, "connect abandoned before handshake completed");
            state.reset("connect cancelled");
        }
    }
}

/// Owns the session URL, the lifecycle and the relay transport.
pub struct ConnectionSession<T: RelayTransport> {
    shared: Arc<Shared>,
    transport: Arc<T>,
    bridge_url: String,
}

impl<T: RelayTransport> ConnectionSession<T> {
    pub fn new(transport: T, bridge_url: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState {
                    url: None,
                    state: ConnectionState::Disconnected,
                    wallet_address: None,
                    pending: PendingRequests::default(),
                    handshake: None,
                }),
            }),
            transport: Arc::new(transport),
            bridge_url: bridge_url.into(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn wallet_address(&self) -> Option<String> {
        self.shared.lock().wallet_address.clone()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.shared.lock()
    }

    /// Current session URL, generating a fresh one if none is live.
    pub fn session_url(&self) -> Result<SessionUrl> {
        let mut state = self.shared.lock();
        Self::current_or_fresh(&mut state, &self.bridge_url)
    }

    fn current_or_fresh(state: &mut SessionState, bridge: &str) -> Result<SessionUrl> {
        if let Some(url) = &state.url {
            return Ok(url.clone());
        }
        let url = generate_session_url(bridge)?;
        debug!(topic = url.topic(), "generated session");
        state.url = Some(url.clone());
        Ok(url)
    }

    /// Open the relay session and wait for the wallet to approve or reject it.
    ///
    /// Fails with [`Error::AlreadyConnecting`] while another attempt is in
    /// flight; returns immediately if already connected.
    pub async fn connect(&self) -> Result<()> {
        let (url, rx) = {
            let mut state = self.shared.lock();
            match state.state {
                ConnectionState::Connecting => return Err(Error::AlreadyConnecting),
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Disconnected => {}
            }
            let url = Self::current_or_fresh(&mut state, &self.bridge_url)?;
            let (tx, rx) = oneshot::channel();
            state.handshake = Some(tx);
            state.state = ConnectionState::Connecting;
            (url, rx)
        };

        info!(topic = url.topic(), bridge = url.bridge(), "connecting");
        let _abandon = AbandonGuard { shared: &self.shared, topic: url.topic() };
        let events =
            SessionEvents { shared: Arc::downgrade(&self.shared), topic: url.topic().to_string() };
        if let Err(e) = self.transport.open(&url, events.clone()).await {
            events.connect_failed(e.to_string());
            return Err(Error::Connect(e.to_string()));
        }

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(Error::Connect(reason)),
            Err(_) => Err(Error::Connect("handshake abandoned".into())),
        }
    }

    /// Tear down the session. The next connect generates a new topic and key.
    pub async fn disconnect(&self) {
        let was_active = self.shared.lock().reset("session disconnected");
        if was_active {
            info!("disconnecting");
            self.transport.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::PersonalSignRequest;
    use async_trait::async_trait;

    /// Transport that records the event handle and never answers on its own.
    #[derive(Default)]
    struct Silent {
        events: Mutex<Option<SessionEvents>>,
    }

    #[async_trait]
    impl RelayTransport for Silent {
        async fn open(&self, _session: &SessionUrl, events: SessionEvents) -> Result<()> {
            *self.events.lock().unwrap() = Some(events);
            Ok(())
        }
        async fn send_personal_sign(&self, _request: &PersonalSignRequest) -> Result<()> {
            Ok(())
        }
        async fn close(&self) {}
    }

    fn events(session: &ConnectionSession<Silent>) -> SessionEvents {
        session.transport().events.lock().unwrap().clone().expect("opened")
    }

    #[tokio::test]
    async fn session_url_is_stable_until_disconnect() {
        let session = ConnectionSession::new(Silent::default(), "https://bridge.example");
        let first = session.session_url().unwrap();
        assert_eq!(session.session_url().unwrap(), first);
        session.disconnect().await;
        let second = session.session_url().unwrap();
        assert_ne!(second.topic(), first.topic());
        assert_ne!(second.key(), first.key());
    }

    #[tokio::test]
    async fn stale_topic_is_ignored() {
        let session = Arc::new(ConnectionSession::new(Silent::default(), "https://bridge.example"));
        let s = session.clone();
        let handle = tokio::spawn(async move { s.connect().await });
        while session.transport().events.lock().unwrap().is_none() {
            tokio::task::yield_now().await;
        }
        let live = events(&session);
        let stale = SessionEvents { shared: live.shared.clone(), topic: "old-topic".into() };
        stale.connected(&["0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".into()]);
        assert_eq!(session.state(), ConnectionState::Connecting);

        live.connected(&["0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".into()]);
        handle.await.unwrap().unwrap();
        assert_eq!(
            session.wallet_address().as_deref(),
            Some("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed")
        );
    }

    #[tokio::test]
    async fn callbacks_after_drop_are_harmless() {
        let session = Arc::new(ConnectionSession::new(Silent::default(), "https://bridge.example"));
        let s = session.clone();
        let handle = tokio::spawn(async move { s.connect().await });
        while session.transport().events.lock().unwrap().is_none() {
            tokio::task::yield_now().await;
        }
        let live = events(&session);
        live.connect_failed("rejected by user");
        assert_eq!(handle.await.unwrap(), Err(Error::Connect("rejected by user".into())));
        drop(session);
        live.connected(&[]);
        live.disconnected();
        assert_eq!(live.response(1, Ok("0x".into())), Resolution::Ignored);
    }
}
