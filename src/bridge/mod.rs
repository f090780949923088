//! SigningBridge - awaitable personal-sign over a callback-driven relay
//!
//! Each `sign()` registers a single-use slot under a fresh correlation id,
//! sends the request, then waits on the slot. Resolving removes the slot, so
//! any later callback with the same id finds nothing and is dropped.

use crate::error::{Error, Result};
use crate::relay::{PersonalSignRequest, RelayTransport};
use crate::session::{secure_u64, ConnectionSession, ConnectionState};
use crate::signature::WalletSignature;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

type Slot = oneshot::Sender<Result<String>>;

/// JSON-RPC ids stay within what a JavaScript wallet can represent exactly.
pub const MAX_REQUEST_ID: u64 = (1 << 53) - 1;

/// Fresh non-zero request id.
pub fn next_request_id() -> Result<u64> {
    loop {
        let id = secure_u64()? & MAX_REQUEST_ID;
        if id != 0 {
            return Ok(id);
        }
    }
}

/// What a relay callback did to the pending table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved,
    Rejected,
    /// Unknown, already resolved, or abandoned by its caller.
    Ignored,
}

/// Correlation id → single-use resolution slot.
#[derive(Default)]
pub struct PendingRequests {
    slots: HashMap<u64, Slot>,
}

impl PendingRequests {
    /// Register a new pending request under a fresh random id.
    pub fn register(&mut self) -> Result<(u64, oneshot::Receiver<Result<String>>)> {
        let mut id = next_request_id()?;
        while self.slots.contains_key(&id) {
            id = next_request_id()?;
        }
        let (tx, rx) = oneshot::channel();
        self.slots.insert(id, tx);
        Ok((id, rx))
    }

    /// Resolve `id` once. Every later call for the same id is a no-op.
    pub fn resolve(&mut self, id: u64, outcome: Result<String>) -> Resolution {
        let Some(slot) = self.slots.remove(&id) else {
            debug!(id, "dropping callback for unknown or settled request");
            return Resolution::Ignored;
        };
        let resolution = if outcome.is_ok() { Resolution::Resolved } else { Resolution::Rejected };
        match slot.send(outcome) {
            Ok(()) => resolution,
            Err(_) => {
                debug!(id, "caller stopped waiting for request");
                Resolution::Ignored
            }
        }
    }

    pub fn forget(&mut self, id: u64) -> bool {
        self.slots.remove(&id).is_some()
    }

    /// Reject everything still pending with `err`.
    pub fn reject_all(&mut self, err: Error) -> usize {
        let count = self.slots.len();
        for (_, slot) in self.slots.drain() {
            let _ = slot.send(Err(err.clone()));
        }
        count
    }

    pub fn contains(&self, id: u64) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SigningBridge {
    timeout: Option<Duration>,
}

impl SigningBridge {
    /// `timeout: None` waits for the wallet indefinitely.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Ask the connected wallet to personal-sign `message` (UTF-8 only).
    pub async fn sign<T: RelayTransport>(
        &self,
        session: &ConnectionSession<T>,
        message: &[u8],
    ) -> Result<WalletSignature> {
        let (request, rx) = {
            let mut state = session.lock_state();
            if state.state != ConnectionState::Connected {
                return Err(Error::NotConnected);
            }
            let account = state.wallet_address.clone().ok_or(Error::NoAddress)?;
            let text = std::str::from_utf8(message).map_err(|_| Error::InvalidMessage)?;
            let topic =
                state.url.as_ref().map(|u| u.topic().to_string()).ok_or(Error::NotConnected)?;
            let (id, rx) = state.pending.register()?;
            (PersonalSignRequest { id, topic, message: text.to_string(), account }, rx)
        };
        let id = request.id;

        info!(id, account = %request.account, "requesting personal-sign");
        if let Err(e) = session.transport().send_personal_sign(&request).await {
            session.lock_state().pending.forget(id);
            return Err(e);
        }

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    session.lock_state().pending.forget(id);
                    warn!(id, "personal-sign timed out after {:?}", limit);
                    return Err(Error::Timeout);
                }
            },
            None => rx.await,
        };

        // A dropped slot means the session went away underneath us.
        let hex_sig = outcome.map_err(|_| Error::NotConnected)??;
        WalletSignature::from_wallet_hex(&hex_sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_exactly_once() {
        let mut pending = PendingRequests::default();
        let (id, mut rx) = pending.register().unwrap();
        assert_eq!(pending.resolve(id, Ok("first".into())), Resolution::Resolved);
        assert_eq!(pending.resolve(id, Ok("second".into())), Resolution::Ignored);
        assert_eq!(pending.resolve(id, Err(Error::Wallet("late".into()))), Resolution::Ignored);
        assert_eq!(rx.try_recv().unwrap(), Ok("first".to_string()));
        assert!(pending.is_empty());
    }

    #[test]
    fn rejection_is_delivered() {
        let mut pending = PendingRequests::default();
        let (id, mut rx) = pending.register().unwrap();
        assert_eq!(pending.resolve(id, Err(Error::Wallet("denied".into()))), Resolution::Rejected);
        assert_eq!(rx.try_recv().unwrap(), Err(Error::Wallet("denied".into())));
    }

    #[test]
    fn abandoned_request_is_ignored() {
        let mut pending = PendingRequests::default();
        let (id, rx) = pending.register().unwrap();
        drop(rx);
        assert_eq!(pending.resolve(id, Ok("sig".into())), Resolution::Ignored);
    }

    #[test]
    fn ids_are_unique() {
        let mut pending = PendingRequests::default();
        let mut receivers = Vec::new();
        for _ in 0..64 {
            let (id, rx) = pending.register().unwrap();
            assert!(id != 0 && id <= MAX_REQUEST_ID);
            receivers.push(rx);
        }
        assert_eq!(pending.len(), 64);
        assert_eq!(pending.reject_all(Error::NotConnected), 64);
        for mut rx in receivers {
            assert_eq!(rx.try_recv().unwrap(), Err(Error::NotConnected));
        }
    }
}
