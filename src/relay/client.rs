//! Bridge relay client - tokio-tungstenite WebSocket
//!
//! Speaks the WalletConnect v1 bridge protocol: subscribe on our own client
//! id, publish the encrypted session request on the session topic, then route
//! the wallet's JSON-RPC traffic back into [`SessionEvents`].

use super::crypto::{decrypt_payload, encrypt_payload, EncryptedPayload};
use super::protocol::{
    parse_inbound, Inbound, JsonRpcRequest, JsonRpcResponse, PeerMeta, SessionParams, SocketMessage,
    METHOD_SESSION_UPDATE,
};
use super::{PersonalSignRequest, RelayTransport};
use crate::bridge::next_request_id;
use crate::error::{Error, Result};
use crate::session::{random_topic, SessionEvents, SessionKey, SessionUrl};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Map the bridge's http(s) endpoint onto its WebSocket endpoint.
pub fn bridge_ws_url(bridge: &str) -> Result<Url> {
    let mut url = Url::parse(bridge)?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(Error::Encoding(format!("unsupported bridge scheme: {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| Error::Encoding(format!("cannot use {scheme} for {bridge}")))?;
    Ok(url)
}

/// Live socket for one session.
struct Link {
    topic: String,
    key: SessionKey,
    peer: Arc<RwLock<Option<String>>>,
    outbound: mpsc::Sender<String>,
    reader: JoinHandle<()>,
}

impl Link {
    async fn publish(&self, topic: &str, body: &JsonRpcRequest, silent: bool) -> Result<()> {
        let plaintext = serde_json::to_vec(body).map_err(|e| Error::Encoding(e.to_string()))?;
        let payload = encrypt_payload(&self.key, &plaintext)?;
        let payload = serde_json::to_string(&payload).map_err(|e| Error::Encoding(e.to_string()))?;
        let msg = SocketMessage::publish(topic, payload, silent);
        self.send(&msg).await
    }

    async fn send(&self, msg: &SocketMessage) -> Result<()> {
        let text = serde_json::to_string(msg).map_err(|e| Error::Encoding(e.to_string()))?;
        self.outbound
            .send(text)
            .await
            .map_err(|_| Error::Relay("relay connection closed".into()))
    }

    fn peer_id(&self) -> Option<String> {
        self.peer.read().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// What the reader task needs to interpret inbound traffic.
struct Inbox {
    client_id: String,
    handshake_id: u64,
    key: SessionKey,
    peer: Arc<RwLock<Option<String>>>,
    events: SessionEvents,
}

impl Inbox {
    fn handle(&self, text: &str) {
        let Ok(socket) = serde_json::from_str::<SocketMessage>(text) else {
            debug!("ignoring non-message frame");
            return;
        };
        if !socket.is_publish() || socket.topic != self.client_id {
            return;
        }
        let plaintext = match serde_json::from_str::<EncryptedPayload>(&socket.payload)
            .map_err(|e| Error::Encoding(e.to_string()))
            .and_then(|payload| decrypt_payload(&self.key, &payload))
        {
            Ok(p) => p,
            Err(e) => {
                warn!("dropping undecryptable payload: {}", e);
                return;
            }
        };
        match parse_inbound(&plaintext) {
            Some(Inbound::Response(resp)) if resp.id == self.handshake_id => {
                self.on_session_response(resp)
            }
            Some(Inbound::Response(resp)) => {
                let id = resp.id;
                let resolution = self.events.response(id, resp.into_outcome());
                debug!(id, ?resolution, "wallet response");
            }
            Some(Inbound::Request(req)) if req.method == METHOD_SESSION_UPDATE => {
                self.on_session_update(req)
            }
            Some(Inbound::Request(req)) => debug!("ignoring wallet request {}", req.method),
            None => warn!("unrecognised payload from wallet"),
        }
    }

    fn on_session_response(&self, resp: JsonRpcResponse) {
        if let Some(err) = resp.error {
            self.events.connect_failed(err.message);
            return;
        }
        let params = resp.result.and_then(|v| serde_json::from_value::<SessionParams>(v).ok());
        match params {
            Some(params) if params.approved => {
                if let Some(peer_id) = params.peer_id {
                    *self.peer.write().unwrap_or_else(|p| p.into_inner()) = Some(peer_id);
                }
                if let Some(meta) = &params.peer_meta {
                    info!(wallet = %meta.name, "wallet approved session");
                }
                self.events.connected(&params.accounts.unwrap_or_default());
            }
            Some(_) => self.events.connect_failed("Session rejected by wallet"),
            None => self.events.connect_failed("Malformed session response"),
        }
    }

    fn on_session_update(&self, req: JsonRpcRequest) {
        let params = req
            .params
            .into_iter()
            .next()
            .and_then(|v| serde_json::from_value::<SessionParams>(v).ok());
        match params {
            Some(params) if params.approved => {
                if let Some(accounts) = params.accounts {
                    self.events.connected(&accounts);
                }
            }
            _ => self.events.disconnected(),
        }
    }
}

/// WalletConnect v1 bridge transport
pub struct BridgeRelay {
    meta: PeerMeta,
    chain_id: u64,
    link: Mutex<Option<Link>>,
}

impl BridgeRelay {
    pub fn new(meta: PeerMeta, chain_id: u64) -> Self {
        Self { meta, chain_id, link: Mutex::new(None) }
    }

    pub async fn is_open(&self) -> bool {
        self.link.lock().await.as_ref().map(|l| !l.outbound.is_closed()).unwrap_or(false)
    }
}

#[async_trait]
impl RelayTransport for BridgeRelay {
    async fn open(&self, session: &SessionUrl, events: SessionEvents) -> Result<()> {
        self.close().await;

        let ws_url = bridge_ws_url(session.bridge())?;
        let (ws, _) = connect_async(ws_url.as_str())
            .await
            .map_err(|e| Error::Relay(format!("{ws_url}: {e}")))?;
        let (mut write, mut read) = ws.split();

        // Channel for outgoing frames
        let (out_tx, mut out_rx) = mpsc::channel::<String>(32);

        // Spawn writer task
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if write.send(Message::Text(msg)).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        let client_id = random_topic()?;
        let handshake_id = next_request_id()?;
        let peer = Arc::new(RwLock::new(None));
        let inbox = Inbox {
            client_id: client_id.clone(),
            handshake_id,
            key: session.key().clone(),
            peer: peer.clone(),
            events,
        };

        // Spawn reader task
        let reader = tokio::spawn(async move {
            while let Some(Ok(msg)) = read.next().await {
                if let Message::Text(txt) = msg {
                    inbox.handle(&txt);
                }
            }
            debug!("bridge socket closed");
            inbox.events.disconnected();
        });

        let link = Link {
            topic: session.topic().to_string(),
            key: session.key().clone(),
            peer,
            outbound: out_tx,
            reader,
        };
        link.send(&SocketMessage::subscribe(&client_id)).await?;
        let request =
            JsonRpcRequest::session_request(handshake_id, &client_id, &self.meta, self.chain_id);
        link.publish(session.topic(), &request, false).await?;
        info!(topic = session.topic(), bridge = %ws_url, "session request published");

        *self.link.lock().await = Some(link);
        Ok(())
    }

    async fn send_personal_sign(&self, request: &PersonalSignRequest) -> Result<()> {
        let guard = self.link.lock().await;
        let link = guard.as_ref().filter(|l| l.topic == request.topic).ok_or(Error::NotConnected)?;
        let peer = link.peer_id().ok_or(Error::NotConnected)?;
        let body = JsonRpcRequest::personal_sign(request.id, &request.message, &request.account);
        link.publish(&peer, &body, false).await
    }

    async fn close(&self) {
        let Some(link) = self.link.lock().await.take() else { return };
        if let Some(peer) = link.peer_id() {
            match next_request_id() {
                Ok(id) => {
                    let kill = JsonRpcRequest::session_kill(id);
                    if let Err(e) = link.publish(&peer, &kill, true).await {
                        debug!("session kill not sent: {}", e);
                    }
                }
                Err(e) => warn!("session kill skipped: {}", e),
            }
        }
        info!(topic = %link.topic, "bridge link closed");
    }
}
