//! Session URLs: topic, bridge endpoint and symmetric key.
//!
//! ```text
//! wc:<topic>@1?bridge=<pct-encoded bridge>&key=<64 hex>      (session URI)
//! wc://wc?uri=<pct-encoded session URI>                     (deep link)
//! ```

use crate::error::{Error, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Protocol version carried in the session URI.
pub const PROTOCOL_VERSION: u8 = 1;

pub const DEEPLINK_PREFIX: &str = "wc://wc?uri=";

/// RFC 3986 unreserved characters stay literal, everything else is escaped.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// 32-byte symmetric key for one session. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; 32]);

impl SessionKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = hex::decode(value).map_err(|e| Error::Encoding(format!("key hex: {e}")))?;
        let got = bytes.len();
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Encoding(format!("key must be 32 bytes, got {got}")))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Everything a wallet needs to join a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUrl {
    topic: String,
    bridge: String,
    key: SessionKey,
}

impl SessionUrl {
    pub fn from_parts(
        topic: impl Into<String>,
        bridge: impl Into<String>,
        key: SessionKey,
    ) -> Self {
        Self { topic: topic.into(), bridge: bridge.into(), key }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn bridge(&self) -> &str {
        &self.bridge
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// `wc:<topic>@1?bridge=..&key=..`
    pub fn wc_uri(&self) -> String {
        format!(
            "wc:{}@{}?bridge={}&key={}",
            self.topic,
            PROTOCOL_VERSION,
            utf8_percent_encode(&self.bridge, COMPONENT),
            self.key.to_hex()
        )
    }

    /// `wc://wc?uri=<pct-encoded wc_uri>`, handed to the OS "open URL" facility.
    pub fn deeplink(&self) -> String {
        format!("{}{}", DEEPLINK_PREFIX, utf8_percent_encode(&self.wc_uri(), COMPONENT))
    }

    /// Parse a session URI or a deep link wrapping one.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::Encoding("empty session URI".into()));
        }
        let url = Url::parse(value)?;
        if url.scheme() != "wc" {
            return Err(Error::Encoding(format!("unexpected scheme: {}", url.scheme())));
        }
        if url.host_str() == Some("wc") {
            let inner = url
                .query_pairs()
                .find(|(k, _)| k == "uri")
                .map(|(_, v)| v.into_owned())
                .ok_or_else(|| Error::Encoding("deep link has no 'uri'".into()))?;
            return Self::parse(&inner);
        }

        let (topic, _version) = url
            .path()
            .split_once('@')
            .ok_or_else(|| Error::Encoding("session URI has no version".into()))?;
        if topic.is_empty() {
            return Err(Error::Encoding("session URI has no topic".into()));
        }
        let mut bridge = None;
        let mut key = None;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "bridge" => bridge = Some(v.into_owned()),
                "key" => key = Some(SessionKey::from_hex(&v)?),
                _ => {}
            }
        }
        Ok(Self {
            topic: topic.to_string(),
            bridge: bridge.ok_or_else(|| Error::Encoding("session URI has no bridge".into()))?,
            key: key.ok_or_else(|| Error::Encoding("session URI has no key".into()))?,
        })
    }
}

/// Fresh topic and key for a new session, drawn from the OS CSPRNG only.
///
/// A failing random source is fatal ([`Error::EntropyUnavailable`]); there is
/// no fallback generator.
pub fn generate_session_url(bridge: &str) -> Result<SessionUrl> {
    let topic = random_topic()?;
    let mut key = [0u8; 32];
    fill_secure(&mut key)?;
    let session = SessionUrl { topic, bridge: bridge.to_string(), key: SessionKey(key) };
    key.zeroize();
    Ok(session)
}

/// UUID-v4 formatted identifier from the OS random source.
pub fn random_topic() -> Result<String> {
    let mut bytes = [0u8; 16];
    fill_secure(&mut bytes)?;
    Ok(uuid::Builder::from_random_bytes(bytes).into_uuid().to_string())
}

/// Fill `buf` from the OS random source.
pub fn fill_secure(buf: &mut [u8]) -> Result<()> {
    OsRng.try_fill_bytes(buf).map_err(|e| {
        tracing::error!("secure random source unavailable: {}", e);
        Error::EntropyUnavailable(e.to_string())
    })
}

/// Random identifier from the OS random source.
pub fn secure_u64() -> Result<u64> {
    let mut bytes = [0u8; 8];
    fill_secure(&mut bytes)?;
    Ok(u64::from_be_bytes(bytes))
}
