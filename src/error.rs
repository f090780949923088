//! Error taxonomy for wallet sessions and signing.
//!
//! Every error is surfaced to the caller; nothing in this crate retries.
//! [`Error::EntropyUnavailable`] is the only fatal condition.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The relay handshake failed or was rejected by the wallet.
    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("A connection attempt is already in progress")]
    AlreadyConnecting,

    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Connected wallet reported no address")]
    NoAddress,

    /// Only UTF-8 text can be sent for personal-sign.
    #[error("Message is not valid UTF-8 text")]
    InvalidMessage,

    #[error("Wallet returned no signature")]
    NoSignature,

    #[error("Invalid signature length: expected {expected} bytes, got {got}")]
    InvalidSignatureLength { expected: usize, got: usize },

    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Error reported by the wallet or relay, passed through unchanged.
    #[error("{0}")]
    Wallet(String),

    #[error("Relay error: {0}")]
    Relay(String),

    #[error("Timed out waiting for the wallet")]
    Timeout,

    /// The OS random source could not be read. Never downgraded to a weaker RNG.
    #[error("Secure random source unavailable: {0}")]
    EntropyUnavailable(String),
}

impl Error {
    /// True for conditions the process should not try to recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::EntropyUnavailable(_))
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Encoding(e.to_string())
    }
}
