//! Error types for the MTP client stack.

use crate::codes::ResponseCode;
use crate::ids::TransactionId;
use thiserror::Error;

/// Primary error type for all MTP operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Any non-OK response from the device; preserves the 16-bit code.
    #[error("device responded {code:?} ({hex:#06x})", code = .0, hex = .0.to_u16())]
    Mtp(ResponseCode),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    /// Operation or property not advertised by the device.
    #[error("not supported by device: {0}")]
    NotSupported(&'static str),

    /// Path resolution reached a missing child.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// USB-level failures.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("USB I/O failed: {0}")]
    Usb(String),

    #[error("transfer timed out")]
    Timeout,

    #[error("short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },

    #[error("endpoint {endpoint:#04x} stalled")]
    Stall { endpoint: u8 },

    #[error("no MTP interface found on device")]
    NoMtpInterface,

    #[error("no matching device")]
    DeviceNotFound,

    #[error("device disconnected")]
    Disconnected,
}

/// Wire-format and phase-discipline violations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    #[error("unexpected {got:?} container during {phase} phase")]
    UnexpectedPhase { got: crate::codes::ContainerType, phase: &'static str },

    #[error("transaction id mismatch: expected {expected}, got {got}")]
    TransactionMismatch { expected: TransactionId, got: TransactionId },

    #[error("malformed dataset: {0}")]
    MalformedDataset(String),

    /// A previous transport or protocol error invalidated the session; only
    /// `reset()` clears this state.
    #[error("session invalidated by an earlier error")]
    SessionInvalidated,

    #[error("string too long for wire encoding: {0} code units")]
    StringTooLong(usize),
}

/// Cryptographic operation errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("RSA input out of range")]
    ValueOutOfRange,

    #[error("plaintext too long: {len} bytes exceeds the {max}-byte block")]
    PlaintextTooLong { len: usize, max: usize },

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("MAC verification failed")]
    MacMismatch,
}

/// Trusted-application (MTPZ) failures.
#[derive(Error, Debug)]
pub enum AuthenticationError {
    /// Key bundle missing or unparseable; vendor operations are refused
    /// locally without touching the device.
    #[error("MTPZ key bundle not loaded")]
    AuthenticationRequired,

    #[error("malformed key bundle: {0}")]
    MalformedKeys(String),

    #[error("device rejected the host certificate")]
    CertificateRejected,

    #[error("device certificate chain malformed: {0}")]
    MalformedCertificate(String),

    #[error("challenge/response rejected by device")]
    ChallengeRejected,
}

impl Error {
    /// True for response codes that a bounded retry may clear.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Mtp(ResponseCode::DeviceBusy) | Error::Mtp(ResponseCode::SessionAlreadyOpen)
        )
    }

    /// True when the session must be reset before further use.
    pub fn invalidates_session(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Protocol(_))
    }
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mtp_error_includes_hex_code() {
        let err = Error::Mtp(ResponseCode::AccessDenied);
        let msg = err.to_string();
        assert!(msg.contains("0x200f"), "message was: {msg}");
        assert!(msg.contains("AccessDenied"));
    }

    #[test]
    fn retryable_codes() {
        assert!(Error::Mtp(ResponseCode::DeviceBusy).is_retryable());
        assert!(Error::Mtp(ResponseCode::SessionAlreadyOpen).is_retryable());
        assert!(!Error::Mtp(ResponseCode::AccessDenied).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn transport_and_protocol_invalidate_session() {
        assert!(Error::Transport(TransportError::Timeout).invalidates_session());
        let err = Error::Protocol(ProtocolError::MalformedContainer("truncated".into()));
        assert!(err.invalidates_session());
        assert!(!Error::Mtp(ResponseCode::DeviceBusy).invalidates_session());
    }

    #[test]
    fn error_source_chain() {
        use std::error::Error as StdError;

        let err = Error::Transport(TransportError::Timeout);
        assert!(err.source().is_some());

        let err: Error = AuthenticationError::AuthenticationRequired.into();
        assert!(matches!(err, Error::Authentication(_)));
    }
}
