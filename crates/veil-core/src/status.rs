//! Wire status codes.
//!
//! Both ends report failures with fixed byte sequences so a human or a
//! log-scraper can classify traffic without decrypting anything. Server
//! codes are a 1-byte header followed by a fixed 6-byte mnemonic body;
//! client codes are the bare 6-byte mnemonic.

use thiserror::Error;

/// Width of the fixed mnemonic body.
pub const STATUS_BODY_LEN: usize = 6;

/// Malformed or unknown status bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("status too short: {0} bytes")]
    TooShort(usize),

    #[error("unknown status header: {0:#04x}")]
    UnknownHeader(u8),

    #[error("status body does not match header")]
    BodyMismatch,

    #[error("unknown status body")]
    UnknownBody,
}

/// Server-originated status codes: header byte plus mnemonic body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// Generic failure.
    Failed,
    /// Key-negotiation failure.
    KeyError,
    /// Message-decoding failure.
    MessageError,
    /// Session-id mismatch.
    SidMismatch,
}

impl ServerStatus {
    /// The 1-byte wire header.
    pub const fn header(self) -> u8 {
        match self {
            Self::Failed => 0xFF,
            Self::KeyError => 0xEF,
            Self::MessageError => 0xDF,
            Self::SidMismatch => 0xCF,
        }
    }

    /// The fixed 6-byte mnemonic body.
    pub const fn body(self) -> &'static [u8; STATUS_BODY_LEN] {
        match self {
            Self::Failed => b"FAILED",
            Self::KeyError => b"KEYERR",
            Self::MessageError => b"MSGERR",
            Self::SidMismatch => b"SIDERR",
        }
    }

    /// Full wire form: `header | body`.
    pub fn as_bytes(self) -> [u8; 1 + STATUS_BODY_LEN] {
        let mut out = [0u8; 1 + STATUS_BODY_LEN];
        out[0] = self.header();
        out[1..].copy_from_slice(self.body());
        out
    }

    /// Parse a server status from the start of a received buffer.
    ///
    /// The body must match the header's mnemonic exactly; a known header
    /// with a mangled body is rejected rather than trusted.
    pub fn parse(bytes: &[u8]) -> Result<Self, StatusError> {
        if bytes.len() < 1 + STATUS_BODY_LEN {
            return Err(StatusError::TooShort(bytes.len()));
        }
        let status = match bytes[0] {
            0xFF => Self::Failed,
            0xEF => Self::KeyError,
            0xDF => Self::MessageError,
            0xCF => Self::SidMismatch,
            other => return Err(StatusError::UnknownHeader(other)),
        };
        if &bytes[1..1 + STATUS_BODY_LEN] != status.body() {
            return Err(StatusError::BodyMismatch);
        }
        Ok(status)
    }
}

/// Client-originated status codes: mnemonic body only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// Peer went silent past the deadline.
    Timeout,
    /// Key-negotiation failure.
    KeyError,
    /// Message-decoding failure.
    MessageError,
}

impl ClientStatus {
    /// The fixed 6-byte wire form.
    pub const fn as_bytes(self) -> &'static [u8; STATUS_BODY_LEN] {
        match self {
            Self::Timeout => b"TIMOUT",
            Self::KeyError => b"KEYERR",
            Self::MessageError => b"MSGERR",
        }
    }

    /// Parse a client status from the start of a received buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self, StatusError> {
        if bytes.len() < STATUS_BODY_LEN {
            return Err(StatusError::TooShort(bytes.len()));
        }
        match &bytes[..STATUS_BODY_LEN] {
            b"TIMOUT" => Ok(Self::Timeout),
            b"KEYERR" => Ok(Self::KeyError),
            b"MSGERR" => Ok(Self::MessageError),
            _ => Err(StatusError::UnknownBody),
        }
    }
}
