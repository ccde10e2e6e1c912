//! Encrypted frame layout.
//!
//! Every sealed application message on the wire has the shape:
//!
//! ```text
//! [header (1B)][nonce (12B)][SID (8B)][CIF (8B)][ciphertext][tag (16B)]
//! ```
//!
//! This module is a pure layout contract: it computes and validates sizes
//! and offsets, and never loops over payload data or touches a key. The
//! transport driver uses it to size buffers and to reject malformed input
//! cheaply, before any decryption is attempted. Sealing and opening live in
//! `veil-crypto`.

use crate::status::STATUS_BODY_LEN;
use crate::types::{Cid, Cif, Sid, ID_LEN};
use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Width of the frame header byte.
pub const HEADER_LEN: usize = 1;

/// Width of the AEAD nonce carried in each frame.
pub const NONCE_LEN: usize = 12;

/// Width of the AEAD authentication tag.
pub const TAG_LEN: usize = 16;

/// Width of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Width of an X25519 key-agreement public key.
pub const AGREEMENT_PK_LEN: usize = 32;

/// Fixed overhead of a sealed frame: everything except the payload.
pub const ENCRYPTED_OVERHEAD: usize = HEADER_LEN + NONCE_LEN + ID_LEN + ID_LEN + TAG_LEN;

/// Smallest datagram a server will consider: `header | CID | agreement pk`.
pub const SERVER_RECV_MIN: usize = HEADER_LEN + ID_LEN + AGREEMENT_PK_LEN;

/// Smallest datagram a client will consider: `header | status body`.
pub const CLIENT_RECV_MIN: usize = HEADER_LEN + STATUS_BODY_LEN;

/// Header byte of heartbeat and goodbye frames.
pub const HEARTBEAT_HEADER: u8 = 0x1F;

/// Size of a heartbeat frame: `header | signature-over-CIF | CIF`.
pub const HEARTBEAT_LEN: usize = HEADER_LEN + SIGNATURE_LEN + ID_LEN;

/// A goodbye frame is a heartbeat with one extra marker byte appended.
pub const GOODBYE_LEN: usize = HEARTBEAT_LEN + 1;

/// The goodbye marker byte.
pub const GOODBYE_MARKER: u8 = b'!';

/// Layout violations detected before decryption.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Frame shorter than the fixed sealed-frame overhead.
    #[error("frame too short: {0} bytes, need at least {ENCRYPTED_OVERHEAD}")]
    TooShort(usize),

    /// Datagram below the direction-specific receive minimum.
    #[error("undersized datagram: {got} bytes, minimum {min}")]
    Undersized { got: usize, min: usize },
}

/// Total sealed-frame length for a payload of `payload_len` bytes.
pub const fn encrypted_frame_length(payload_len: usize) -> usize {
    ENCRYPTED_OVERHEAD + payload_len
}

/// Recover the payload length from an observed frame length.
///
/// Rejects any length that does not satisfy
/// `len == encrypted_frame_length(n)` for some `n >= 0`.
pub fn payload_length(frame_len: usize) -> Result<usize, FrameError> {
    frame_len
        .checked_sub(ENCRYPTED_OVERHEAD)
        .ok_or(FrameError::TooShort(frame_len))
}

/// Reject a datagram below the server-side receive minimum.
pub fn check_server_recv(len: usize) -> Result<(), FrameError> {
    if len < SERVER_RECV_MIN {
        return Err(FrameError::Undersized {
            got: len,
            min: SERVER_RECV_MIN,
        });
    }
    Ok(())
}

/// Reject a datagram below the client-side receive minimum.
pub fn check_client_recv(len: usize) -> Result<(), FrameError> {
    if len < CLIENT_RECV_MIN {
        return Err(FrameError::Undersized {
            got: len,
            min: CLIENT_RECV_MIN,
        });
    }
    Ok(())
}

/// Borrowed view of a sealed frame, split at the layout offsets.
///
/// `ciphertext` covers the encrypted payload together with its trailing
/// authentication tag, which is how the AEAD cipher consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    pub header: u8,
    pub nonce: [u8; NONCE_LEN],
    pub sid: Sid,
    pub cif: Cif,
    pub ciphertext: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Split a byte buffer at the frame offsets, validating the length first.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, FrameError> {
        payload_length(bytes.len())?;

        let mut at = HEADER_LEN;
        let header = bytes[0];
        let nonce: [u8; NONCE_LEN] = bytes[at..at + NONCE_LEN].try_into().unwrap();
        at += NONCE_LEN;
        let sid = Sid::from_bytes(bytes[at..at + ID_LEN].try_into().unwrap());
        at += ID_LEN;
        let cif = Cif::from_bytes(bytes[at..at + ID_LEN].try_into().unwrap());
        at += ID_LEN;

        Ok(Self {
            header,
            nonce,
            sid,
            cif,
            ciphertext: &bytes[at..],
        })
    }
}

/// Assemble a sealed frame from its parts.
///
/// `ciphertext` must already carry the trailing authentication tag.
pub fn encode_frame(
    header: u8,
    nonce: &[u8; NONCE_LEN],
    sid: Sid,
    cif: Cif,
    ciphertext: &[u8],
) -> Bytes {
    let mut buf = BytesMut::with_capacity(ENCRYPTED_OVERHEAD - TAG_LEN + ciphertext.len());
    buf.put_u8(header);
    buf.put_slice(nonce);
    buf.put_slice(sid.as_bytes());
    buf.put_slice(cif.as_bytes());
    buf.put_slice(ciphertext);
    buf.freeze()
}

/// First handshake datagram layout helper: `header | CID | agreement pk`.
///
/// The handshake driver owns the message sequencing; this only fixes the
/// byte layout the server's minimum-size check assumes.
pub fn encode_hello(header: u8, cid: Cid, agreement_pk: &[u8; AGREEMENT_PK_LEN]) -> Bytes {
    let mut buf = BytesMut::with_capacity(SERVER_RECV_MIN);
    buf.put_u8(header);
    buf.put_slice(cid.as_bytes());
    buf.put_slice(agreement_pk);
    buf.freeze()
}
