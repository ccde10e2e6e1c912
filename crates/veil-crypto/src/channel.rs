//! Sealing and opening of encrypted frames.
//!
//! Applies ChaCha20-Poly1305 over the `veil-core` frame layout. The
//! header, SID, and CIF travel in the clear for routing but are bound into
//! the authentication tag as associated data, so a relay cannot re-address
//! or re-type a frame without breaking it.
//!
//! Layout and size validation happen before decryption, so garbage traffic
//! is rejected at the cost of a length comparison, not an AEAD pass.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use thiserror::Error;
use veil_core::frame::{self, FrameError, FrameView};
use veil_core::types::{Cif, Sid, ID_LEN};
use veil_core::wire;

use crate::agreement::SessionKey;

/// Sealed-channel failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The buffer does not satisfy the frame layout.
    #[error("frame: {0}")]
    Frame(#[from] FrameError),

    /// Encryption failed.
    #[error("sealing failed")]
    Seal,

    /// Authentication or decryption failed; the frame was tampered with,
    /// truncated, or sealed under a different key or addressing.
    #[error("opening failed")]
    Open,
}

/// A successfully opened frame.
#[derive(Debug, PartialEq, Eq)]
pub struct OpenedMessage {
    pub header: u8,
    pub sid: Sid,
    pub cif: Cif,
    pub plaintext: Vec<u8>,
}

fn aad_bytes(header: u8, sid: Sid, cif: Cif) -> [u8; 1 + 2 * ID_LEN] {
    let mut aad = [0u8; 1 + 2 * ID_LEN];
    aad[0] = header;
    aad[1..1 + ID_LEN].copy_from_slice(sid.as_bytes());
    aad[1 + ID_LEN..].copy_from_slice(cif.as_bytes());
    aad
}

/// Seal a payload into a full wire frame.
///
/// Draws a fresh random nonce; never reuses one under the same key.
pub fn seal_message(
    key: &SessionKey,
    header: u8,
    sid: Sid,
    cif: Cif,
    plaintext: &[u8],
) -> Result<bytes::Bytes, ChannelError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = wire::generate_nonce();
    let aad = aad_bytes(header, sid, cif);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| ChannelError::Seal)?;

    Ok(frame::encode_frame(header, &nonce, sid, cif, &ciphertext))
}

/// Validate, parse, and decrypt a received frame.
pub fn open_message(key: &SessionKey, bytes: &[u8]) -> Result<OpenedMessage, ChannelError> {
    let view = FrameView::parse(bytes)?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let aad = aad_bytes(view.header, view.sid, view.cif);

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&view.nonce),
            Payload {
                msg: view.ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| ChannelError::Open)?;

    Ok(OpenedMessage {
        header: view.header,
        sid: view.sid,
        cif: view.cif,
        plaintext,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::frame::encrypted_frame_length;

    fn test_key() -> SessionKey {
        SessionKey::from_bytes([0x42; 32])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        let sid = Sid::from_u64(10);
        let cif = Cif::from_u64(20);

        let frame = seal_message(&key, 0x10, sid, cif, b"hello veil").unwrap();
        assert_eq!(frame.len(), encrypted_frame_length(b"hello veil".len()));

        let opened = open_message(&key, &frame).unwrap();
        assert_eq!(opened.header, 0x10);
        assert_eq!(opened.sid, sid);
        assert_eq!(opened.cif, cif);
        assert_eq!(opened.plaintext, b"hello veil");
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let key = test_key();
        let frame =
            seal_message(&key, 0x10, Sid::from_u64(1), Cif::from_u64(2), b"").unwrap();
        assert_eq!(frame.len(), encrypted_frame_length(0));
        assert_eq!(open_message(&key, &frame).unwrap().plaintext, b"");
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let key = test_key();
        let frame =
            seal_message(&key, 0x10, Sid::from_u64(1), Cif::from_u64(2), b"payload").unwrap();

        let mut tampered = frame.to_vec();
        let last = tampered.len() - 1;
        tampered[last] ^= 0xff;
        assert_eq!(open_message(&key, &tampered), Err(ChannelError::Open));
    }

    #[test]
    fn test_readdressed_frame_rejected() {
        // SID/CIF are in the clear but bound as associated data; flipping
        // them must break the tag.
        let key = test_key();
        let frame =
            seal_message(&key, 0x10, Sid::from_u64(1), Cif::from_u64(2), b"payload").unwrap();

        let mut readdressed = frame.to_vec();
        readdressed[13] ^= 0x01; // first SID byte
        assert_eq!(open_message(&key, &readdressed), Err(ChannelError::Open));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let frame = seal_message(
            &test_key(),
            0x10,
            Sid::from_u64(1),
            Cif::from_u64(2),
            b"payload",
        )
        .unwrap();
        let other = SessionKey::from_bytes([0x43; 32]);
        assert_eq!(open_message(&other, &frame), Err(ChannelError::Open));
    }

    #[test]
    fn test_undersized_frame_rejected_before_decryption() {
        let key = test_key();
        assert!(matches!(
            open_message(&key, &[0u8; 10]),
            Err(ChannelError::Frame(FrameError::TooShort(10)))
        ));
    }
}
