//! Low-level wire primitives: integer codecs, NUL splitting, nonces.

use crate::frame::NONCE_LEN;
use bytes::Bytes;
use rand::rngs::OsRng;
use rand::RngCore;

/// Encode a `u64` as 8 little-endian bytes.
///
/// Exact inverse of [`bytes_to_u64`] for every value.
pub const fn u64_to_bytes(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

/// Decode 8 little-endian bytes back into a `u64`.
pub const fn bytes_to_u64(bytes: [u8; 8]) -> u64 {
    u64::from_le_bytes(bytes)
}

/// Split a buffer into segments on NUL delimiters.
///
/// At most `max_items + 1` segments are produced; once the cap is reached
/// the rest of the buffer is not scanned, so a hostile peer cannot force
/// unbounded allocation by stuffing delimiters. A buffer without a final
/// NUL still yields its non-empty tail as the last segment, while a single
/// trailing NUL yields no empty segment. Segments are byte-exact copies of
/// the input between delimiters, with no encoding assumption.
pub fn split_by_null(data: &[u8], max_items: usize) -> Vec<Bytes> {
    let mut segments = Vec::new();
    let mut rest = data;
    while !rest.is_empty() && segments.len() <= max_items {
        match rest.iter().position(|&b| b == 0x00) {
            Some(idx) => {
                segments.push(Bytes::copy_from_slice(&rest[..idx]));
                rest = &rest[idx + 1..];
            }
            None => {
                segments.push(Bytes::copy_from_slice(rest));
                break;
            }
        }
    }
    segments
}

/// Fill a fresh frame nonce from the OS CSPRNG.
///
/// Called exactly once per sealed frame; reusing a nonce under the same
/// key voids the AEAD guarantees.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}
