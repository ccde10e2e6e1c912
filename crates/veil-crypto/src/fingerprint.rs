//! Client-info fingerprinting.
//!
//! The fingerprint is an 8-byte lookup key derived from a connection ID
//! and the client's key-agreement public key. It lets the server index its
//! session table without carrying full keys around. It is deterministic
//! and collision-tolerant; the signed public key, not the fingerprint, is
//! what authenticates a client.

use blake2::digest::consts::U8;
use blake2::{Blake2b, Digest};
use veil_core::frame::AGREEMENT_PK_LEN;
use veil_core::types::{Cid, Cif, ID_LEN};

type Blake2b64 = Blake2b<U8>;

/// Derive the client-info fingerprint from `CID ‖ public key`.
///
/// The 8-byte BLAKE2b digest is folded into a `u64` with each digest byte
/// XOR-ed in at bit offset `8·i`, matching the wire integer layout.
pub fn fingerprint(cid: &Cid, agreement_pk: &[u8; AGREEMENT_PK_LEN]) -> Cif {
    let mut info = [0u8; ID_LEN + AGREEMENT_PK_LEN];
    info[..ID_LEN].copy_from_slice(cid.as_bytes());
    info[ID_LEN..].copy_from_slice(agreement_pk);

    let digest = Blake2b64::digest(info);

    let mut value = 0u64;
    for (i, byte) in digest.iter().enumerate() {
        value ^= (*byte as u64) << (8 * i);
    }
    Cif::from_u64(value)
}
