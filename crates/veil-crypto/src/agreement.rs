//! Session-key agreement.
//!
//! Each session's AEAD key comes from an X25519 Diffie-Hellman exchange
//! between the local agreement secret and the peer's authenticated
//! agreement public key, followed by an HKDF-SHA256 expansion under a
//! protocol-domain info string. Both sides derive the same 32-byte key.
//!
//! The peer's public key MUST have been authenticated via
//! [`crate::identity::verify_signed_public_key`] before it reaches this
//! module; deriving from an unverified key hands the session to whoever
//! supplied it.

use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use veil_core::frame::AGREEMENT_PK_LEN;
use x25519_dalek::PublicKey;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::identity::{IdentityError, LocalIdentity};

/// Width of the derived symmetric key.
pub const SESSION_KEY_LEN: usize = 32;

/// Domain-separation string for the session-key expansion.
const HKDF_INFO: &[u8] = b"veil v1 session key";

/// Key-agreement failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgreementError {
    #[error("identity: {0}")]
    Identity(#[from] IdentityError),

    /// Peer key had the wrong length.
    #[error("malformed peer key: expected {AGREEMENT_PK_LEN} bytes, got {0}")]
    MalformedPeerKey(usize),

    /// The exchange produced an all-zero shared secret (degenerate peer
    /// point); such a key would be attacker-chosen.
    #[error("degenerate shared secret")]
    DegenerateSecret,
}

/// 32-byte symmetric session key, wiped when dropped.
///
/// No `Clone` or `Debug`: the key lives in exactly one session record per
/// side and never appears in logs.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    /// Borrow the raw key material for the AEAD cipher.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(bytes: [u8; SESSION_KEY_LEN]) -> Self {
        Self(bytes)
    }
}

/// Derive the shared session key from the local identity and the peer's
/// authenticated agreement public key.
///
/// Fails on an inactive identity, a wrong-length peer key, or a
/// degenerate exchange. The intermediate shared secret is wiped when the
/// derivation finishes.
pub fn derive_shared_key(
    identity: &LocalIdentity,
    peer_agreement_pk: &[u8],
) -> Result<SessionKey, AgreementError> {
    let peer_bytes: [u8; AGREEMENT_PK_LEN] = peer_agreement_pk
        .try_into()
        .map_err(|_| AgreementError::MalformedPeerKey(peer_agreement_pk.len()))?;

    let secret = identity.agreement_secret()?;
    let shared = secret.diffie_hellman(&PublicKey::from(peer_bytes));
    if !shared.was_contributory() {
        return Err(AgreementError::DegenerateSecret);
    }

    let hkdf = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut key = [0u8; SESSION_KEY_LEN];
    hkdf.expand(HKDF_INFO, &mut key)
        .expect("session key length is a valid HKDF output length");

    Ok(SessionKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_sides_derive_the_same_key() {
        let alice = LocalIdentity::generate();
        let bob = LocalIdentity::generate();

        let alice_key =
            derive_shared_key(&alice, &bob.agreement_public().unwrap()).unwrap();
        let bob_key =
            derive_shared_key(&bob, &alice.agreement_public().unwrap()).unwrap();

        assert_eq!(alice_key.as_bytes(), bob_key.as_bytes());
    }

    #[test]
    fn test_different_peers_derive_different_keys() {
        let alice = LocalIdentity::generate();
        let bob = LocalIdentity::generate();
        let carol = LocalIdentity::generate();

        let with_bob = derive_shared_key(&alice, &bob.agreement_public().unwrap()).unwrap();
        let with_carol =
            derive_shared_key(&alice, &carol.agreement_public().unwrap()).unwrap();

        assert_ne!(with_bob.as_bytes(), with_carol.as_bytes());
    }

    #[test]
    fn test_malformed_peer_key_rejected() {
        let alice = LocalIdentity::generate();
        assert!(matches!(
            derive_shared_key(&alice, &[0u8; 31]),
            Err(AgreementError::MalformedPeerKey(31))
        ));
    }

    #[test]
    fn test_degenerate_peer_key_rejected() {
        let alice = LocalIdentity::generate();
        assert!(matches!(
            derive_shared_key(&alice, &[0u8; AGREEMENT_PK_LEN]),
            Err(AgreementError::DegenerateSecret)
        ));
    }

    #[test]
    fn test_inactive_identity_rejected() {
        let inactive = LocalIdentity::inactive();
        let peer = LocalIdentity::generate();
        assert!(matches!(
            derive_shared_key(&inactive, &peer.agreement_public().unwrap()),
            Err(AgreementError::Identity(IdentityError::Inactive))
        ));
    }
}
