//! Local identity keys and peer identity handling.
//!
//! Each party holds one Ed25519 signing keypair and one X25519
//! key-agreement keypair. The signing key authenticates the agreement key:
//! [`LocalIdentity::sign_public_key`] produces the `signature ‖ public_key`
//! blob exchanged during the handshake, and
//! [`verify_signed_public_key`] checks the peer's blob before any key
//! derivation happens.
//!
//! Key material arrives from outside this crate (generated fresh, or loaded
//! by the key-storage layer), so an identity is explicitly `Active` or
//! `Inactive`. Every operation that needs secret material fails cleanly on
//! an inactive identity instead of panicking or signing with garbage.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use veil_core::frame::{AGREEMENT_PK_LEN, SIGNATURE_LEN};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// Size of the signed public-key blob: `signature ‖ agreement public key`.
pub const SIGNED_PK_LEN: usize = SIGNATURE_LEN + AGREEMENT_PK_LEN;

/// Identity and signature failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Secret material has not been loaded; the caller must activate the
    /// identity before retrying.
    #[error("identity is not activated")]
    Inactive,

    /// A key or blob had the wrong length.
    #[error("malformed key material: expected {expected} bytes, got {got}")]
    Malformed { expected: usize, got: usize },

    /// Signature verification failed.
    #[error("signature verification failed")]
    BadSignature,
}

struct ActiveKeys {
    signing: SigningKey,
    agreement: StaticSecret,
}

enum IdentityState {
    Active(Box<ActiveKeys>),
    Inactive,
}

/// The local party's long-term identity.
///
/// Passed explicitly into every operation that signs or agrees on keys;
/// there is no ambient global identity. Secret keys are zeroized on drop
/// by their respective dalek types.
pub struct LocalIdentity {
    state: IdentityState,
}

impl LocalIdentity {
    /// Generate a fresh, activated identity from the OS CSPRNG.
    pub fn generate() -> Self {
        let keys = ActiveKeys {
            signing: SigningKey::generate(&mut OsRng),
            agreement: StaticSecret::random_from_rng(OsRng),
        };
        Self {
            state: IdentityState::Active(Box::new(keys)),
        }
    }

    /// An identity with no secret material loaded yet.
    pub fn inactive() -> Self {
        Self {
            state: IdentityState::Inactive,
        }
    }

    /// Load secret material supplied by the key-storage layer.
    ///
    /// The input arrays are wiped before this returns.
    pub fn activate(&mut self, mut signing_sk: [u8; 32], mut agreement_sk: [u8; 32]) {
        let keys = ActiveKeys {
            signing: SigningKey::from_bytes(&signing_sk),
            agreement: StaticSecret::from(agreement_sk),
        };
        signing_sk.zeroize();
        agreement_sk.zeroize();
        self.state = IdentityState::Active(Box::new(keys));
    }

    /// Whether secret material is loaded.
    pub fn is_activated(&self) -> bool {
        matches!(self.state, IdentityState::Active(_))
    }

    fn keys(&self) -> Result<&ActiveKeys, IdentityError> {
        match &self.state {
            IdentityState::Active(keys) => Ok(keys),
            IdentityState::Inactive => Err(IdentityError::Inactive),
        }
    }

    /// The Ed25519 verifying key.
    pub fn signing_public(&self) -> Result<VerifyingKey, IdentityError> {
        Ok(self.keys()?.signing.verifying_key())
    }

    /// The X25519 key-agreement public key.
    pub fn agreement_public(&self) -> Result<[u8; AGREEMENT_PK_LEN], IdentityError> {
        let keys = self.keys()?;
        Ok(*PublicKey::from(&keys.agreement).as_bytes())
    }

    pub(crate) fn agreement_secret(&self) -> Result<&StaticSecret, IdentityError> {
        Ok(&self.keys()?.agreement)
    }

    /// Sign an arbitrary message under the identity's signing key.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; SIGNATURE_LEN], IdentityError> {
        Ok(self.keys()?.signing.sign(message).to_bytes())
    }

    /// Produce the signed key-agreement blob: `signature ‖ public_key`.
    ///
    /// The signature covers the agreement public key and anchors it to
    /// this identity's signing key. Fails on an inactive identity.
    pub fn sign_public_key(&self) -> Result<[u8; SIGNED_PK_LEN], IdentityError> {
        let agreement_pk = self.agreement_public()?;
        let signature = self.sign(&agreement_pk)?;

        let mut blob = [0u8; SIGNED_PK_LEN];
        blob[..SIGNATURE_LEN].copy_from_slice(&signature);
        blob[SIGNATURE_LEN..].copy_from_slice(&agreement_pk);
        Ok(blob)
    }

    /// The printable identity string for this party's signing key.
    pub fn peer_id(&self) -> Result<PeerId, IdentityError> {
        Ok(PeerId::from_bytes(self.signing_public()?.as_bytes()))
    }
}

/// Check a peer's signed key-agreement blob against its known signing key.
///
/// Returns the authenticated X25519 public key on success. Rejects blobs
/// of the wrong length and signatures that do not verify; the agreement
/// key must never be used unless this succeeds.
pub fn verify_signed_public_key(
    blob: &[u8],
    signer: &VerifyingKey,
) -> Result<[u8; AGREEMENT_PK_LEN], IdentityError> {
    if blob.len() != SIGNED_PK_LEN {
        return Err(IdentityError::Malformed {
            expected: SIGNED_PK_LEN,
            got: blob.len(),
        });
    }

    let signature =
        Signature::from_slice(&blob[..SIGNATURE_LEN]).map_err(|_| IdentityError::BadSignature)?;
    let agreement_pk = &blob[SIGNATURE_LEN..];
    signer
        .verify(agreement_pk, &signature)
        .map_err(|_| IdentityError::BadSignature)?;

    Ok(agreement_pk.try_into().unwrap())
}

/// Printable peer identity: the base64url-encoded Ed25519 public key
/// (32 bytes → 43 characters, no padding).
///
/// This is how peers are named in logs, contact lists, and configuration.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Encode a raw signing public key.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Parse a peer identity from its string form.
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .context("invalid base64url encoding")?;
        if bytes.len() != 32 {
            anyhow::bail!("invalid peer id length: expected 32 bytes, got {}", bytes.len());
        }
        Ok(Self(s.to_string()))
    }

    /// Recover the raw signing public key bytes.
    pub fn to_bytes(&self) -> Result<[u8; 32]> {
        let bytes = URL_SAFE_NO_PAD
            .decode(&self.0)
            .context("invalid base64url encoding")?;
        bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("invalid peer id length"))
    }

    /// Recover the verifying key for signature checks.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        let bytes = self.to_bytes()?;
        VerifyingKey::from_bytes(&bytes).context("invalid public key")
    }

    /// The string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}
