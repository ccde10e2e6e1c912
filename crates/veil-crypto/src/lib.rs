//! Cryptographic trust core for Veil.
//!
//! This crate provides:
//! - Ed25519/X25519 local identity with an explicit activation state
//! - Client-info fingerprinting for session table lookup
//! - X25519 + HKDF session-key agreement
//! - AEAD-sealed application frames over the `veil-core` layout
//! - Credential format checks and Argon2id password hashing
//! - Session records and heartbeat-based liveness tracking
//!
//! # Design
//!
//! Authentication anchors on the signed key-agreement public key: each side
//! signs its X25519 public key under its long-term Ed25519 key and verifies
//! the peer's blob before deriving the shared session key. The fingerprint
//! is only ever a lookup key. Heartbeats re-prove possession of the signing
//! key for as long as a session lives.
//!
//! All secret material (signing/agreement secrets, session keys, password
//! plaintext) is zeroized when its owner is dropped.

#![forbid(unsafe_code)]

pub mod agreement;
pub mod channel;
pub mod credential;
pub mod fingerprint;
pub mod identity;
pub mod liveness;
pub mod session;

pub use agreement::{derive_shared_key, SessionKey};
pub use channel::{open_message, seal_message, OpenedMessage};
pub use fingerprint::fingerprint;
pub use identity::{verify_signed_public_key, IdentityError, LocalIdentity, PeerId};
pub use liveness::{HeartbeatPath, LivenessConfig, SessionTable};
pub use session::{SessionError, SessionRecord, SessionState};
