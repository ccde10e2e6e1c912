//! Fixed-width protocol identifiers.
//!
//! Three 8-byte values flow through every Veil exchange and must never be
//! mixed up with one another:
//!
//! - [`Cid`]: connection ID, assigned by the server when a connection slot
//!   is opened. May outlive several sessions.
//! - [`Sid`]: session ID, assigned when a handshake completes. Dies with
//!   the session.
//! - [`Cif`]: client info fingerprint, derived from the CID and the
//!   client's public key. Used as a table key, never as an authentication
//!   boundary.
//!
//! Each is a distinct newtype over `[u8; 8]` so the compiler rejects
//! accidental cross-use. All three compare byte-wise and hash cheaply.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width in bytes of [`Cid`], [`Sid`], and [`Cif`].
pub const ID_LEN: usize = 8;

macro_rules! wire_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name([u8; ID_LEN]);

        impl $name {
            /// Wrap raw identifier bytes.
            pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
                Self(bytes)
            }

            /// Build from the little-endian integer form.
            pub const fn from_u64(value: u64) -> Self {
                Self(value.to_le_bytes())
            }

            /// Borrow the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; ID_LEN] {
                &self.0
            }

            /// Little-endian integer form, convenient as a map key.
            pub const fn to_u64(&self) -> u64 {
                u64::from_le_bytes(self.0)
            }

            /// Parse from a wire slice of exactly [`ID_LEN`] bytes.
            pub fn from_slice(slice: &[u8]) -> Option<Self> {
                let bytes: [u8; ID_LEN] = slice.try_into().ok()?;
                Some(Self(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }
    };
}

wire_id! {
    /// Client connection ID: identifies a connection slot on the server.
    Cid
}

wire_id! {
    /// Session ID: identifies one live encrypted session.
    Sid
}

wire_id! {
    /// Client info fingerprint: lookup key derived from CID + public key.
    Cif
}

impl Cid {
    /// Assign a fresh random connection ID from the OS CSPRNG.
    pub fn assign() -> Self {
        let mut bytes = [0u8; ID_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl Sid {
    /// Assign a fresh random session ID from the OS CSPRNG.
    pub fn assign() -> Self {
        let mut bytes = [0u8; ID_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}
