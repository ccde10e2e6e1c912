//! Core Veil protocol types, wire primitives, framing, and status codes.
//!
//! This crate provides:
//! - Fixed-width connection, session, and fingerprint identifiers
//! - Integer codecs, NUL-delimited buffer splitting, and nonce generation
//! - The encrypted frame layout contract (a pure size/offset calculation)
//! - Wire status codes shared by both ends of a connection
//! - Small address/port validators used at connect time
//!
//! Everything here is transport-agnostic: the crate never touches a socket
//! and never performs a cryptographic operation. The cryptographic layer
//! lives in `veil-crypto` and builds on the layout contract defined here.

#![forbid(unsafe_code)]

pub mod frame;
pub mod net;
pub mod status;
pub mod types;
pub mod wire;

pub use frame::{encrypted_frame_length, payload_length, FrameError, FrameView};
pub use status::{ClientStatus, ServerStatus};
pub use types::{Cid, Cif, Sid};

use std::time::Duration;

/// Hard deadline for completing the handshake frame exchange.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Interval between heartbeat frames on an established session.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(120);

/// A session with no heartbeat for this long is considered dead.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(180);

/// How often the liveness monitor sweeps the session table.
pub const LIVENESS_POLL_INTERVAL: Duration = Duration::from_millis(500);
