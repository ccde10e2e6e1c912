//! Session records and the session state machine.
//!
//! A session moves `Handshaking → Established → Closed` and never back.
//! The handshake has a hard deadline; an established session stays alive
//! only as long as verified heartbeats keep arriving. Closing a session
//! wipes its key material: the state is swapped to `Closed` first and the
//! old state (owning the key) is dropped after, so under the caller's
//! lock no encryption can ever observe a half-wiped key.
//!
//! Timeout checks take `now` as a parameter; the async liveness layer
//! passes `Instant::now()` and tests pass constructed instants.

use ed25519_dalek::VerifyingKey;
use std::time::{Duration, Instant};
use thiserror::Error;
use veil_core::frame::AGREEMENT_PK_LEN;
use veil_core::types::{Cid, Cif, Sid};

use crate::agreement::SessionKey;
use crate::channel::{self, ChannelError, OpenedMessage};

/// Session lifecycle failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The handshake has not completed yet.
    #[error("session not established")]
    NotEstablished,

    /// The session already completed its handshake.
    #[error("session already established")]
    AlreadyEstablished,

    /// The session is closed; its key material is gone.
    #[error("session closed")]
    Closed,

    /// A frame carried a session ID other than this session's.
    #[error("session id mismatch: expected {expected}, got {got}")]
    SidMismatch { expected: Sid, got: Sid },

    #[error("channel: {0}")]
    Channel(#[from] ChannelError),
}

/// Observable lifecycle stage of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Established,
    Closed,
}

struct Established {
    sid: Sid,
    cif: Cif,
    peer_signing: VerifyingKey,
    peer_agreement: [u8; AGREEMENT_PK_LEN],
    key: SessionKey,
    last_heartbeat: Instant,
}

enum State {
    Handshaking { started: Instant },
    Established(Box<Established>),
    Closed,
}

/// One side's view of a single session with one peer.
///
/// Concurrent access (transport driver + liveness sweeper) must go
/// through per-record exclusive access; the record itself is plain data.
pub struct SessionRecord {
    cid: Cid,
    state: State,
}

impl SessionRecord {
    /// Open a record for a connection slot entering its handshake.
    pub fn open(cid: Cid, now: Instant) -> Self {
        Self {
            cid,
            state: State::Handshaking { started: now },
        }
    }

    pub fn cid(&self) -> Cid {
        self.cid
    }

    /// Current lifecycle stage.
    pub fn state(&self) -> SessionState {
        match self.state {
            State::Handshaking { .. } => SessionState::Handshaking,
            State::Established(_) => SessionState::Established,
            State::Closed => SessionState::Closed,
        }
    }

    pub fn is_established(&self) -> bool {
        matches!(self.state, State::Established(_))
    }

    pub fn sid(&self) -> Option<Sid> {
        match &self.state {
            State::Established(e) => Some(e.sid),
            _ => None,
        }
    }

    pub fn cif(&self) -> Option<Cif> {
        match &self.state {
            State::Established(e) => Some(e.cif),
            _ => None,
        }
    }

    /// The peer's authenticated signing key, once established.
    pub fn peer_signing(&self) -> Option<&VerifyingKey> {
        match &self.state {
            State::Established(e) => Some(&e.peer_signing),
            _ => None,
        }
    }

    /// The peer's authenticated agreement key, once established.
    pub fn peer_agreement(&self) -> Option<&[u8; AGREEMENT_PK_LEN]> {
        match &self.state {
            State::Established(e) => Some(&e.peer_agreement),
            _ => None,
        }
    }

    pub fn last_heartbeat(&self) -> Option<Instant> {
        match &self.state {
            State::Established(e) => Some(e.last_heartbeat),
            _ => None,
        }
    }

    /// Complete the handshake: record the peer's authenticated keys, the
    /// assigned session ID, and the derived session key.
    #[allow(clippy::too_many_arguments)]
    pub fn establish(
        &mut self,
        sid: Sid,
        cif: Cif,
        peer_signing: VerifyingKey,
        peer_agreement: [u8; AGREEMENT_PK_LEN],
        key: SessionKey,
        now: Instant,
    ) -> Result<(), SessionError> {
        match self.state {
            State::Handshaking { .. } => {
                self.state = State::Established(Box::new(Established {
                    sid,
                    cif,
                    peer_signing,
                    peer_agreement,
                    key,
                    last_heartbeat: now,
                }));
                Ok(())
            }
            State::Established(_) => Err(SessionError::AlreadyEstablished),
            State::Closed => Err(SessionError::Closed),
        }
    }

    /// Replace the session key. The previous key is wiped as it drops.
    pub fn rekey(&mut self, key: SessionKey) -> Result<(), SessionError> {
        match &mut self.state {
            State::Established(e) => {
                e.key = key;
                Ok(())
            }
            State::Handshaking { .. } => Err(SessionError::NotEstablished),
            State::Closed => Err(SessionError::Closed),
        }
    }

    /// Refresh the liveness timestamp after a verified heartbeat.
    pub fn observe_heartbeat(&mut self, now: Instant) -> Result<(), SessionError> {
        match &mut self.state {
            State::Established(e) => {
                e.last_heartbeat = now;
                Ok(())
            }
            State::Handshaking { .. } => Err(SessionError::NotEstablished),
            State::Closed => Err(SessionError::Closed),
        }
    }

    /// Voluntary close signalled by the peer. Takes effect immediately,
    /// regardless of how fresh the last heartbeat was.
    pub fn observe_goodbye(&mut self) {
        self.close();
    }

    /// Tear the session down and wipe its key material.
    pub fn close(&mut self) {
        // Transition first, wipe second: the key is unreachable from the
        // moment the state reads Closed.
        let previous = std::mem::replace(&mut self.state, State::Closed);
        drop(previous);
    }

    /// Apply the timeout rules at time `now`: the handshake deadline for a
    /// session still handshaking, the heartbeat timeout for an established
    /// one. Returns `true` when this call closed the session.
    pub fn check_expiry(
        &mut self,
        now: Instant,
        handshake_deadline: Duration,
        heartbeat_timeout: Duration,
    ) -> bool {
        let expired = match &self.state {
            State::Handshaking { started } => {
                now.saturating_duration_since(*started) >= handshake_deadline
            }
            State::Established(e) => {
                now.saturating_duration_since(e.last_heartbeat) >= heartbeat_timeout
            }
            State::Closed => false,
        };
        if expired {
            self.close();
        }
        expired
    }

    /// Seal an application payload for this session.
    pub fn seal(&self, header: u8, plaintext: &[u8]) -> Result<bytes::Bytes, SessionError> {
        match &self.state {
            State::Established(e) => {
                Ok(channel::seal_message(&e.key, header, e.sid, e.cif, plaintext)?)
            }
            State::Handshaking { .. } => Err(SessionError::NotEstablished),
            State::Closed => Err(SessionError::Closed),
        }
    }

    /// Open a received frame for this session, enforcing the session ID.
    pub fn open(&self, bytes: &[u8]) -> Result<OpenedMessage, SessionError> {
        match &self.state {
            State::Established(e) => {
                let opened = channel::open_message(&e.key, bytes)?;
                if opened.sid != e.sid {
                    return Err(SessionError::SidMismatch {
                        expected: e.sid,
                        got: opened.sid,
                    });
                }
                Ok(opened)
            }
            State::Handshaking { .. } => Err(SessionError::NotEstablished),
            State::Closed => Err(SessionError::Closed),
        }
    }
}
