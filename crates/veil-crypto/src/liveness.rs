//! Heartbeat liveness: frames, session table, monitor, emitter.
//!
//! Once a session is established, each side proves it is still alive by
//! periodically sending a heartbeat: a frame whose body is a signature
//! over the session's client-info fingerprint. The receiver verifies the
//! signature against the peer's known signing key and refreshes the
//! session's liveness timestamp. A goodbye is the same frame with one
//! marker byte appended, closing the session immediately instead of
//! waiting for the timeout.
//!
//! Heartbeats travel on one of two paths, chosen per deployment by
//! [`LivenessConfig`]: as bare control frames ([`HeartbeatPath::Control`])
//! or sealed inside the encrypted channel ([`HeartbeatPath::Sealed`]).
//! The signed content is identical on both paths.
//!
//! Concurrency: the table holds one `Mutex` per session record; the table
//! lock itself only guards map membership, so unrelated sessions never
//! contend. The monitor sweeps every 500 ms; each established session
//! runs its own emitter task.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use veil_core::frame::{
    FrameError, FrameView, GOODBYE_LEN, GOODBYE_MARKER, HEARTBEAT_HEADER, HEARTBEAT_LEN,
    SIGNATURE_LEN,
};
use veil_core::types::{Cif, ID_LEN};
use veil_core::{HANDSHAKE_TIMEOUT, HEARTBEAT_INTERVAL, HEARTBEAT_TIMEOUT, LIVENESS_POLL_INTERVAL};

use crate::identity::{IdentityError, LocalIdentity};
use crate::session::{SessionError, SessionRecord};

/// Liveness-frame and table failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LivenessError {
    /// Neither the heartbeat nor the goodbye length.
    #[error("bad liveness frame length: {0}")]
    BadLength(usize),

    /// Wrong header byte for a liveness frame.
    #[error("bad liveness header: {0:#04x}")]
    BadHeader(u8),

    /// Goodbye-sized frame without the goodbye marker.
    #[error("bad goodbye marker: {0:#04x}")]
    BadMarker(u8),

    /// Signature did not verify against the peer's signing key. The frame
    /// is discarded; the session is unaffected.
    #[error("liveness signature verification failed")]
    BadSignature,

    /// No session under that fingerprint.
    #[error("unknown session: {0}")]
    UnknownSession(Cif),

    #[error("frame: {0}")]
    Frame(#[from] FrameError),

    #[error("identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("session: {0}")]
    Session(#[from] SessionError),
}

/// What a liveness frame announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Heartbeat,
    Goodbye,
}

/// A parsed (not yet verified) liveness frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedSignal {
    pub signal: Signal,
    pub signature: [u8; SIGNATURE_LEN],
    pub cif: Cif,
}

/// How liveness frames travel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeartbeatPath {
    /// Bare control frames next to the encrypted channel.
    #[default]
    Control,
    /// Sealed inside the encrypted channel like application traffic.
    Sealed,
}

/// Deployment-chosen liveness parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessConfig {
    pub path: HeartbeatPath,
    /// Gap between outgoing heartbeats.
    pub interval: Duration,
    /// Silence after which a peer is declared dead.
    pub timeout: Duration,
    /// Sweep cadence of the monitor.
    pub poll: Duration,
    /// Deadline for completing a handshake.
    pub handshake_deadline: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            path: HeartbeatPath::default(),
            interval: HEARTBEAT_INTERVAL,
            timeout: HEARTBEAT_TIMEOUT,
            poll: LIVENESS_POLL_INTERVAL,
            handshake_deadline: HANDSHAKE_TIMEOUT,
        }
    }
}

/// Build a heartbeat frame: `header ‖ signature-over-CIF ‖ CIF`.
pub fn build_heartbeat(identity: &LocalIdentity, cif: Cif) -> Result<Vec<u8>, LivenessError> {
    let signature = identity.sign(cif.as_bytes())?;
    let mut frame = Vec::with_capacity(HEARTBEAT_LEN);
    frame.push(HEARTBEAT_HEADER);
    frame.extend_from_slice(&signature);
    frame.extend_from_slice(cif.as_bytes());
    Ok(frame)
}

/// Build a goodbye frame: a heartbeat with the marker byte appended.
pub fn build_goodbye(identity: &LocalIdentity, cif: Cif) -> Result<Vec<u8>, LivenessError> {
    let mut frame = build_heartbeat(identity, cif)?;
    frame.push(GOODBYE_MARKER);
    Ok(frame)
}

/// Parse a liveness frame by exact size, without verifying the signature.
pub fn parse_signal(bytes: &[u8]) -> Result<ParsedSignal, LivenessError> {
    let signal = match bytes.len() {
        HEARTBEAT_LEN => Signal::Heartbeat,
        GOODBYE_LEN => {
            let marker = bytes[GOODBYE_LEN - 1];
            if marker != GOODBYE_MARKER {
                return Err(LivenessError::BadMarker(marker));
            }
            Signal::Goodbye
        }
        other => return Err(LivenessError::BadLength(other)),
    };
    if bytes[0] != HEARTBEAT_HEADER {
        return Err(LivenessError::BadHeader(bytes[0]));
    }

    let signature: [u8; SIGNATURE_LEN] = bytes[1..1 + SIGNATURE_LEN].try_into().unwrap();
    let cif = Cif::from_bytes(
        bytes[1 + SIGNATURE_LEN..1 + SIGNATURE_LEN + ID_LEN]
            .try_into()
            .unwrap(),
    );
    Ok(ParsedSignal {
        signal,
        signature,
        cif,
    })
}

/// Verify a parsed liveness frame against the peer's signing key.
pub fn verify_signal(peer: &VerifyingKey, parsed: &ParsedSignal) -> bool {
    let Ok(signature) = Signature::from_slice(&parsed.signature) else {
        return false;
    };
    peer.verify(parsed.cif.as_bytes(), &signature).is_ok()
}

/// All live sessions on this side, keyed by client-info fingerprint.
///
/// The outer lock guards only map membership; every record carries its
/// own lock, so traffic on one session never blocks another.
pub struct SessionTable {
    config: LivenessConfig,
    sessions: RwLock<HashMap<Cif, Arc<Mutex<SessionRecord>>>>,
}

impl SessionTable {
    pub fn new(config: LivenessConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    /// Register a session under its fingerprint.
    pub async fn insert(&self, cif: Cif, record: SessionRecord) -> Arc<Mutex<SessionRecord>> {
        let record = Arc::new(Mutex::new(record));
        self.sessions.write().await.insert(cif, record.clone());
        record
    }

    pub async fn get(&self, cif: &Cif) -> Option<Arc<Mutex<SessionRecord>>> {
        self.sessions.read().await.get(cif).cloned()
    }

    pub async fn remove(&self, cif: &Cif) -> Option<Arc<Mutex<SessionRecord>>> {
        self.sessions.write().await.remove(cif)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Ingest a received liveness frame on the configured path.
    ///
    /// On the sealed path the frame is opened through its session first;
    /// either way the inner signature must verify against the session's
    /// peer signing key before it counts as liveness. Frames that fail are
    /// reported as errors for the caller to drop; the session stays up.
    pub async fn absorb_signal(&self, bytes: &[u8]) -> Result<Signal, LivenessError> {
        match self.config.path {
            HeartbeatPath::Control => {
                let parsed = parse_signal(bytes)?;
                self.apply_signal(parsed).await
            }
            HeartbeatPath::Sealed => {
                let view = FrameView::parse(bytes)?;
                let record = self
                    .get(&view.cif)
                    .await
                    .ok_or(LivenessError::UnknownSession(view.cif))?;
                let opened = record.lock().await.open(bytes)?;
                let parsed = parse_signal(&opened.plaintext)?;
                self.apply_signal(parsed).await
            }
        }
    }

    async fn apply_signal(&self, parsed: ParsedSignal) -> Result<Signal, LivenessError> {
        let record = self
            .get(&parsed.cif)
            .await
            .ok_or(LivenessError::UnknownSession(parsed.cif))?;
        let mut guard = record.lock().await;

        let peer = *guard
            .peer_signing()
            .ok_or(LivenessError::Session(SessionError::NotEstablished))?;
        if !verify_signal(&peer, &parsed) {
            warn!(cif = %parsed.cif, "discarding liveness frame with bad signature");
            return Err(LivenessError::BadSignature);
        }

        match parsed.signal {
            Signal::Heartbeat => {
                guard.observe_heartbeat(Instant::now())?;
            }
            Signal::Goodbye => {
                debug!(cif = %parsed.cif, "peer said goodbye");
                guard.observe_goodbye();
                drop(guard);
                self.remove(&parsed.cif).await;
            }
        }
        Ok(parsed.signal)
    }

    /// One expiry pass over every session. Closed sessions are removed
    /// from the table and returned.
    pub async fn sweep(&self, now: Instant) -> Vec<Cif> {
        let snapshot: Vec<(Cif, Arc<Mutex<SessionRecord>>)> = {
            let table = self.sessions.read().await;
            table.iter().map(|(cif, rec)| (*cif, rec.clone())).collect()
        };

        let mut expired = Vec::new();
        for (cif, record) in snapshot {
            let closed = record.lock().await.check_expiry(
                now,
                self.config.handshake_deadline,
                self.config.timeout,
            );
            if closed {
                debug!(%cif, "session expired");
                expired.push(cif);
            }
        }

        if !expired.is_empty() {
            let mut table = self.sessions.write().await;
            for cif in &expired {
                table.remove(cif);
            }
        }
        expired
    }

    /// Run the liveness monitor until the owning task is dropped: sweep
    /// the table every poll tick.
    pub async fn run_monitor(self: Arc<Self>) {
        let mut poll = tokio::time::interval(self.config.poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            poll.tick().await;
            self.sweep(Instant::now()).await;
        }
    }
}

/// Emit heartbeats for one established session until it closes, the
/// transport hangs up, or `shutdown` fires (which sends a goodbye and
/// closes the session).
///
/// Frames are handed to the transport driver through `frames`; this task
/// never touches a socket itself.
pub async fn run_emitter(
    record: Arc<Mutex<SessionRecord>>,
    identity: Arc<LocalIdentity>,
    config: LivenessConfig,
    frames: mpsc::Sender<bytes::Bytes>,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<(), LivenessError> {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the first heartbeat should go
    // out one full interval after establishment.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let frame = {
                    let guard = record.lock().await;
                    let Some(cif) = guard.cif() else { break };
                    match config.path {
                        HeartbeatPath::Control => {
                            bytes::Bytes::from(build_heartbeat(&identity, cif)?)
                        }
                        HeartbeatPath::Sealed => {
                            let inner = build_heartbeat(&identity, cif)?;
                            guard.seal(HEARTBEAT_HEADER, &inner)?
                        }
                    }
                };
                if frames.send(frame).await.is_err() {
                    break;
                }
            }
            _ = &mut shutdown => {
                let goodbye = {
                    let mut guard = record.lock().await;
                    let frame = match guard.cif() {
                        Some(cif) => match config.path {
                            HeartbeatPath::Control => {
                                Some(bytes::Bytes::from(build_goodbye(&identity, cif)?))
                            }
                            HeartbeatPath::Sealed => {
                                let inner = build_goodbye(&identity, cif)?;
                                Some(guard.seal(HEARTBEAT_HEADER, &inner)?)
                            }
                        },
                        None => None,
                    };
                    guard.close();
                    frame
                };
                if let Some(frame) = goodbye {
                    let _ = frames.send(frame).await;
                }
                break;
            }
        }
    }
    Ok(())
}
