//! End-to-end exercise of the trust core: authenticated key exchange,
//! sealed traffic in both directions, and heartbeat-driven liveness.

use std::sync::Arc;
use std::time::{Duration, Instant};

use veil_core::types::{Cid, Sid};
use veil_core::{frame, LIVENESS_POLL_INTERVAL};
use veil_crypto::agreement::derive_shared_key;
use veil_crypto::fingerprint::fingerprint;
use veil_crypto::identity::{verify_signed_public_key, LocalIdentity};
use veil_crypto::liveness::{
    build_goodbye, build_heartbeat, LivenessConfig, SessionTable, Signal,
};
use veil_crypto::session::SessionRecord;

const MSG_HEADER: u8 = 0x10;

/// Run the handshake contract between two identities and return both
/// established session records (client side, server side).
fn establish_pair(
    client: &LocalIdentity,
    server: &LocalIdentity,
) -> (SessionRecord, SessionRecord) {
    let now = Instant::now();

    // Each side publishes `signature ‖ agreement pk` and checks the peer's.
    let client_blob = client.sign_public_key().unwrap();
    let server_blob = server.sign_public_key().unwrap();

    let client_agreement_pk =
        verify_signed_public_key(&client_blob, &client.signing_public().unwrap()).unwrap();
    let server_agreement_pk =
        verify_signed_public_key(&server_blob, &server.signing_public().unwrap()).unwrap();

    // Server assigns the connection slot and session id; the fingerprint
    // indexes the session on both ends.
    let cid = Cid::assign();
    let sid = Sid::assign();
    let cif = fingerprint(&cid, &client_agreement_pk);

    let client_key = derive_shared_key(client, &server_agreement_pk).unwrap();
    let server_key = derive_shared_key(server, &client_agreement_pk).unwrap();
    assert_eq!(client_key.as_bytes(), server_key.as_bytes());

    let mut client_session = SessionRecord::open(cid, now);
    client_session
        .establish(
            sid,
            cif,
            server.signing_public().unwrap(),
            server_agreement_pk,
            client_key,
            now,
        )
        .unwrap();

    let mut server_session = SessionRecord::open(cid, now);
    server_session
        .establish(
            sid,
            cif,
            client.signing_public().unwrap(),
            client_agreement_pk,
            server_key,
            now,
        )
        .unwrap();

    (client_session, server_session)
}

#[test]
fn test_full_trust_flow() {
    let client = LocalIdentity::generate();
    let server = LocalIdentity::generate();
    let (client_session, server_session) = establish_pair(&client, &server);

    // Client -> server application traffic.
    let frame_bytes = client_session.seal(MSG_HEADER, b"hello from client").unwrap();
    assert_eq!(
        frame_bytes.len(),
        frame::encrypted_frame_length(b"hello from client".len())
    );
    let opened = server_session.open(&frame_bytes).unwrap();
    assert_eq!(opened.plaintext, b"hello from client");
    assert_eq!(opened.header, MSG_HEADER);

    // Server -> client.
    let frame_bytes = server_session.seal(MSG_HEADER, b"hello from server").unwrap();
    let opened = client_session.open(&frame_bytes).unwrap();
    assert_eq!(opened.plaintext, b"hello from server");
}

#[test]
fn test_blob_swap_is_caught() {
    // A peer presenting a blob signed by someone else must be rejected
    // before any key derivation happens.
    let client = LocalIdentity::generate();
    let impostor = LocalIdentity::generate();

    let blob = impostor.sign_public_key().unwrap();
    assert!(verify_signed_public_key(&blob, &client.signing_public().unwrap()).is_err());
}

#[tokio::test]
async fn test_heartbeats_refresh_and_goodbye_closes() {
    let client = LocalIdentity::generate();
    let server = LocalIdentity::generate();
    let (_client_session, server_session) = establish_pair(&client, &server);
    let cif = server_session.cif().unwrap();

    let table = SessionTable::new(LivenessConfig::default());
    let record = table.insert(cif, server_session).await;

    // Client heartbeat lands and refreshes liveness.
    let heartbeat = build_heartbeat(&client, cif).unwrap();
    assert_eq!(table.absorb_signal(&heartbeat).await, Ok(Signal::Heartbeat));
    assert!(record.lock().await.is_established());

    // A forged heartbeat is discarded without touching the session.
    let forged = build_heartbeat(&server, cif).unwrap();
    assert!(table.absorb_signal(&forged).await.is_err());
    assert!(record.lock().await.is_established());

    // Goodbye tears the session down immediately.
    let goodbye = build_goodbye(&client, cif).unwrap();
    assert_eq!(table.absorb_signal(&goodbye).await, Ok(Signal::Goodbye));
    assert!(!record.lock().await.is_established());
    assert!(table.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_silent_peer_is_swept() {
    let client = LocalIdentity::generate();
    let server = LocalIdentity::generate();
    let (_client_session, server_session) = establish_pair(&client, &server);
    let cif = server_session.cif().unwrap();

    let config = LivenessConfig {
        timeout: Duration::ZERO,
        ..LivenessConfig::default()
    };
    let table = Arc::new(SessionTable::new(config));
    table.insert(cif, server_session).await;

    let monitor = tokio::spawn(table.clone().run_monitor());
    tokio::time::sleep(LIVENESS_POLL_INTERVAL * 2).await;

    assert!(table.is_empty().await);
    monitor.abort();
}
