//! # Replay And Forgery Scenarios
//!
//! Traffic captured from a live session and re-sent or tampered with must
//! be rejected by the wallet without disturbing the session.

use super::harness::*;
use shared_bus::{Endpoint, MessagePort, SourceId};
use shared_crypto::KeyPair;
use shared_types::{EnvelopeBuilder, MessageType, Payload, SystemTimeSource};
use wb_03_connector::ConnectorStatus;

#[tokio::test]
async fn test_verbatim_replay_is_rejected() {
    let bridge = Bridge::ready().await;
    assert_eq!(within(bridge.connector.set_theme("dark")).await, Ok(true));

    let captured = bridge.host_sent.last(MessageType::SetTheme).unwrap();
    bridge.host_port.post(&captured).unwrap();

    let rejection = bridge
        .wallet_error(captured.request_id.as_deref().unwrap())
        .await;
    assert_eq!(rejection.message.as_deref(), Some("INVALID NONCE"));
    assert!(rejection.terminate.is_none());

    // The host ignores the unsolicited error and the session carries on.
    assert_eq!(within(bridge.connector.set_theme("light")).await, Ok(true));
    assert_eq!(bridge.connector.status(), ConnectorStatus::Ready);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_request_signed_by_foreign_key_is_rejected() {
    let bridge = Bridge::ready().await;
    let session_id = bridge.responder.session_id().unwrap();

    let attacker = KeyPair::generate();
    let forged = EnvelopeBuilder::new(MessageType::SetTheme, DEVICE, &SystemTimeSource)
        .request(Payload::Text("dark".into()))
        .with_session(session_id)
        .sign(&attacker)
        .unwrap();
    bridge.host_port.post(&forged).unwrap();

    let rejection = bridge
        .wallet_error(forged.request_id.as_deref().unwrap())
        .await;
    assert_eq!(rejection.message.as_deref(), Some("INVALID SIGNATURE"));

    let status = within(bridge.connector.get_status()).await.unwrap();
    assert_eq!(status["theme"], "light");
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_foreign_origin_is_rejected() {
    let bridge = Bridge::ready().await;
    let captured = {
        assert!(within(bridge.connector.get_status()).await.is_ok());
        bridge.host_sent.last(MessageType::GetStatus).unwrap()
    };

    let rogue = bridge
        .host_port
        .impersonate(Endpoint::new("https://evil.example", SourceId::new(HOST_SOURCE)));
    let mut fresh = EnvelopeBuilder::new(MessageType::GetStatus, DEVICE, &SystemTimeSource)
        .request(Payload::Empty);
    fresh.session_id = captured.session_id.clone();
    fresh.signature = captured.signature.clone();
    rogue.post(&fresh).unwrap();
    drop(rogue);

    let rejection = bridge
        .wallet_error(fresh.request_id.as_deref().unwrap())
        .await;
    assert_eq!(rejection.message.as_deref(), Some("INVALID ORIGIN"));

    assert!(within(bridge.connector.get_status()).await.is_ok());
    bridge.shutdown().await;
}
