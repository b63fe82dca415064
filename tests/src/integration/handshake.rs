//! # Handshake Scenarios
//!
//! READY → START_SESSION → signed success → Ready, plus the retry ceiling.

use super::harness::*;
use shared_types::MessageType;
use wb_03_connector::{ConnectorError, ConnectorStatus};

#[tokio::test]
async fn test_full_handshake() {
    let bridge = Bridge::ready().await;
    assert_eq!(bridge.connector.status(), ConnectorStatus::Ready);

    let request = bridge.host_sent.last(MessageType::StartSession).unwrap();
    assert!(request.session_id.is_none());
    assert!(request.signature.is_some());

    let response = bridge
        .wallet_answer(request.request_id.as_deref().unwrap())
        .await;
    assert!(response.is_success());
    assert_eq!(response.session_id, bridge.responder.session_id());

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_connector_waits_for_wallet() {
    let mut bridge = Bridge::with_defaults();
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    assert_eq!(bridge.connector.status(), ConnectorStatus::Loading);
    assert!(bridge.host_sent.sent().is_empty());

    bridge.start_wallet();
    within(bridge.connector.wait_ready()).await.unwrap();
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_recovers_after_five_failed_handshakes() {
    let mut bridge = Bridge::with_defaults();
    bridge.host_sent.corrupt_handshakes(5);
    bridge.start_wallet();

    within(bridge.connector.wait_ready()).await.unwrap();

    let attempts = bridge
        .host_sent
        .sent()
        .iter()
        .filter(|e| e.operation() == Some(MessageType::StartSession))
        .count();
    assert_eq!(attempts, 6);

    let status = within(bridge.connector.get_status()).await.unwrap();
    assert_eq!(status["hasDeviceKey"], false);
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_sixth_failed_handshake_is_terminal() {
    let mut bridge = Bridge::with_defaults();
    bridge.host_sent.corrupt_handshakes(6);

    let connector = bridge.connector.clone();
    let queued = tokio::spawn(async move { connector.get_status().await });
    bridge.start_wallet();

    assert_eq!(
        within(bridge.connector.wait_ready()).await,
        Err(ConnectorError::HandshakeFailed)
    );
    assert_eq!(bridge.connector.status(), ConnectorStatus::Failed);
    assert_eq!(
        within(queued).await.unwrap(),
        Err(ConnectorError::HandshakeFailed)
    );
    assert_eq!(
        bridge.connector.set_theme("dark").await,
        Err(ConnectorError::HandshakeFailed)
    );
}
