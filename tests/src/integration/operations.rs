//! # Operation Scenarios
//!
//! Session-bound requests against the built-in wallet handlers.

use super::harness::*;
use shared_types::{MessageType, Payload};
use wb_03_connector::ConnectorError;

#[tokio::test]
async fn test_theme_and_status() {
    let bridge = Bridge::ready().await;

    assert_eq!(within(bridge.connector.set_theme("dark")).await, Ok(true));
    assert_eq!(within(bridge.connector.set_theme("neon")).await, Ok(false));

    let status = within(bridge.connector.get_status()).await.unwrap();
    assert_eq!(status["theme"], "dark");

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_device_key_signs_data() {
    let bridge = Bridge::ready().await;

    let device_key = within(bridge.connector.generate_device_key()).await.unwrap();
    let existing = within(bridge.connector.get_existed_device_public_key())
        .await
        .unwrap();
    assert_eq!(existing, device_key);

    let data = b"transfer 10 to alice".to_vec();
    let signature = within(bridge.connector.sign_data(data.clone())).await.unwrap();
    assert!(device_key.verify(&data, &signature));
    assert!(!device_key.verify(b"transfer 10 to mallory", &signature));

    let status = within(bridge.connector.get_status()).await.unwrap();
    assert_eq!(status["hasDeviceKey"], true);

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_missing_device_key_is_reported() {
    let bridge = Bridge::ready().await;
    assert_eq!(
        within(bridge.connector.sign_data(b"anything".to_vec())).await,
        Err(ConnectorError::Rejected("DEVICE KEY NOT FOUND".into()))
    );
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_unsupported_operation() {
    let bridge = Bridge::ready().await;

    assert_eq!(
        within(bridge.connector.get_wallet_info()).await,
        Err(ConnectorError::Rejected("UNSUPPORTED GET_WALLET_INFO".into()))
    );
    assert_eq!(
        within(bridge.connector.sign_transaction(vec![0xde, 0xad])).await,
        Err(ConnectorError::Rejected("UNSUPPORTED SIGN_TRANSACTION".into()))
    );

    // The session survives rejected operations.
    assert_eq!(within(bridge.connector.set_theme("system")).await, Ok(true));
    bridge.shutdown().await;
}

#[tokio::test]
async fn test_backup_queue_preserves_order() {
    let mut bridge = Bridge::with_defaults();

    let connector = bridge.connector.clone();
    let theme = tokio::spawn(async move { connector.set_theme("dark").await });
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let connector = bridge.connector.clone();
    let status = tokio::spawn(async move { connector.get_status().await });
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    assert!(bridge.host_sent.sent().is_empty());

    bridge.start_wallet();

    assert_eq!(within(theme).await.unwrap(), Ok(true));
    let status = within(status).await.unwrap().unwrap();
    assert_eq!(status["theme"], "dark");

    let order: Vec<_> = bridge
        .host_sent
        .sent()
        .iter()
        .filter_map(|e| e.operation())
        .collect();
    assert_eq!(
        order,
        vec![MessageType::StartSession, MessageType::SetTheme, MessageType::GetStatus]
    );

    let nonces: std::collections::HashSet<_> = bridge
        .host_sent
        .sent()
        .into_iter()
        .filter_map(|e| e.nonce)
        .collect();
    assert_eq!(nonces.len(), 3);

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_handshake_operations_cannot_be_submitted() {
    let bridge = Bridge::ready().await;
    assert_eq!(
        within(bridge.connector.request(MessageType::StartSession, Payload::Empty)).await,
        Err(ConnectorError::Rejected("UNSUPPORTED START_SESSION".into()))
    );
    bridge.shutdown().await;
}
