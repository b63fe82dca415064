//! # Termination Scenarios
//!
//! `terminate: 'session'` drops the session and re-handshakes;
//! `terminate: 'full'` (anomaly breaker) destroys the connector.

use super::harness::*;
use shared_bus::{Endpoint, MessagePort, SourceId};
use shared_types::{EnvelopeBuilder, MessageType, Payload, SystemTimeSource};
use wb_02_validator::AnomalyConfig;
use wb_03_connector::{ConnectorError, ConnectorStatus};

#[tokio::test]
async fn test_lost_wallet_session_triggers_rehandshake() {
    let bridge = Bridge::ready().await;
    let first_session = bridge.responder.session_id().unwrap();

    // Wallet context lost its session (e.g. reloaded underneath the host).
    bridge.responder.reload();

    assert_eq!(
        within(bridge.connector.get_status()).await.unwrap_err(),
        ConnectorError::Rejected("INVALID SESSION ID".into())
    );

    within(bridge.connector.wait_ready()).await.unwrap();
    let status = within(bridge.connector.get_status()).await.unwrap();
    assert_eq!(status["theme"], "light");

    let second_session = bridge.responder.session_id().unwrap();
    assert_ne!(first_session, second_session);

    let handshakes = bridge
        .host_sent
        .sent()
        .iter()
        .filter(|e| e.operation() == Some(MessageType::StartSession))
        .count();
    assert_eq!(handshakes, 2);

    bridge.shutdown().await;
}

#[tokio::test]
async fn test_anomaly_breaker_terminates_connector() {
    let wallet = {
        let mut config = wallet_config();
        config.anomaly = AnomalyConfig {
            max_error_count: 3,
            ..AnomalyConfig::default()
        };
        config
    };
    let mut bridge = Bridge::new(connector_config(), wallet);
    bridge.start_wallet();
    within(bridge.connector.wait_ready()).await.unwrap();

    let rogue = bridge
        .host_port
        .impersonate(Endpoint::new("https://evil.example", SourceId::new(HOST_SOURCE)));
    let mut strays = Vec::new();
    for _ in 0..3 {
        let stray = EnvelopeBuilder::new(MessageType::GetStatus, DEVICE, &SystemTimeSource)
            .request(Payload::Empty);
        rogue.post(&stray).unwrap();
        strays.push(stray);
    }
    drop(rogue);

    let tripped = bridge
        .wallet_error(strays[2].request_id.as_deref().unwrap())
        .await;
    assert_eq!(tripped.message.as_deref(), Some("ANOMALY DETECTED"));
    assert!(bridge.responder.is_destroyed());
    assert!(bridge.responder.session_id().is_none());

    // The unsolicited full termination was not honoured; the next request
    // is answered with it and the connector tears down.
    assert_eq!(bridge.connector.status(), ConnectorStatus::Ready);
    assert_eq!(
        within(bridge.connector.get_status()).await,
        Err(ConnectorError::Rejected("ANOMALY DETECTED".into()))
    );

    let mut status = bridge.connector.subscribe_status();
    within(status.wait_for(|s| *s == ConnectorStatus::Destroyed))
        .await
        .unwrap();
    assert_eq!(
        bridge.connector.set_theme("dark").await,
        Err(ConnectorError::Destroyed)
    );
}

#[tokio::test]
async fn test_destroy_rejects_pending_work() {
    let bridge = Bridge::with_defaults();

    let connector = bridge.connector.clone();
    let queued = tokio::spawn(async move { connector.get_status().await });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    bridge.connector.destroy().await;
    assert_eq!(bridge.connector.status(), ConnectorStatus::Destroyed);
    assert_eq!(within(queued).await.unwrap(), Err(ConnectorError::Destroyed));
    assert_eq!(
        bridge.connector.wait_ready().await,
        Err(ConnectorError::Destroyed)
    );
}
