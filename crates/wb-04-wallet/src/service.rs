//! Wallet channel loop.

use bridge_telemetry::{metric_inc, ENVELOPES_SENT};
use shared_bus::{ChannelEvent, Inbox, MessagePort, WalletSide};
use shared_types::WireEnvelope;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::responder::WalletResponder;

/// Run `responder` over a channel.
///
/// Announces `READY` immediately and again after every restart signal.
/// Stops when the host side of the channel is dropped.
pub fn spawn_wallet(
    responder: Arc<WalletResponder>,
    port: Arc<dyn MessagePort>,
    inbox: Inbox,
) -> JoinHandle<()> {
    tokio::spawn(run(responder, port, inbox))
}

/// Run `responder` over the wallet end of an in-memory channel.
pub fn spawn_wallet_in_memory(responder: Arc<WalletResponder>, side: WalletSide) -> JoinHandle<()> {
    spawn_wallet(responder, Arc::new(side.port), side.inbox)
}

async fn run(responder: Arc<WalletResponder>, port: Arc<dyn MessagePort>, mut inbox: Inbox) {
    let mut ticker = tokio::time::interval(responder.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Wallet context started");
    post(port.as_ref(), &responder.ready_signal());

    loop {
        tokio::select! {
            event = inbox.recv() => match event {
                Some(ChannelEvent::Message(message)) => {
                    if let Some(reply) = responder.handle(&message).await {
                        post(port.as_ref(), &reply);
                    }
                }
                Some(ChannelEvent::Restart) => {
                    responder.reload();
                    post(port.as_ref(), &responder.ready_signal());
                }
                None => {
                    debug!("Host channel closed");
                    break;
                }
            },
            _ = ticker.tick() => responder.tick(),
        }
    }

    info!("Wallet context stopped");
}

fn post(port: &dyn MessagePort, envelope: &WireEnvelope) {
    match port.post(envelope) {
        Ok(()) => metric_inc!(ENVELOPES_SENT, &["wallet", envelope.message_type.as_str()]),
        Err(e) => warn!(message_type = %envelope.message_type, error = %e, "Failed to post reply"),
    }
}
