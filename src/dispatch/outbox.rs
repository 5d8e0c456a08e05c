use crate::models::OutboundMessage;
use crate::services::{Gateway, GatewayError};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sending half of the outbound message queue
///
/// Enqueueing never blocks the dispatcher. Delivery happens on the worker
/// spawned with [`run_delivery`].
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, message: OutboundMessage) {
        if self.tx.send(message).is_err() {
            tracing::error!("Outbox closed, dropping outbound message");
        }
    }
}

/// Deliver queued messages until every `Outbox` handle is dropped
pub async fn run_delivery(
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    gateway: Arc<dyn Gateway>,
) {
    tracing::info!("Outbound delivery worker started");

    while let Some(message) = rx.recv().await {
        match gateway.deliver(&message).await {
            Ok(()) => {}
            Err(GatewayError::Unreachable(recipient)) => {
                tracing::warn!("Recipient {} is unreachable, message dropped", recipient);
            }
            Err(e) => {
                tracing::error!(
                    recipient = message.recipient,
                    kind = ?message.kind,
                    "Failed to deliver message: {}",
                    e
                );
            }
        }
    }

    tracing::info!("Outbound delivery worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        delivered: Mutex<Vec<OutboundMessage>>,
    }

    #[async_trait]
    impl Gateway for RecordingGateway {
        async fn deliver(&self, message: &OutboundMessage) -> Result<(), GatewayError> {
            if message.recipient == 0 {
                return Err(GatewayError::Unreachable(0));
            }
            self.delivered.lock().await.push(message.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_worker_delivers_in_order_and_survives_failures() {
        let (outbox, rx) = Outbox::channel();
        let gateway = Arc::new(RecordingGateway::default());

        outbox.enqueue(OutboundMessage::reply(1, "first"));
        outbox.enqueue(OutboundMessage::reply(0, "lost"));
        outbox.enqueue(OutboundMessage::notification(2, "second"));
        drop(outbox);

        run_delivery(rx, gateway.clone()).await;

        let delivered = gateway.delivered.lock().await;
        let texts: Vec<&str> = delivered.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }
}
